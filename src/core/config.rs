// Cluster connection parameters handed to a `Connector`, loadable from JSON and the environment.
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};

pub const ENV_PREFIX: &str = "SHALE_";

const DEFAULT_PROTOCOL_VERSION: u8 = 4;
const DEFAULT_TIMEOUT_MS: u64 = 5_000;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterConfig {
    pub hosts: Vec<String>,
    pub protocol_version: u8,
    pub timeout_ms: u64,
    pub keyspace: Option<String>,
}

impl ClusterConfig {
    pub fn new(hosts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn from_json_str(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid cluster config: {err}"))
                .with_source(err)
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            let kind = match err.kind() {
                std::io::ErrorKind::NotFound => ErrorKind::NotFound,
                _ => ErrorKind::Internal,
            };
            Error::new(kind)
                .with_message(format!("failed to read cluster config {}", path.display()))
                .with_source(err)
        })?;
        Self::from_json_str(&text)
    }

    /// Overlay `SHALE_*` variables from the process environment.
    pub fn with_env(self) -> Result<Self, Error> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Overlay `SHALE_HOSTS` (comma separated), `SHALE_PROTO_VERSION`,
    /// `SHALE_TIMEOUT_MS` and `SHALE_KEYSPACE` read through `lookup`.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, Error> {
        let var = |suffix: &str| {
            let name = format!("{ENV_PREFIX}{suffix}");
            lookup(&name).map(|value| (name, value))
        };

        if let Some((_, hosts)) = var("HOSTS") {
            self.hosts = hosts
                .split(',')
                .map(str::trim)
                .filter(|host| !host.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some((name, version)) = var("PROTO_VERSION") {
            self.protocol_version = parse_number(&name, &version)?;
        }
        if let Some((name, timeout)) = var("TIMEOUT_MS") {
            self.timeout_ms = parse_number(&name, &timeout)?;
        }
        if let Some((_, keyspace)) = var("KEYSPACE") {
            self.keyspace = Some(keyspace).filter(|keyspace| !keyspace.is_empty());
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.hosts.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("cluster config needs at least one host")
                .with_hint("Set hosts or SHALE_HOSTS, e.g. \"127.0.0.1:9042\"."));
        }
        if !(1..=5).contains(&self.protocol_version) {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "unsupported protocol version {}",
                    self.protocol_version
                ))
                .with_hint("Use a CQL native protocol version from 1 to 5."));
        }
        if self.timeout_ms == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("timeout_ms must be greater than zero")
                .with_hint("Use a positive value like 5000."));
        }
        Ok(())
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["localhost".to_string()],
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            keyspace: None,
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, Error> {
    value.trim().parse().map_err(|_| {
        Error::new(ErrorKind::Usage).with_message(format!("{name} must be a number, got {value:?}"))
    })
}
