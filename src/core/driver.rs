// Inbound contract with the cluster driver: statements, row sources, batches, and connecting.
use std::fmt;
use std::sync::Arc;

use crate::core::config::ClusterConfig;
use crate::core::error::{Error, ErrorKind};
use crate::core::types::ColumnType;
use crate::core::value::Value;

/// Column name at which conditional statements report whether they applied.
pub const APPLIED_COLUMN: &str = "[applied]";

/// Statement text plus positional bind arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    text: String,
    args: Vec<Value>,
}

impl Query {
    pub fn new(text: impl Into<String>, args: &[Value]) -> Self {
        Self {
            text: text.into(),
            args: args.to_vec(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum BatchKind {
    #[default]
    Logged = 0,
    Unlogged = 1,
    Counter = 2,
}

impl BatchKind {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for BatchKind {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(BatchKind::Logged),
            1 => Ok(BatchKind::Unlogged),
            2 => Ok(BatchKind::Counter),
            other => Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unknown batch kind {other}"))
                .with_hint("Use 0 (logged), 1 (unlogged), or 2 (counter).")),
        }
    }
}

/// Forward-only rows produced by the driver for one statement.
///
/// `fetch` may block on network I/O. `release` tells the driver the caller
/// is done with the result; callers invoke it at most once.
pub trait RowSource: Send {
    fn columns(&self) -> &[ColumnSpec];
    fn fetch(&mut self) -> Result<Option<Vec<Value>>, Error>;
    fn release(&mut self) -> Result<(), Error>;
}

/// A connected driver session. Failures are reported with `ErrorKind::Driver`.
pub trait Driver: Send + Sync {
    fn execute(&self, query: &Query) -> Result<(), Error>;
    fn query(&self, query: &Query) -> Result<Box<dyn RowSource>, Error>;
    /// Submit the statements as one batch; conditional batches answer with
    /// rows carrying the `[applied]` column, others with no rows.
    fn batch(&self, kind: BatchKind, queries: &[Query]) -> Result<Box<dyn RowSource>, Error>;
    fn close(&self);
}

pub trait Connector {
    fn connect(&self, config: &ClusterConfig) -> Result<Arc<dyn Driver>, Error>;
}

#[cfg(test)]
mod tests {
    use super::{BatchKind, Query};
    use crate::core::error::ErrorKind;
    use crate::core::value::Value;

    #[test]
    fn batch_kind_codes_are_stable() {
        for (kind, code) in [
            (BatchKind::Logged, 0),
            (BatchKind::Unlogged, 1),
            (BatchKind::Counter, 2),
        ] {
            assert_eq!(kind.code(), code);
            assert_eq!(BatchKind::try_from(code).expect("kind"), kind);
        }
        let err = BatchKind::try_from(3).expect_err("unknown");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn query_copies_arguments() {
        let args = vec![Value::Int(1), Value::from("a")];
        let query = Query::new("select * from t where id = ? and k = ?", &args);
        assert_eq!(query.args(), args.as_slice());
        assert_eq!(query.to_string(), "select * from t where id = ? and k = ?");
        assert!(Query::new("select now() from system.local", &[]).args().is_empty());
    }
}
