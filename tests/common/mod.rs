//! Purpose: Shared helpers for the integration suites.
//! Exports: `init_tracing`, `live_session`, `counter_table`.
//! Role: Keeps log setup and fixture wiring identical across test binaries.
#![allow(dead_code)]

use shale::api::{ClusterConfig, ColumnType, CqlSession, FixtureDriver, ResultSet, connect};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// A session over a fresh fixture driver, connected the way callers do.
pub fn live_session() -> (FixtureDriver, CqlSession) {
    init_tracing();
    let driver = FixtureDriver::new();
    let config = ClusterConfig::new(["127.0.0.1:9042"]);
    let session = connect(&driver, &config).expect("connect");
    (driver, session)
}

/// Empty result with the `(id int, n int)` shape used across suites.
pub fn counter_table() -> ResultSet {
    ResultSet::new([("id", ColumnType::Int), ("n", ColumnType::Int)])
}
