//! Purpose: Define the session capability set and its live, driver-backed implementation.
//! Exports: `Session`, `CqlSession`, `connect`.
//! Role: Sole public surface for query, scan, batch, and schema operations.
//! Invariants: The driver handle is shared read-only; closing it is the owner's call.
//! Invariants: An unconfigured session fails every operation with `Unconfigured`.
//! Invariants: Every cursor opened here is released before the call returns,
//! except the one handed out by `query_iterate`.
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use super::ApiResult;
use super::batch::{Batch, StatementBatch};
use super::metadata::{self, ColumnTypes};
use crate::core::config::ClusterConfig;
use crate::core::cursor::{Cursor, RowIterator};
use crate::core::driver::{BatchKind, Connector, Driver, Query};
use crate::core::error::Error;
use crate::core::scan;
use crate::core::value::{Destination, RowMap, Value};

/// Operations shared by the live session and `SessionMock`.
pub trait Session: Send + Sync {
    /// Release the underlying connection. Safe to call more than once.
    fn close(&self);

    /// Column name to type for `keyspace.table`; `None` when the table has
    /// no column rows (it does not exist).
    fn columns(&self, keyspace: &str, table: &str) -> ApiResult<Option<ColumnTypes>>;

    fn query_batch(&self, kind: BatchKind) -> ApiResult<Box<dyn Batch>>;

    fn query_execute(&self, statement: &str, args: &[Value]) -> ApiResult<()>;

    /// Open a cursor; the caller owns it and should exhaust or close it.
    fn query_iterate(&self, statement: &str, args: &[Value]) -> ApiResult<Box<dyn RowIterator>>;

    /// Scan the first row into `dest` in select order. Zero rows is
    /// `ErrorKind::NotFound`.
    fn query_scan(
        &self,
        statement: &str,
        args: &[Value],
        dest: &mut [&mut dyn Destination],
    ) -> ApiResult<()>;

    /// Scan the first row into `dest` by column name. Zero rows, or no
    /// destination, is `ErrorKind::NotFound`.
    fn query_scan_map(
        &self,
        statement: &str,
        args: &[Value],
        dest: Option<&mut RowMap>,
    ) -> ApiResult<()>;

    /// Run a conditional statement. `Ok(true)` when applied; `Ok(false)` with
    /// the current values written into `dest` when the condition failed.
    fn query_scan_map_transaction(
        &self,
        statement: &str,
        args: &[Value],
        dest: Option<&mut RowMap>,
    ) -> ApiResult<bool>;

    /// Every row, in result order. The live session always answers `Some`
    /// (empty for zero rows); `None` is reserved for doubles that model an
    /// absent result.
    fn query_slice_map(&self, statement: &str, args: &[Value]) -> ApiResult<Option<Vec<RowMap>>>;

    /// Table names in schema order. Same `Some`/`None` convention as
    /// `query_slice_map`.
    fn tables(&self, keyspace: &str) -> ApiResult<Option<Vec<String>>>;
}

/// Live session over a driver handle. The default value is unconfigured.
#[derive(Clone, Default)]
pub struct CqlSession {
    driver: Option<Arc<dyn Driver>>,
}

impl CqlSession {
    pub fn new(driver: Option<Arc<dyn Driver>>) -> Self {
        Self { driver }
    }

    pub fn is_configured(&self) -> bool {
        self.driver.is_some()
    }

    fn driver(&self) -> ApiResult<&dyn Driver> {
        self.driver.as_deref().ok_or_else(Error::unconfigured)
    }

    fn open(&self, statement: &str, args: &[Value]) -> ApiResult<Cursor> {
        open_cursor(self.driver()?, statement, args)
    }
}

/// Validate `config`, connect through `connector`, and wrap the driver.
pub fn connect<C: Connector + ?Sized>(connector: &C, config: &ClusterConfig) -> ApiResult<CqlSession> {
    config.validate()?;
    info!(
        hosts = ?config.hosts,
        protocol_version = config.protocol_version,
        timeout_ms = config.timeout_ms,
        "connecting session"
    );
    let driver = connector.connect(config)?;
    Ok(CqlSession::new(Some(driver)))
}

pub(crate) fn open_cursor(driver: &dyn Driver, statement: &str, args: &[Value]) -> ApiResult<Cursor> {
    debug!(statement, args = args.len(), "opening cursor");
    let source = driver.query(&Query::new(statement, args))?;
    Ok(Cursor::new(statement, source))
}

impl Session for CqlSession {
    fn close(&self) {
        if let Some(driver) = &self.driver {
            debug!("closing session");
            driver.close();
        }
    }

    fn columns(&self, keyspace: &str, table: &str) -> ApiResult<Option<ColumnTypes>> {
        metadata::columns(self.driver()?, keyspace, table)
    }

    fn query_batch(&self, kind: BatchKind) -> ApiResult<Box<dyn Batch>> {
        let driver = self.driver.clone().ok_or_else(Error::unconfigured)?;
        Ok(Box::new(StatementBatch::new(driver, kind)))
    }

    fn query_execute(&self, statement: &str, args: &[Value]) -> ApiResult<()> {
        let driver = self.driver()?;
        debug!(statement, args = args.len(), "executing statement");
        driver.execute(&Query::new(statement, args))
    }

    fn query_iterate(&self, statement: &str, args: &[Value]) -> ApiResult<Box<dyn RowIterator>> {
        Ok(Box::new(self.open(statement, args)?))
    }

    fn query_scan(
        &self,
        statement: &str,
        args: &[Value],
        dest: &mut [&mut dyn Destination],
    ) -> ApiResult<()> {
        scan::scan_first(&mut self.open(statement, args)?, statement, dest)
    }

    fn query_scan_map(
        &self,
        statement: &str,
        args: &[Value],
        dest: Option<&mut RowMap>,
    ) -> ApiResult<()> {
        scan::scan_first_map(&mut self.open(statement, args)?, statement, dest)
    }

    fn query_scan_map_transaction(
        &self,
        statement: &str,
        args: &[Value],
        dest: Option<&mut RowMap>,
    ) -> ApiResult<bool> {
        scan::scan_applied(&mut self.open(statement, args)?, statement, dest)
    }

    fn query_slice_map(&self, statement: &str, args: &[Value]) -> ApiResult<Option<Vec<RowMap>>> {
        scan::collect_maps(&mut self.open(statement, args)?).map(Some)
    }

    fn tables(&self, keyspace: &str) -> ApiResult<Option<Vec<String>>> {
        metadata::tables(self.driver()?, keyspace).map(Some)
    }
}

impl PartialEq for CqlSession {
    fn eq(&self, other: &Self) -> bool {
        match (&self.driver, &other.driver) {
            (None, None) => true,
            (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            _ => false,
        }
    }
}

impl Eq for CqlSession {}

impl fmt::Debug for CqlSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CqlSession")
            .field("configured", &self.is_configured())
            .finish()
    }
}
