//! Purpose: Group statements into one logged/unlogged/counter batch submitted by the driver.
//! Exports: `Batch`, `BatchOutcome`, `StatementBatch`.
//! Role: Batch half of the session contract; the mock lives in `api::mock`.
//! Invariants: Statements are submitted in insertion order and kept after submission.
//! Invariants: Atomicity is the driver's: logged batches all-or-nothing, others relaxed.
use std::sync::Arc;

use tracing::debug;

use super::ApiResult;
use crate::core::cursor::Cursor;
use crate::core::driver::{BatchKind, Driver, Query};
use crate::core::error::{Error, ErrorKind};
use crate::core::scan::{collect_maps, split_applied};
use crate::core::value::{RowMap, Value};

const BATCH_STATEMENT: &str = "BATCH";

/// Result of a conditional batch. When not applied, `rows` holds the current
/// values reported for each condition, without the `[applied]` column.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchOutcome {
    pub applied: bool,
    pub rows: Vec<RowMap>,
}

pub trait Batch: Send {
    fn kind(&self) -> BatchKind;
    fn add(&mut self, statement: &str, args: &[Value]);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn exec(&mut self) -> ApiResult<()>;

    /// Submit a batch carrying conditions. A response without rows (no
    /// conditions) counts as applied.
    fn exec_tx(&mut self) -> ApiResult<BatchOutcome>;
}

/// Batch bound to a live driver.
pub struct StatementBatch {
    driver: Arc<dyn Driver>,
    kind: BatchKind,
    queries: Vec<Query>,
}

impl StatementBatch {
    pub(crate) fn new(driver: Arc<dyn Driver>, kind: BatchKind) -> Self {
        Self {
            driver,
            kind,
            queries: Vec::new(),
        }
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    fn submit(&self) -> ApiResult<Cursor> {
        if self.queries.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("batch has no statements")
                .with_hint("Call add() before exec()."));
        }
        debug!(kind = ?self.kind, statements = self.queries.len(), "submitting batch");
        let source = self.driver.batch(self.kind, &self.queries)?;
        Ok(Cursor::new(BATCH_STATEMENT, source))
    }
}

impl Batch for StatementBatch {
    fn kind(&self) -> BatchKind {
        self.kind
    }

    fn add(&mut self, statement: &str, args: &[Value]) {
        self.queries.push(Query::new(statement, args));
    }

    fn len(&self) -> usize {
        self.queries.len()
    }

    fn exec(&mut self) -> ApiResult<()> {
        self.submit()?.close()
    }

    fn exec_tx(&mut self) -> ApiResult<BatchOutcome> {
        let rows = collect_maps(&mut self.submit()?)?;
        let mut outcome = BatchOutcome {
            applied: true,
            rows: Vec::new(),
        };
        for (index, row) in rows.into_iter().enumerate() {
            let (applied, existing) = split_applied(row, BATCH_STATEMENT)?;
            if index == 0 {
                outcome.applied = applied;
            }
            if !outcome.applied {
                outcome.rows.push(existing);
            }
        }
        Ok(outcome)
    }
}
