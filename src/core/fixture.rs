// In-process driver that answers statements from queued result sets, for tests and offline use.
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::config::ClusterConfig;
use crate::core::driver::{
    APPLIED_COLUMN, BatchKind, ColumnSpec, Connector, Driver, Query, RowSource,
};
use crate::core::error::{Error, ErrorKind};
use crate::core::types::ColumnType;
use crate::core::value::Value;

/// Build a driver-kind error the way a network driver would report one.
pub fn driver_error(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Driver).with_message(message)
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    columns: Vec<ColumnSpec>,
    rows: Vec<Vec<Value>>,
    failure: Option<Error>,
}

impl ResultSet {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, ColumnType)>,
        S: Into<String>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, column_type)| ColumnSpec::new(name, column_type))
                .collect(),
            rows: Vec::new(),
            failure: None,
        }
    }

    /// No columns and no rows: the shape of a plain write's response.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Single-row response of a conditional write that applied.
    pub fn applied() -> Self {
        Self::new([(APPLIED_COLUMN, ColumnType::Boolean)]).row([Value::Boolean(true)])
    }

    pub fn row<I: IntoIterator<Item = Value>>(mut self, values: I) -> Self {
        self.rows.push(values.into_iter().collect());
        self
    }

    /// Fail the fetch that follows the last row.
    pub fn fail_after_rows(mut self, err: Error) -> Self {
        self.failure = Some(err);
        self
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }
}

#[derive(Clone, Debug)]
enum Response {
    Rows(ResultSet),
    Fail(Error),
}

#[derive(Default)]
struct FixtureState {
    responses: HashMap<String, VecDeque<Response>>,
    batch_responses: VecDeque<Response>,
    executed: Vec<Query>,
    queried: Vec<Query>,
    batches: Vec<(BatchKind, Vec<Query>)>,
    opened: usize,
    released: usize,
    closes: usize,
}

impl FixtureState {
    fn check_open(&self) -> Result<(), Error> {
        if self.closes > 0 {
            return Err(driver_error("session has been closed"));
        }
        Ok(())
    }
}

// A queue with one entry left keeps answering with it.
fn next_response(queue: &mut VecDeque<Response>) -> Option<Response> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

/// Driver double keyed by exact statement text.
///
/// Each statement has a queue of responses; once a single response is left
/// it is repeated. Unregistered reads fail with a driver error, unregistered
/// writes succeed. Batches answer with `respond_batch` entries or, by
/// default, the empty (non-conditional) response.
#[derive(Clone, Default)]
pub struct FixtureDriver {
    state: Arc<Mutex<FixtureState>>,
}

impl FixtureDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, statement: &str, result: ResultSet) {
        self.push(statement, Response::Rows(result));
    }

    pub fn fail(&self, statement: &str, err: Error) {
        self.push(statement, Response::Fail(err));
    }

    pub fn respond_batch(&self, result: ResultSet) {
        self.lock().batch_responses.push_back(Response::Rows(result));
    }

    pub fn fail_batch(&self, err: Error) {
        self.lock().batch_responses.push_back(Response::Fail(err));
    }

    pub fn executed(&self) -> Vec<Query> {
        self.lock().executed.clone()
    }

    pub fn queried(&self) -> Vec<Query> {
        self.lock().queried.clone()
    }

    pub fn batches(&self) -> Vec<(BatchKind, Vec<Query>)> {
        self.lock().batches.clone()
    }

    /// Row sources handed out and not yet released.
    pub fn open_cursors(&self) -> usize {
        let state = self.lock();
        state.opened - state.released
    }

    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    fn push(&self, statement: &str, response: Response) {
        self.lock()
            .responses
            .entry(statement.to_string())
            .or_default()
            .push_back(response);
    }

    fn lock(&self) -> MutexGuard<'_, FixtureState> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn open_rows(&self, state: &mut FixtureState, result: ResultSet) -> Box<dyn RowSource> {
        state.opened += 1;
        Box::new(FixtureRows {
            state: Arc::clone(&self.state),
            columns: result.columns,
            rows: result.rows.into(),
            failure: result.failure,
        })
    }
}

impl Driver for FixtureDriver {
    fn execute(&self, query: &Query) -> Result<(), Error> {
        let mut state = self.lock();
        state.check_open()?;
        state.executed.push(query.clone());
        let response = state.responses.get_mut(query.text()).and_then(next_response);
        match response {
            Some(Response::Fail(err)) => Err(err.with_statement(query.text())),
            _ => Ok(()),
        }
    }

    fn query(&self, query: &Query) -> Result<Box<dyn RowSource>, Error> {
        let mut state = self.lock();
        state.check_open()?;
        state.queried.push(query.clone());
        let response = state.responses.get_mut(query.text()).and_then(next_response);
        match response {
            Some(Response::Rows(result)) => Ok(self.open_rows(&mut state, result)),
            Some(Response::Fail(err)) => Err(err.with_statement(query.text())),
            None => Err(driver_error("no fixture for statement").with_statement(query.text())),
        }
    }

    fn batch(&self, kind: BatchKind, queries: &[Query]) -> Result<Box<dyn RowSource>, Error> {
        let mut state = self.lock();
        state.check_open()?;
        state.batches.push((kind, queries.to_vec()));
        let response = next_response(&mut state.batch_responses)
            .unwrap_or_else(|| Response::Rows(ResultSet::empty()));
        match response {
            Response::Rows(result) => Ok(self.open_rows(&mut state, result)),
            Response::Fail(err) => Err(err),
        }
    }

    fn close(&self) {
        self.lock().closes += 1;
    }
}

impl Connector for FixtureDriver {
    fn connect(&self, _config: &ClusterConfig) -> Result<Arc<dyn Driver>, Error> {
        Ok(Arc::new(self.clone()))
    }
}

struct FixtureRows {
    state: Arc<Mutex<FixtureState>>,
    columns: Vec<ColumnSpec>,
    rows: VecDeque<Vec<Value>>,
    failure: Option<Error>,
}

impl RowSource for FixtureRows {
    fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    fn fetch(&mut self) -> Result<Option<Vec<Value>>, Error> {
        if let Some(row) = self.rows.pop_front() {
            return Ok(Some(row));
        }
        match self.failure.take() {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }

    fn release(&mut self) -> Result<(), Error> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        state.released += 1;
        Ok(())
    }
}
