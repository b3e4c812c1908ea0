//! Purpose: Recording, stub-driven doubles for `Session`, `RowIterator`, and `Batch`.
//! Exports: `SessionMock`, `IteratorMock`, `BatchMock`, and the expectation types.
//! Role: Lets consumers swap the live session for a deterministic in-process one.
//! Invariants: Stubs match in registration order; the first live match answers.
//! Invariants: Replies replay exactly as registered (`None` and empty stay distinct).
//! Invariants: Clones share recorded calls and stubs.
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use super::ApiResult;
use super::batch::{Batch, BatchOutcome};
use super::metadata::ColumnTypes;
use super::session::Session;
use crate::core::cursor::RowIterator;
use crate::core::driver::{BatchKind, ColumnSpec, Query};
use crate::core::error::{Error, ErrorKind};
use crate::core::types::ColumnType;
use crate::core::value::{Destination, RowMap, Value, assign_all};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Close,
    Columns,
    QueryBatch,
    QueryExecute,
    QueryIterate,
    QueryScan,
    QueryScanMap,
    QueryScanMapTransaction,
    QuerySliceMap,
    Tables,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Close => "close",
            Self::Columns => "columns",
            Self::QueryBatch => "query_batch",
            Self::QueryExecute => "query_execute",
            Self::QueryIterate => "query_iterate",
            Self::QueryScan => "query_scan",
            Self::QueryScanMap => "query_scan_map",
            Self::QueryScanMapTransaction => "query_scan_map_transaction",
            Self::QuerySliceMap => "query_slice_map",
            Self::Tables => "tables",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded argument.
///
/// Per method the recorded list is:
/// `columns` `[Text, Text]`, `query_batch` `[Kind]`, `tables` `[Text]`,
/// `query_scan` `[Text, Values, Arity]`, map scans `[Text, Values, Map]`,
/// other queries `[Text, Values]`, `close` `[]`.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    Text(String),
    /// Bind arguments, matched as a single variadic argument.
    Values(Vec<Value>),
    /// Map destination as passed in; `None` when the caller passed none.
    Map(Option<RowMap>),
    Kind(BatchKind),
    /// Number of positional destinations.
    Arity(usize),
}

impl Arg {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_values(&self) -> Option<&[Value]> {
        match self {
            Self::Values(values) => Some(values),
            _ => None,
        }
    }
}

impl From<&str> for Arg {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Arg {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<Value>> for Arg {
    fn from(values: Vec<Value>) -> Self {
        Self::Values(values)
    }
}

impl From<BatchKind> for Arg {
    fn from(kind: BatchKind) -> Self {
        Self::Kind(kind)
    }
}

type Predicate = Arc<dyn Fn(&Arg) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum Matcher {
    Any,
    Eq(Arg),
    Fn(Predicate),
}

impl Matcher {
    pub fn eq(arg: impl Into<Arg>) -> Self {
        Self::Eq(arg.into())
    }

    pub fn predicate(check: impl Fn(&Arg) -> bool + Send + Sync + 'static) -> Self {
        Self::Fn(Arc::new(check))
    }

    pub fn matches(&self, arg: &Arg) -> bool {
        match self {
            Self::Any => true,
            Self::Eq(expected) => expected == arg,
            Self::Fn(check) => check(arg),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Eq(arg) => f.debug_tuple("Eq").field(arg).finish(),
            Self::Fn(_) => f.write_str("Fn(..)"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub method: Method,
    pub args: Vec<Arg>,
}

/// Canned result for a stub. The variant must fit the stubbed method.
///
/// Each reply is a value or an error, never both: an error reply leaves map
/// destinations untouched and carries no applied flag.
#[derive(Clone, Debug)]
pub enum Reply {
    /// `query_execute`.
    Unit(ApiResult<()>),
    Columns(ApiResult<Option<ColumnTypes>>),
    Batch(ApiResult<BatchMock>),
    Iterator(ApiResult<IteratorMock>),
    /// `query_scan`: values assigned to the destinations in order. An empty
    /// list leaves the destinations untouched.
    Scan(ApiResult<Vec<Value>>),
    /// `query_scan_map`: merged into the destination when one is passed.
    ScanMap(ApiResult<RowMap>),
    /// `query_scan_map_transaction`: the applied flag, plus values merged
    /// into the destination when one is passed.
    Transaction(ApiResult<(bool, RowMap)>),
    /// `query_slice_map`: `None` and `Some(vec![])` replay as registered.
    Rows(ApiResult<Option<Vec<RowMap>>>),
    Tables(ApiResult<Option<Vec<String>>>),
}

impl Reply {
    fn name(&self) -> &'static str {
        match self {
            Self::Unit(_) => "Unit",
            Self::Columns(_) => "Columns",
            Self::Batch(_) => "Batch",
            Self::Iterator(_) => "Iterator",
            Self::Scan(_) => "Scan",
            Self::ScanMap(_) => "ScanMap",
            Self::Transaction(_) => "Transaction",
            Self::Rows(_) => "Rows",
            Self::Tables(_) => "Tables",
        }
    }
}

struct Expectation {
    method: Method,
    matchers: Vec<Matcher>,
    reply: Reply,
    remaining: Option<usize>,
}

impl Expectation {
    fn accepts(&self, method: Method, args: &[Arg]) -> bool {
        self.method == method
            && self.remaining != Some(0)
            && self.matchers.len() == args.len()
            && self
                .matchers
                .iter()
                .zip(args)
                .all(|(matcher, arg)| matcher.matches(arg))
    }
}

#[derive(Default)]
struct MockState {
    expectations: Vec<Expectation>,
    calls: Vec<Call>,
}

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(|poison| poison.into_inner())
}

/// Session double driven by an expectation table.
///
/// ```
/// use shale::api::{Matcher, Method, Reply, Session, SessionMock};
///
/// let mock = SessionMock::new();
/// mock.when(Method::Tables, [Matcher::eq("app")])
///     .returns(Reply::Tables(Ok(Some(vec!["users".to_string()]))));
/// assert_eq!(mock.tables("app").unwrap(), Some(vec!["users".to_string()]));
/// assert!(mock.tables("other").is_err());
/// ```
#[derive(Clone, Default)]
pub struct SessionMock {
    state: Arc<Mutex<MockState>>,
}

impl SessionMock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a stub for `method`; one matcher per recorded argument.
    pub fn when(&self, method: Method, matchers: impl IntoIterator<Item = Matcher>) -> Stub<'_> {
        Stub {
            mock: self,
            method,
            matchers: matchers.into_iter().collect(),
            times: None,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.state).calls.clone()
    }

    pub fn call_count(&self, method: Method) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    /// Drop every stub and recorded call.
    pub fn reset(&self) {
        let mut state = lock(&self.state);
        state.expectations.clear();
        state.calls.clear();
    }

    fn invoke(&self, method: Method, args: Vec<Arg>) -> ApiResult<Reply> {
        let mut state = lock(&self.state);
        let found = state
            .expectations
            .iter_mut()
            .find(|expectation| expectation.accepts(method, &args))
            .map(|expectation| {
                if let Some(remaining) = expectation.remaining.as_mut() {
                    *remaining -= 1;
                }
                expectation.reply.clone()
            });
        state.calls.push(Call {
            method,
            args: args.clone(),
        });
        found.ok_or_else(|| {
            Error::new(ErrorKind::Unstubbed)
                .with_message(format!("no stub for {method} with arguments {args:?}"))
                .with_hint("Register one with SessionMock::when(..).returns(..).")
        })
    }
}

fn wrong_reply(method: Method, reply: &Reply) -> Error {
    Error::new(ErrorKind::Usage)
        .with_message(format!("{method} was stubbed with a {} reply", reply.name()))
}

fn query_args(statement: &str, args: &[Value]) -> Vec<Arg> {
    vec![Arg::from(statement), Arg::Values(args.to_vec())]
}

fn map_args(statement: &str, args: &[Value], dest: Option<&RowMap>) -> Vec<Arg> {
    let mut recorded = query_args(statement, args);
    recorded.push(Arg::Map(dest.cloned()));
    recorded
}

/// Pending stub; register it with `returns`.
#[must_use = "a stub does nothing until `returns` is called"]
pub struct Stub<'a> {
    mock: &'a SessionMock,
    method: Method,
    matchers: Vec<Matcher>,
    times: Option<usize>,
}

impl Stub<'_> {
    /// Answer at most `count` calls, then fall through to later stubs.
    pub fn times(mut self, count: usize) -> Self {
        self.times = Some(count);
        self
    }

    pub fn returns(self, reply: Reply) {
        lock(&self.mock.state).expectations.push(Expectation {
            method: self.method,
            matchers: self.matchers,
            reply,
            remaining: self.times,
        });
    }
}

impl Session for SessionMock {
    fn close(&self) {
        lock(&self.state).calls.push(Call {
            method: Method::Close,
            args: Vec::new(),
        });
    }

    fn columns(&self, keyspace: &str, table: &str) -> ApiResult<Option<ColumnTypes>> {
        match self.invoke(Method::Columns, vec![Arg::from(keyspace), Arg::from(table)])? {
            Reply::Columns(result) => result,
            other => Err(wrong_reply(Method::Columns, &other)),
        }
    }

    fn query_batch(&self, kind: BatchKind) -> ApiResult<Box<dyn Batch>> {
        match self.invoke(Method::QueryBatch, vec![Arg::Kind(kind)])? {
            Reply::Batch(result) => result.map(|batch| Box::new(batch) as Box<dyn Batch>),
            other => Err(wrong_reply(Method::QueryBatch, &other)),
        }
    }

    fn query_execute(&self, statement: &str, args: &[Value]) -> ApiResult<()> {
        match self.invoke(Method::QueryExecute, query_args(statement, args))? {
            Reply::Unit(result) => result,
            other => Err(wrong_reply(Method::QueryExecute, &other)),
        }
    }

    fn query_iterate(&self, statement: &str, args: &[Value]) -> ApiResult<Box<dyn RowIterator>> {
        match self.invoke(Method::QueryIterate, query_args(statement, args))? {
            Reply::Iterator(result) => result.map(|rows| Box::new(rows) as Box<dyn RowIterator>),
            other => Err(wrong_reply(Method::QueryIterate, &other)),
        }
    }

    fn query_scan(
        &self,
        statement: &str,
        args: &[Value],
        dest: &mut [&mut dyn Destination],
    ) -> ApiResult<()> {
        let mut recorded = query_args(statement, args);
        recorded.push(Arg::Arity(dest.len()));
        let values = match self.invoke(Method::QueryScan, recorded)? {
            Reply::Scan(result) => result?,
            other => return Err(wrong_reply(Method::QueryScan, &other)),
        };
        if values.is_empty() {
            return Ok(());
        }
        if values.len() != dest.len() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "stub carries {} values for {} destinations",
                    values.len(),
                    dest.len()
                ))
                .with_statement(statement));
        }
        assign_all(dest, &values).map_err(|(_, err)| err.with_statement(statement))
    }

    fn query_scan_map(
        &self,
        statement: &str,
        args: &[Value],
        dest: Option<&mut RowMap>,
    ) -> ApiResult<()> {
        let recorded = map_args(statement, args, dest.as_deref());
        match self.invoke(Method::QueryScanMap, recorded)? {
            Reply::ScanMap(result) => {
                let row = result?;
                if let Some(dest) = dest {
                    dest.extend(row);
                }
                Ok(())
            }
            other => Err(wrong_reply(Method::QueryScanMap, &other)),
        }
    }

    fn query_scan_map_transaction(
        &self,
        statement: &str,
        args: &[Value],
        dest: Option<&mut RowMap>,
    ) -> ApiResult<bool> {
        let recorded = map_args(statement, args, dest.as_deref());
        match self.invoke(Method::QueryScanMapTransaction, recorded)? {
            Reply::Transaction(result) => {
                let (applied, row) = result?;
                if let Some(dest) = dest {
                    dest.extend(row);
                }
                Ok(applied)
            }
            other => Err(wrong_reply(Method::QueryScanMapTransaction, &other)),
        }
    }

    fn query_slice_map(&self, statement: &str, args: &[Value]) -> ApiResult<Option<Vec<RowMap>>> {
        match self.invoke(Method::QuerySliceMap, query_args(statement, args))? {
            Reply::Rows(result) => result,
            other => Err(wrong_reply(Method::QuerySliceMap, &other)),
        }
    }

    fn tables(&self, keyspace: &str) -> ApiResult<Option<Vec<String>>> {
        match self.invoke(Method::Tables, vec![Arg::from(keyspace)])? {
            Reply::Tables(result) => result,
            other => Err(wrong_reply(Method::Tables, &other)),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IteratorCall {
    Columns,
    Advance,
    Scan(usize),
    ScanMap,
    Close,
}

#[derive(Debug, Default)]
struct IteratorState {
    columns: Vec<ColumnSpec>,
    rows: VecDeque<Vec<Value>>,
    current: Option<Vec<Value>>,
    failure: Option<Error>,
    closed: bool,
    calls: Vec<IteratorCall>,
}

/// Row iterator over scripted rows.
#[derive(Clone, Debug, Default)]
pub struct IteratorMock {
    state: Arc<Mutex<IteratorState>>,
}

impl IteratorMock {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, ColumnType)>,
        S: Into<String>,
    {
        let state = IteratorState {
            columns: columns
                .into_iter()
                .map(|(name, column_type)| ColumnSpec::new(name, column_type))
                .collect(),
            ..IteratorState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn row<I: IntoIterator<Item = Value>>(self, values: I) -> Self {
        lock(&self.state).rows.push_back(values.into_iter().collect());
        self
    }

    /// Fail the `advance` that follows the last scripted row.
    pub fn fail_after_rows(self, err: Error) -> Self {
        lock(&self.state).failure = Some(err);
        self
    }

    pub fn calls(&self) -> Vec<IteratorCall> {
        lock(&self.state).calls.clone()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    fn take_row(state: &mut IteratorState) -> Result<Vec<Value>, Error> {
        state.current.take().ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message("no current row; advance first")
        })
    }
}

impl RowIterator for IteratorMock {
    fn columns(&self) -> Vec<ColumnSpec> {
        let mut state = lock(&self.state);
        state.calls.push(IteratorCall::Columns);
        state.columns.clone()
    }

    fn advance(&mut self) -> Result<bool, Error> {
        let mut state = lock(&self.state);
        state.calls.push(IteratorCall::Advance);
        state.current = None;
        if state.closed {
            return Ok(false);
        }
        if let Some(row) = state.rows.pop_front() {
            state.current = Some(row);
            return Ok(true);
        }
        match state.failure.take() {
            Some(err) => Err(err),
            None => Ok(false),
        }
    }

    fn scan(&mut self, dest: &mut [&mut dyn Destination]) -> Result<(), Error> {
        let mut state = lock(&self.state);
        state.calls.push(IteratorCall::Scan(dest.len()));
        if let Some(row) = &state.current {
            if row.len() != dest.len() {
                return Err(Error::new(ErrorKind::Usage).with_message(format!(
                    "{} destinations for {} columns",
                    dest.len(),
                    row.len()
                )));
            }
        }
        let row = Self::take_row(&mut state)?;
        assign_all(dest, &row).map_err(|(index, err)| match state.columns.get(index) {
            Some(spec) => err.with_column(&spec.name),
            None => err,
        })
    }

    fn scan_map(&mut self, dest: &mut RowMap) -> Result<(), Error> {
        let mut state = lock(&self.state);
        state.calls.push(IteratorCall::ScanMap);
        let row = Self::take_row(&mut state)?;
        let names: Vec<String> = state.columns.iter().map(|spec| spec.name.clone()).collect();
        for (name, value) in names.into_iter().zip(row) {
            dest.insert(name, value);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        let mut state = lock(&self.state);
        state.calls.push(IteratorCall::Close);
        state.closed = true;
        state.current = None;
        Ok(())
    }
}

#[derive(Debug)]
struct BatchState {
    kind: BatchKind,
    queries: Vec<Query>,
    exec_reply: ApiResult<()>,
    exec_tx_reply: ApiResult<BatchOutcome>,
    submissions: usize,
}

/// Batch that records statements and answers with stubbed results.
/// By default `exec` succeeds and `exec_tx` reports applied.
#[derive(Clone, Debug)]
pub struct BatchMock {
    state: Arc<Mutex<BatchState>>,
}

impl BatchMock {
    pub fn new(kind: BatchKind) -> Self {
        Self {
            state: Arc::new(Mutex::new(BatchState {
                kind,
                queries: Vec::new(),
                exec_reply: Ok(()),
                exec_tx_reply: Ok(BatchOutcome {
                    applied: true,
                    rows: Vec::new(),
                }),
                submissions: 0,
            })),
        }
    }

    pub fn with_exec(self, reply: ApiResult<()>) -> Self {
        lock(&self.state).exec_reply = reply;
        self
    }

    pub fn with_exec_tx(self, reply: ApiResult<BatchOutcome>) -> Self {
        lock(&self.state).exec_tx_reply = reply;
        self
    }

    pub fn queries(&self) -> Vec<Query> {
        lock(&self.state).queries.clone()
    }

    /// Number of `exec`/`exec_tx` calls.
    pub fn submissions(&self) -> usize {
        lock(&self.state).submissions
    }
}

impl Batch for BatchMock {
    fn kind(&self) -> BatchKind {
        lock(&self.state).kind
    }

    fn add(&mut self, statement: &str, args: &[Value]) {
        lock(&self.state).queries.push(Query::new(statement, args));
    }

    fn len(&self) -> usize {
        lock(&self.state).queries.len()
    }

    fn exec(&mut self) -> ApiResult<()> {
        let mut state = lock(&self.state);
        state.submissions += 1;
        state.exec_reply.clone()
    }

    fn exec_tx(&mut self) -> ApiResult<BatchOutcome> {
        let mut state = lock(&self.state);
        state.submissions += 1;
        state.exec_tx_reply.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Arg, BatchMock, IteratorCall, IteratorMock, Matcher, Method, Reply, SessionMock,
    };
    use crate::api::batch::BatchOutcome;
    use crate::api::metadata::ColumnTypes;
    use crate::api::session::Session;
    use crate::core::cursor::RowIterator;
    use crate::core::driver::BatchKind;
    use crate::core::error::ErrorKind;
    use crate::core::fixture::driver_error;
    use crate::core::types::ColumnType;
    use crate::core::value::{RowMap, Value};

    #[test]
    fn columns_replay_none_and_empty_distinctly() {
        let mock = SessionMock::new();
        mock.when(Method::Columns, [Matcher::eq("a"), Matcher::eq("none")])
            .returns(Reply::Columns(Ok(None)));
        mock.when(Method::Columns, [Matcher::eq("a"), Matcher::eq("empty")])
            .returns(Reply::Columns(Ok(Some(ColumnTypes::new()))));

        assert_eq!(mock.columns("a", "none").expect("none"), None);
        assert_eq!(mock.columns("a", "empty").expect("empty"), Some(ColumnTypes::new()));
    }

    #[test]
    fn sequences_replay_none_and_empty_distinctly() {
        let mock = SessionMock::new();
        mock.when(Method::Tables, [Matcher::eq("none")])
            .returns(Reply::Tables(Ok(None)));
        mock.when(Method::Tables, [Matcher::eq("empty")])
            .returns(Reply::Tables(Ok(Some(Vec::new()))));
        mock.when(Method::QuerySliceMap, [Matcher::eq("select none"), Matcher::Any])
            .returns(Reply::Rows(Ok(None)));
        mock.when(Method::QuerySliceMap, [Matcher::eq("select empty"), Matcher::Any])
            .returns(Reply::Rows(Ok(Some(Vec::new()))));

        assert_eq!(mock.tables("none").expect("none"), None);
        assert_eq!(mock.tables("empty").expect("empty"), Some(Vec::new()));
        assert_eq!(mock.query_slice_map("select none", &[]).expect("none"), None);
        assert_eq!(
            mock.query_slice_map("select empty", &[]).expect("empty"),
            Some(Vec::new())
        );
    }

    #[test]
    fn unstubbed_arguments_are_distinguishable() {
        let mock = SessionMock::new();
        mock.when(Method::Tables, [Matcher::eq("app")])
            .returns(Reply::Tables(Ok(Some(Vec::new()))));

        let err = mock.tables("other").expect_err("unstubbed");
        assert_eq!(err.kind(), ErrorKind::Unstubbed);
        assert_eq!(mock.call_count(Method::Tables), 1);
    }

    #[test]
    fn first_registered_match_wins_until_exhausted() {
        let mock = SessionMock::new();
        mock.when(Method::QueryExecute, [Matcher::Any, Matcher::Any])
            .times(1)
            .returns(Reply::Unit(Err(driver_error("timeout"))));
        mock.when(Method::QueryExecute, [Matcher::Any, Matcher::Any])
            .returns(Reply::Unit(Ok(())));

        assert!(mock.query_execute("truncate t", &[]).is_err());
        mock.query_execute("truncate t", &[]).expect("second stub");
        mock.query_execute("truncate t", &[]).expect("still second");
    }

    #[test]
    fn variadic_arguments_match_as_one() {
        let mock = SessionMock::new();
        let insert = "insert into t (id, n) values (?, ?)";
        mock.when(
            Method::QueryExecute,
            [
                Matcher::eq(insert),
                Matcher::eq(vec![Value::Int(1), Value::Int(2)]),
            ],
        )
        .returns(Reply::Unit(Ok(())));
        mock.when(
            Method::QueryExecute,
            [
                Matcher::Any,
                Matcher::predicate(|arg| arg.as_values().is_some_and(|values| values.len() > 2)),
            ],
        )
        .returns(Reply::Unit(Err(driver_error("too many"))));

        mock.query_execute(insert, &[Value::Int(1), Value::Int(2)]).expect("exact");
        let err = mock
            .query_execute(insert, &[Value::Int(1), Value::Int(2), Value::Int(3)])
            .expect_err("predicate");
        assert_eq!(err.kind(), ErrorKind::Driver);
        let err = mock.query_execute(insert, &[Value::Int(1)]).expect_err("none");
        assert_eq!(err.kind(), ErrorKind::Unstubbed);
    }

    #[test]
    fn scan_replies_fill_destinations() {
        let mock = SessionMock::new();
        mock.when(Method::QueryScan, [Matcher::Any, Matcher::Any, Matcher::eq(Arg::Arity(2))])
            .returns(Reply::Scan(Ok(vec![Value::Int(1), Value::from("x")])));
        let (mut id, mut name) = (0i32, String::new());

        mock.query_scan("select id, name from t", &[], &mut [&mut id, &mut name])
            .expect("scan");
        assert_eq!((id, name.as_str()), (1, "x"));
    }

    #[test]
    fn failed_scan_reply_writes_no_destination() {
        let mock = SessionMock::new();
        mock.when(Method::QueryScan, [Matcher::Any, Matcher::Any, Matcher::Any])
            .returns(Reply::Scan(Ok(vec![Value::Int(1), Value::Int(2)])));
        let (mut id, mut name) = (-1i32, String::from("unset"));

        let err = mock
            .query_scan("select id, name from t", &[], &mut [&mut id, &mut name])
            .expect_err("type");
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!((id, name.as_str()), (-1, "unset"));
    }

    #[test]
    fn iterator_mock_scan_is_all_or_nothing() {
        let mut rows = IteratorMock::new([("id", ColumnType::Int), ("name", ColumnType::Text)])
            .row([Value::Int(1), Value::Int(2)]);
        assert!(rows.advance().expect("advance"));
        let (mut id, mut name) = (-1i32, String::from("unset"));

        let err = rows.scan(&mut [&mut id, &mut name]).expect_err("type");
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.column(), Some("name"));
        assert_eq!((id, name.as_str()), (-1, "unset"));
    }

    #[test]
    fn map_scans_merge_into_destination_and_record_it() {
        let mock = SessionMock::new();
        let update = "update t set n = 3 where id = 1 if n = 2";
        let current = RowMap::from([("n".to_string(), Value::Int(9))]);
        mock.when(Method::QueryScanMapTransaction, [Matcher::Any, Matcher::Any, Matcher::Any])
            .returns(Reply::Transaction(Ok((false, current.clone()))));

        let mut dest = RowMap::new();
        let applied = mock
            .query_scan_map_transaction(update, &[], Some(&mut dest))
            .expect("cas");
        assert!(!applied);
        assert_eq!(dest, current);
        assert_eq!(mock.calls()[0].args[2], Arg::Map(Some(RowMap::new())));
    }

    #[test]
    fn wrong_reply_shape_is_usage() {
        let mock = SessionMock::new();
        mock.when(Method::Tables, [Matcher::Any])
            .returns(Reply::Unit(Ok(())));
        let err = mock.tables("app").expect_err("shape");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn close_records_only_and_reset_clears() {
        let mock = SessionMock::new();
        let clone = mock.clone();
        mock.close();
        clone.close();
        assert_eq!(mock.call_count(Method::Close), 2);

        mock.reset();
        assert!(clone.calls().is_empty());
    }

    #[test]
    fn iterator_mock_scripts_rows_and_records_calls() {
        let script = IteratorMock::new([("id", ColumnType::Int)])
            .row([Value::Int(1)])
            .row([Value::Int(2)]);
        let mock = SessionMock::new();
        mock.when(Method::QueryIterate, [Matcher::Any, Matcher::Any])
            .returns(Reply::Iterator(Ok(script.clone())));

        let mut rows = mock.query_iterate("select id from t", &[]).expect("iterate");
        let mut seen = Vec::new();
        while rows.advance().expect("advance") {
            let mut id = 0i32;
            rows.scan(&mut [&mut id]).expect("scan");
            seen.push(id);
        }
        rows.close().expect("close");

        assert_eq!(seen, vec![1, 2]);
        assert!(script.is_closed());
        assert_eq!(script.calls().last(), Some(&IteratorCall::Close));
        assert_eq!(
            script
                .calls()
                .iter()
                .filter(|call| **call == IteratorCall::Advance)
                .count(),
            3
        );
    }

    #[test]
    fn iterator_mock_reports_scripted_failure() {
        let mut rows = IteratorMock::new([("id", ColumnType::Int)])
            .fail_after_rows(driver_error("connection reset"));
        let err = rows.advance().expect_err("fail");
        assert_eq!(err.kind(), ErrorKind::Driver);

        let mut row = RowMap::new();
        let err = rows.scan_map(&mut row).expect_err("no row");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn batch_mock_records_and_replays() {
        let outcome = BatchOutcome {
            applied: false,
            rows: vec![RowMap::from([("n".to_string(), Value::Int(4))])],
        };
        let batch = BatchMock::new(BatchKind::Logged).with_exec_tx(Ok(outcome.clone()));
        let mock = SessionMock::new();
        mock.when(Method::QueryBatch, [Matcher::eq(BatchKind::Logged)])
            .returns(Reply::Batch(Ok(batch.clone())));

        let mut handle = mock.query_batch(BatchKind::Logged).expect("batch");
        handle.add("update t set n = 5 where id = 1 if n = 2", &[]);
        assert_eq!(handle.exec_tx().expect("tx"), outcome);
        handle.exec().expect("exec");

        assert_eq!(batch.queries().len(), 1);
        assert_eq!(batch.submissions(), 2);
        let err = mock.query_batch(BatchKind::Counter).err().expect("unstubbed");
        assert_eq!(err.kind(), ErrorKind::Unstubbed);
    }
}
