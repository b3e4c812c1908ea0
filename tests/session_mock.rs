//! Purpose: Table-driven coverage of `SessionMock` across the whole session contract.
//! Exports: Integration tests only (no runtime exports).
//! Role: Prove every method records its call and replays the stubbed reply exactly.
//! Invariants: Each case stubs exact arguments; any other arguments stay unstubbed.

mod common;

use shale::api::{
    Arg, BatchKind, BatchMock, ColumnType, ColumnTypes, ErrorKind, IteratorMock, Matcher, Method,
    Reply, RowMap, Session, SessionMock, Value, driver_error,
};

fn failure() -> shale::api::Error {
    driver_error("e")
}

fn row(name: &str, value: i32) -> RowMap {
    RowMap::from([(name.to_string(), Value::Int(value))])
}

struct Case {
    method: Method,
    args: Vec<Arg>,
    reply: Reply,
}

fn case(method: Method, args: Vec<Arg>, reply: Reply) -> Case {
    Case { method, args, reply }
}

fn cases() -> Vec<Case> {
    let one = || Arg::Values(vec![Value::Int(1)]);
    let none = || Arg::Values(Vec::new());
    vec![
        case(Method::Columns, vec!["".into(), "".into()], Reply::Columns(Ok(None))),
        case(
            Method::Columns,
            vec!["a".into(), "b".into()],
            Reply::Columns(Ok(Some(ColumnTypes::from([(
                "c".to_string(),
                ColumnType::Int,
            )])))),
        ),
        case(
            Method::Columns,
            vec!["a".into(), "err".into()],
            Reply::Columns(Err(failure())),
        ),
        case(
            Method::QueryBatch,
            vec![Arg::Kind(BatchKind::Logged)],
            Reply::Batch(Err(failure())),
        ),
        case(
            Method::QueryBatch,
            vec![Arg::Kind(BatchKind::Unlogged)],
            Reply::Batch(Ok(BatchMock::new(BatchKind::Unlogged))),
        ),
        case(Method::QueryExecute, vec!["".into(), none()], Reply::Unit(Ok(()))),
        case(Method::QueryExecute, vec!["a".into(), one()], Reply::Unit(Err(failure()))),
        case(
            Method::QueryIterate,
            vec!["".into(), none()],
            Reply::Iterator(Err(failure())),
        ),
        case(
            Method::QueryIterate,
            vec!["a".into(), one()],
            Reply::Iterator(Ok(IteratorMock::new([("b", ColumnType::Int)]))),
        ),
        case(
            Method::QueryScan,
            vec!["".into(), none(), Arg::Arity(0)],
            Reply::Scan(Ok(Vec::new())),
        ),
        case(
            Method::QueryScan,
            vec!["a".into(), one(), Arg::Arity(1)],
            Reply::Scan(Err(failure())),
        ),
        case(
            Method::QueryScanMap,
            vec!["".into(), none(), Arg::Map(None)],
            Reply::ScanMap(Ok(RowMap::new())),
        ),
        case(
            Method::QueryScanMap,
            vec!["a".into(), one(), Arg::Map(Some(row("b", 2)))],
            Reply::ScanMap(Err(failure())),
        ),
        case(
            Method::QueryScanMapTransaction,
            vec!["".into(), none(), Arg::Map(None)],
            Reply::Transaction(Ok((false, RowMap::new()))),
        ),
        case(
            Method::QueryScanMapTransaction,
            vec!["a".into(), one(), Arg::Map(Some(row("b", 2)))],
            Reply::Transaction(Err(failure())),
        ),
        case(Method::QuerySliceMap, vec!["".into(), none()], Reply::Rows(Ok(None))),
        case(
            Method::QuerySliceMap,
            vec!["empty".into(), none()],
            Reply::Rows(Ok(Some(Vec::new()))),
        ),
        case(
            Method::QuerySliceMap,
            vec!["a".into(), one()],
            Reply::Rows(Ok(Some(vec![row("b", 2)]))),
        ),
        case(Method::QuerySliceMap, vec!["err".into(), one()], Reply::Rows(Err(failure()))),
        case(Method::Tables, vec!["".into()], Reply::Tables(Ok(None))),
        case(Method::Tables, vec!["empty".into()], Reply::Tables(Ok(Some(Vec::new())))),
        case(
            Method::Tables,
            vec!["a".into()],
            Reply::Tables(Ok(Some(vec!["b".to_string()]))),
        ),
        case(Method::Tables, vec!["err".into()], Reply::Tables(Err(failure()))),
    ]
}

fn text(arg: &Arg) -> &str {
    arg.as_text().expect("text argument")
}

fn values(arg: &Arg) -> &[Value] {
    arg.as_values().expect("values argument")
}

fn map(arg: &Arg) -> Option<RowMap> {
    match arg {
        Arg::Map(map) => map.clone(),
        other => panic!("expected map argument, got {other:?}"),
    }
}

// Invoke `method` the way a caller would and normalize the outcome to a Reply.
fn invoke(mock: &SessionMock, method: Method, args: &[Arg]) -> Reply {
    match method {
        Method::Close => {
            mock.close();
            Reply::Unit(Ok(()))
        }
        Method::Columns => Reply::Columns(mock.columns(text(&args[0]), text(&args[1]))),
        Method::QueryBatch => {
            let Arg::Kind(kind) = args[0] else {
                panic!("expected kind argument");
            };
            Reply::Batch(mock.query_batch(kind).map(|_| BatchMock::new(kind)))
        }
        Method::QueryExecute => Reply::Unit(mock.query_execute(text(&args[0]), values(&args[1]))),
        Method::QueryIterate => Reply::Iterator(
            mock.query_iterate(text(&args[0]), values(&args[1]))
                .map(|_| IteratorMock::default()),
        ),
        Method::QueryScan => {
            let Arg::Arity(arity) = args[2] else {
                panic!("expected arity argument");
            };
            let mut slots: Vec<i32> = vec![0; arity];
            let mut dest: Vec<&mut dyn shale::api::Destination> = slots
                .iter_mut()
                .map(|slot| slot as &mut dyn shale::api::Destination)
                .collect();
            let result = mock.query_scan(text(&args[0]), values(&args[1]), &mut dest);
            Reply::Scan(result.map(|()| Vec::new()))
        }
        Method::QueryScanMap => {
            let mut dest = map(&args[2]);
            let result = mock.query_scan_map(text(&args[0]), values(&args[1]), dest.as_mut());
            Reply::ScanMap(result.map(|()| RowMap::new()))
        }
        Method::QueryScanMapTransaction => {
            let mut dest = map(&args[2]);
            let result =
                mock.query_scan_map_transaction(text(&args[0]), values(&args[1]), dest.as_mut());
            Reply::Transaction(result.map(|applied| (applied, RowMap::new())))
        }
        Method::QuerySliceMap => {
            Reply::Rows(mock.query_slice_map(text(&args[0]), values(&args[1])))
        }
        Method::Tables => Reply::Tables(mock.tables(text(&args[0]))),
    }
}

fn assert_replayed(method: Method, actual: &Reply, expected: &Reply) {
    match (actual, expected) {
        (Reply::Columns(a), Reply::Columns(e)) => assert_eq!(a, e, "{method}"),
        (Reply::Unit(a), Reply::Unit(e)) => assert_eq!(a, e, "{method}"),
        (Reply::Rows(a), Reply::Rows(e)) => assert_eq!(a, e, "{method}"),
        (Reply::Tables(a), Reply::Tables(e)) => assert_eq!(a, e, "{method}"),
        (Reply::Batch(a), Reply::Batch(e)) => assert_eq!(a.is_ok(), e.is_ok(), "{method}"),
        (Reply::Iterator(a), Reply::Iterator(e)) => assert_eq!(a.is_ok(), e.is_ok(), "{method}"),
        (Reply::Scan(a), Reply::Scan(e)) => assert_eq!(a.is_ok(), e.is_ok(), "{method}"),
        (Reply::ScanMap(a), Reply::ScanMap(e)) => assert_eq!(a.is_ok(), e.is_ok(), "{method}"),
        (Reply::Transaction(a), Reply::Transaction(e)) => assert_eq!(
            a.as_ref().map(|(applied, _)| *applied),
            e.as_ref().map(|(applied, _)| *applied),
            "{method}"
        ),
        (a, e) => panic!("{method}: reply shape changed: {a:?} vs {e:?}"),
    }
}

#[test]
fn every_method_replays_stubs_and_records_calls() {
    common::init_tracing();
    let mock = SessionMock::new();
    let cases = cases();
    for case in &cases {
        mock.when(case.method, case.args.iter().cloned().map(Matcher::Eq))
            .returns(case.reply.clone());
    }

    for case in &cases {
        let actual = invoke(&mock, case.method, &case.args);
        assert_replayed(case.method, &actual, &case.reply);
    }

    let calls = mock.calls();
    assert_eq!(calls.len(), cases.len());
    for (call, case) in calls.iter().zip(&cases) {
        assert_eq!(call.method, case.method);
        assert_eq!(call.args, case.args);
    }

    invoke(&mock, Method::Close, &[]);
    mock.close();
    assert_eq!(mock.call_count(Method::Close), 2);
}

#[test]
fn stubbed_columns_replay_exactly_and_others_are_unstubbed() {
    let mock = SessionMock::new();
    let types = ColumnTypes::from([("c".to_string(), ColumnType::Text)]);
    mock.when(Method::Columns, [Matcher::eq("a"), Matcher::eq("b")])
        .times(1)
        .returns(Reply::Columns(Ok(Some(types.clone()))));
    mock.when(Method::Columns, [Matcher::eq("a"), Matcher::eq("b")])
        .returns(Reply::Columns(Err(failure())));

    assert_eq!(mock.columns("a", "b").expect("first"), Some(types));
    assert_eq!(mock.columns("a", "b").expect_err("second"), failure());

    let err = mock.columns("a", "c").expect_err("unstubbed");
    assert_eq!(err.kind(), ErrorKind::Unstubbed);
    assert!(err.hint().is_some());
}

#[test]
fn sequence_replies_keep_none_apart_from_empty() {
    let mock = SessionMock::new();
    mock.when(Method::Tables, [Matcher::eq("missing")])
        .returns(Reply::Tables(Ok(None)));
    mock.when(Method::Tables, [Matcher::eq("blank")])
        .returns(Reply::Tables(Ok(Some(Vec::new()))));

    let missing = mock.tables("missing").expect("missing");
    let blank = mock.tables("blank").expect("blank");
    assert_eq!(missing, None);
    assert_eq!(blank, Some(Vec::new()));
    assert_ne!(missing, blank);
}

#[test]
fn error_replies_carry_no_value() {
    let mock = SessionMock::new();
    mock.when(Method::QueryScanMapTransaction, [Matcher::Any, Matcher::Any, Matcher::Any])
        .returns(Reply::Transaction(Err(failure())));
    mock.when(Method::QueryScanMap, [Matcher::Any, Matcher::Any, Matcher::Any])
        .returns(Reply::ScanMap(Err(failure())));

    let mut dest = row("n", 1);
    let err = mock
        .query_scan_map_transaction("update t set n = 2 where id = 1 if n = 1", &[], Some(&mut dest))
        .expect_err("transaction");
    assert_eq!(err, failure());
    let err = mock
        .query_scan_map("select n from t", &[], Some(&mut dest))
        .expect_err("scan map");
    assert_eq!(err, failure());
    assert_eq!(dest, row("n", 1));
}

#[test]
fn unstubbed_calls_fail_for_every_method() {
    let mock = SessionMock::new();
    let mut dest = RowMap::new();
    let mut id = 0i32;

    let kinds = [
        mock.columns("a", "b").err().map(|err| err.kind()),
        mock.query_batch(BatchKind::Counter).err().map(|err| err.kind()),
        mock.query_execute("a", &[]).err().map(|err| err.kind()),
        mock.query_iterate("a", &[]).err().map(|err| err.kind()),
        mock.query_scan("a", &[], &mut [&mut id]).err().map(|err| err.kind()),
        mock.query_scan_map("a", &[], Some(&mut dest)).err().map(|err| err.kind()),
        mock.query_scan_map_transaction("a", &[], None).err().map(|err| err.kind()),
        mock.query_slice_map("a", &[]).err().map(|err| err.kind()),
        mock.tables("a").err().map(|err| err.kind()),
    ];
    for kind in kinds {
        assert_eq!(kind, Some(ErrorKind::Unstubbed));
    }
    assert_eq!(mock.calls().len(), 9);
}

#[test]
fn mock_substitutes_for_live_session_behind_the_trait() {
    fn count_rows(session: &dyn Session) -> usize {
        session
            .query_slice_map("select * from t", &[])
            .ok()
            .flatten()
            .map_or(0, |rows| rows.len())
    }

    let mock = SessionMock::new();
    mock.when(Method::QuerySliceMap, [Matcher::Any, Matcher::Any])
        .returns(Reply::Rows(Ok(Some(vec![row("id", 1), row("id", 2)]))));
    assert_eq!(count_rows(&mock), 2);
}
