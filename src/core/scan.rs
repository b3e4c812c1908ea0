// Result shaping over a row iterator: first-row scans, conditional-write results, and full materialization.
use crate::core::cursor::RowIterator;
use crate::core::driver::APPLIED_COLUMN;
use crate::core::error::{Error, ErrorKind};
use crate::core::value::{Destination, RowMap, Value};

/// Scan the first row positionally; zero rows is `NotFound`.
/// The iterator is closed on every path.
pub fn scan_first<I: RowIterator + ?Sized>(
    rows: &mut I,
    statement: &str,
    dest: &mut [&mut dyn Destination],
) -> Result<(), Error> {
    let scanned = match rows.advance() {
        Ok(true) => rows.scan(dest),
        Ok(false) => Err(Error::not_found(statement)),
        Err(err) => Err(err),
    };
    finish(rows, scanned)
}

/// Scan the first row into `dest` by column name. A missing destination
/// behaves like an empty result and reports `NotFound`.
pub fn scan_first_map<I: RowIterator + ?Sized>(
    rows: &mut I,
    statement: &str,
    dest: Option<&mut RowMap>,
) -> Result<(), Error> {
    let scanned = match (rows.advance(), dest) {
        (Ok(true), Some(dest)) => rows.scan_map(dest),
        (Ok(_), _) => Err(Error::not_found(statement)),
        (Err(err), _) => Err(err),
    };
    finish(rows, scanned)
}

/// Read the outcome of a conditional write from its first row.
///
/// Returns `Ok(true)` when applied, leaving `dest` untouched. Otherwise the
/// current values (every column except `[applied]`) are written into `dest`
/// and `Ok(false)` is returned.
pub fn scan_applied<I: RowIterator + ?Sized>(
    rows: &mut I,
    statement: &str,
    dest: Option<&mut RowMap>,
) -> Result<bool, Error> {
    let scanned = match rows.advance() {
        Ok(true) => {
            let mut row = RowMap::new();
            rows.scan_map(&mut row)
                .and_then(|()| split_applied(row, statement))
                .map(|(applied, existing)| {
                    if let (false, Some(dest)) = (applied, dest) {
                        dest.extend(existing);
                    }
                    applied
                })
        }
        Ok(false) => Err(Error::not_found(statement)),
        Err(err) => Err(err),
    };
    finish(rows, scanned)
}

/// Materialize every remaining row in result order. Memory grows with the
/// result set; an empty result is an empty vector.
pub fn collect_maps<I: RowIterator + ?Sized>(rows: &mut I) -> Result<Vec<RowMap>, Error> {
    let mut collected = Vec::new();
    let drained = loop {
        match rows.advance() {
            Ok(true) => {
                let mut row = RowMap::new();
                if let Err(err) = rows.scan_map(&mut row) {
                    break Err(err);
                }
                collected.push(row);
            }
            Ok(false) => break Ok(()),
            Err(err) => break Err(err),
        }
    };
    finish(rows, drained).map(|()| collected)
}

/// Remove the `[applied]` flag from a conditional-write row.
pub fn split_applied(mut row: RowMap, statement: &str) -> Result<(bool, RowMap), Error> {
    match row.remove(APPLIED_COLUMN) {
        Some(Value::Boolean(applied)) => Ok((applied, row)),
        Some(other) => Err(Error::new(ErrorKind::Type)
            .with_message(format!("expected boolean, found {}", other.type_name()))
            .with_column(APPLIED_COLUMN)
            .with_statement(statement)),
        None => Err(Error::new(ErrorKind::Type)
            .with_message("result has no [applied] column")
            .with_hint("Conditional scans need an IF clause or IF [NOT] EXISTS.")
            .with_statement(statement)),
    }
}

// The scan outcome wins over a failure to close.
fn finish<I: RowIterator + ?Sized, T>(rows: &mut I, outcome: Result<T, Error>) -> Result<T, Error> {
    let closed = rows.close();
    let value = outcome?;
    closed?;
    Ok(value)
}
