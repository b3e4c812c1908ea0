// Single-pass row cursor over a driver row source with typed column access.
use tracing::{trace, warn};

use crate::core::driver::{ColumnSpec, RowSource};
use crate::core::error::{Error, ErrorKind};
use crate::core::value::{Destination, FromValue, RowMap, Value, assign_all};

/// Row iteration contract shared by the live cursor and the iterator mock.
///
/// `scan`/`scan_map` consume the row positioned by the last successful
/// `advance`. After exhaustion or `close`, `advance` keeps returning
/// `Ok(false)` and reads fail with `ErrorKind::Usage`.
pub trait RowIterator: Send {
    fn columns(&self) -> Vec<ColumnSpec>;
    fn advance(&mut self) -> Result<bool, Error>;
    fn scan(&mut self, dest: &mut [&mut dyn Destination]) -> Result<(), Error>;
    fn scan_map(&mut self, dest: &mut RowMap) -> Result<(), Error>;
    fn close(&mut self) -> Result<(), Error>;
}

#[derive(Debug)]
enum State {
    Fresh,
    Row(Vec<Value>),
    Consumed,
    Exhausted,
    Closed,
}

pub struct Cursor {
    statement: String,
    columns: Vec<ColumnSpec>,
    source: Option<Box<dyn RowSource>>,
    state: State,
}

impl Cursor {
    pub fn new(statement: impl Into<String>, source: Box<dyn RowSource>) -> Self {
        let columns = source.columns().to_vec();
        Self {
            statement: statement.into(),
            columns,
            source: Some(source),
            state: State::Fresh,
        }
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// True once the driver resource has been handed back.
    pub fn is_released(&self) -> bool {
        self.source.is_none()
    }

    pub fn advance(&mut self) -> Result<bool, Error> {
        if matches!(self.state, State::Exhausted | State::Closed) {
            return Ok(false);
        }
        let Some(source) = self.source.as_mut() else {
            self.state = State::Exhausted;
            return Ok(false);
        };

        match source.fetch() {
            Ok(Some(row)) if row.len() == self.columns.len() => {
                trace!(statement = %self.statement, "cursor advanced");
                self.state = State::Row(row);
                Ok(true)
            }
            Ok(Some(row)) => {
                let err = Error::new(ErrorKind::Internal)
                    .with_message(format!(
                        "driver returned {} values for {} columns",
                        row.len(),
                        self.columns.len()
                    ))
                    .with_statement(&self.statement);
                self.abandon();
                Err(err)
            }
            Ok(None) => {
                self.state = State::Exhausted;
                self.release()?;
                Ok(false)
            }
            Err(err) => {
                self.abandon();
                Err(err)
            }
        }
    }

    /// The current row, if `advance` positioned one and it is unscanned.
    pub fn row(&self) -> Result<&[Value], Error> {
        match &self.state {
            State::Row(row) => Ok(row),
            _ => Err(self.state_error()),
        }
    }

    pub fn get<T: FromValue>(&self, index: usize) -> Result<T, Error> {
        let row = self.row()?;
        let value = row.get(index).ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "column index {index} out of range for {} columns",
                    row.len()
                ))
                .with_statement(&self.statement)
        })?;
        T::from_value(value).map_err(|err| self.column_error(err, index))
    }

    /// Typed access by name; with duplicate names the last column wins.
    pub fn get_by_name<T: FromValue>(&self, name: &str) -> Result<T, Error> {
        let row = self.row()?;
        let index = self
            .columns
            .iter()
            .rposition(|spec| spec.name == name)
            .ok_or_else(|| {
                Error::new(ErrorKind::Usage)
                    .with_message("no such column")
                    .with_column(name)
                    .with_statement(&self.statement)
            })?;
        T::from_value(&row[index]).map_err(|err| self.column_error(err, index))
    }

    pub fn scan(&mut self, dest: &mut [&mut dyn Destination]) -> Result<(), Error> {
        self.row()?;
        if dest.len() != self.columns.len() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "{} destinations for {} columns",
                    dest.len(),
                    self.columns.len()
                ))
                .with_hint("Pass one destination per selected column, in select order.")
                .with_statement(&self.statement));
        }
        let row = self.take_row()?;
        assign_all(dest, &row).map_err(|(index, err)| self.column_error(err, index))
    }

    /// Insert every column of the current row into `dest` by name.
    /// Duplicate column names resolve last-write-wins.
    pub fn scan_map(&mut self, dest: &mut RowMap) -> Result<(), Error> {
        let row = self.take_row()?;
        for (spec, value) in self.columns.iter().zip(row) {
            dest.insert(spec.name.clone(), value);
        }
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), Error> {
        self.state = State::Closed;
        self.release()
    }

    fn take_row(&mut self) -> Result<Vec<Value>, Error> {
        match std::mem::replace(&mut self.state, State::Consumed) {
            State::Row(row) => Ok(row),
            other => {
                self.state = other;
                Err(self.state_error())
            }
        }
    }

    fn state_error(&self) -> Error {
        let message = match self.state {
            State::Fresh => "scan before advance",
            State::Row(_) => "row is available",
            State::Consumed => "row already scanned; advance first",
            State::Exhausted => "cursor is exhausted",
            State::Closed => "cursor is closed",
        };
        Error::new(ErrorKind::Usage)
            .with_message(message)
            .with_statement(&self.statement)
    }

    fn column_error(&self, err: Error, index: usize) -> Error {
        let err = err.with_statement(&self.statement);
        match self.columns.get(index) {
            Some(spec) => err.with_column(&spec.name),
            None => err,
        }
    }

    fn release(&mut self) -> Result<(), Error> {
        match self.source.take() {
            Some(mut source) => {
                trace!(statement = %self.statement, "cursor released");
                source.release()
            }
            None => Ok(()),
        }
    }

    // Terminal failure path: the caller gets the original error.
    fn abandon(&mut self) {
        self.state = State::Closed;
        if let Err(err) = self.release() {
            warn!(statement = %self.statement, error = %err, "cursor release failed");
        }
    }
}

impl RowIterator for Cursor {
    fn columns(&self) -> Vec<ColumnSpec> {
        self.columns.clone()
    }

    fn advance(&mut self) -> Result<bool, Error> {
        Cursor::advance(self)
    }

    fn scan(&mut self, dest: &mut [&mut dyn Destination]) -> Result<(), Error> {
        Cursor::scan(self, dest)
    }

    fn scan_map(&mut self, dest: &mut RowMap) -> Result<(), Error> {
        Cursor::scan_map(self, dest)
    }

    fn close(&mut self) -> Result<(), Error> {
        Cursor::close(self)
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        if let Some(mut source) = self.source.take() {
            if let Err(err) = source.release() {
                warn!(statement = %self.statement, error = %err, "cursor release on drop failed");
            }
        }
    }
}
