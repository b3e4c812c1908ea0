//! Purpose: List tables and column types of a keyspace from the `system_schema` views.
//! Exports: `ColumnTypes`, the schema query texts.
//! Role: Metadata half of the live session; called through `Session::tables`/`columns`.
//! Invariants: Table names keep the order the schema query returns; no sorting.
//! Invariants: A table without column rows (missing) is `None`, never an error.
use std::collections::HashMap;

use super::ApiResult;
use super::session::open_cursor;
use crate::core::driver::Driver;
use crate::core::error::{Error, ErrorKind};
use crate::core::scan::collect_maps;
use crate::core::types::ColumnType;
use crate::core::value::{FromValue, RowMap, Value};

pub type ColumnTypes = HashMap<String, ColumnType>;

pub const TABLES_QUERY: &str =
    "SELECT table_name FROM system_schema.tables WHERE keyspace_name = ?";
pub const COLUMNS_QUERY: &str =
    "SELECT column_name, type FROM system_schema.columns WHERE keyspace_name = ? AND table_name = ?";

pub(crate) fn tables(driver: &dyn Driver, keyspace: &str) -> ApiResult<Vec<String>> {
    if keyspace.is_empty() {
        return Ok(Vec::new());
    }
    let rows = collect_maps(&mut open_cursor(
        driver,
        TABLES_QUERY,
        &[Value::from(keyspace)],
    )?)?;
    rows.iter()
        .map(|row| text_column(row, "table_name", TABLES_QUERY))
        .collect()
}

pub(crate) fn columns(
    driver: &dyn Driver,
    keyspace: &str,
    table: &str,
) -> ApiResult<Option<ColumnTypes>> {
    if keyspace.is_empty() || table.is_empty() {
        return Ok(None);
    }
    let rows = collect_maps(&mut open_cursor(
        driver,
        COLUMNS_QUERY,
        &[Value::from(keyspace), Value::from(table)],
    )?)?;
    if rows.is_empty() {
        return Ok(None);
    }

    let mut types = ColumnTypes::with_capacity(rows.len());
    for row in &rows {
        let name = text_column(row, "column_name", COLUMNS_QUERY)?;
        let column_type = text_column(row, "type", COLUMNS_QUERY)?
            .parse::<ColumnType>()
            .map_err(|err| err.with_column(&name).with_statement(COLUMNS_QUERY))?;
        types.insert(name, column_type);
    }
    Ok(Some(types))
}

fn text_column(row: &RowMap, name: &str, statement: &str) -> ApiResult<String> {
    let value = row.get(name).ok_or_else(|| {
        Error::new(ErrorKind::Type)
            .with_message("schema row is missing a column")
            .with_column(name)
            .with_statement(statement)
    })?;
    String::from_value(value).map_err(|err| err.with_column(name).with_statement(statement))
}
