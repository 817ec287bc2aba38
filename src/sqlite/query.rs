use rusqlite::fallible_iterator::FallibleIterator;
use rusqlite::types::Value;
use rusqlite::{Batch, Connection, Statement};

use super::params::bind_parameters;
use crate::command::{ExecuteMode, Execution};
use crate::directives::split_nocount;
use crate::error::FluentDbError;
use crate::params::{Parameter, ParameterBag};
use crate::results::ResultSet;
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
///
/// Returns `FluentDbError` if the value cannot be converted.
pub fn sqlite_extract_value_sync(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<RowValues, FluentDbError> {
    let value: Value = row.get(idx)?;
    match value {
        Value::Null => Ok(RowValues::Null),
        Value::Integer(i) => Ok(RowValues::Int(i)),
        Value::Real(f) => Ok(RowValues::Float(f)),
        Value::Text(s) => Ok(RowValues::Text(s)),
        Value::Blob(b) => Ok(RowValues::Blob(b)),
    }
}

/// Whether a column may hold `SQLite` date/time text: declared with a DATE, TIME or
/// STAMP type, or an expression with no declared type at all.
fn temporal_column(decl_type: Option<&str>) -> bool {
    decl_type.is_none_or(|decl| {
        let decl = decl.to_ascii_uppercase();
        decl.contains("DATE") || decl.contains("TIME") || decl.contains("STAMP")
    })
}

/// Full `YYYY-MM-DD HH:MM:SS[.f]` text in a temporal column reads back as a timestamp.
fn promote_timestamp(value: RowValues, temporal: bool) -> RowValues {
    if temporal
        && matches!(value, RowValues::Text(_))
        && let Some(ts) = value.as_timestamp()
    {
        return RowValues::Timestamp(ts);
    }
    value
}

/// Step a statement that returns columns; rows are kept only when `keep_rows` is set.
fn build_result_set(stmt: &mut Statement<'_>, keep_rows: bool) -> Result<ResultSet, FluentDbError> {
    let (column_names, temporal_columns): (Vec<String>, Vec<bool>) = stmt
        .columns()
        .iter()
        .map(|col| (col.name().to_string(), temporal_column(col.decl_type())))
        .unzip();
    let col_count = column_names.len();
    let mut result_set = ResultSet::new(column_names);

    let mut rows_iter = stmt.raw_query();
    while let Some(row) = rows_iter.next()? {
        if !keep_rows {
            continue;
        }
        let mut row_values = Vec::with_capacity(col_count);
        for (i, temporal) in temporal_columns.iter().enumerate() {
            row_values.push(promote_timestamp(sqlite_extract_value_sync(row, i)?, *temporal));
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

fn total_changes(conn: &Connection) -> Result<i64, FluentDbError> {
    Ok(conn.query_row("SELECT total_changes()", [], |row| row.get(0))?)
}

/// Run every statement of `sql` in order on one connection.
///
/// Statements that return columns yield a result set each, even when empty. Rows
/// affected is the sum of changes made by writing statements outside NOCOUNT
/// segments, or `-1` when no such statement ran.
pub(super) fn run_batch(
    conn: &Connection,
    sql: &str,
    parameters: &ParameterBag,
    mode: ExecuteMode,
) -> Result<Execution, FluentDbError> {
    let keep_rows = mode == ExecuteMode::Query || parameters.has_outputs();
    let positional: Vec<&Parameter> = parameters.inputs().collect();
    let mut result_sets = Vec::new();
    let mut rows_affected = 0_i64;
    let mut counted = false;

    for segment in split_nocount(sql) {
        let mut batch = Batch::new(conn, segment.sql);
        while let Some(mut stmt) = batch.next()? {
            bind_parameters(&mut stmt, parameters, &positional)?;
            let counts = !segment.nocount && !stmt.readonly();
            let before = if counts { total_changes(conn)? } else { 0 };

            if stmt.column_count() == 0 {
                stmt.raw_execute()?;
            } else {
                result_sets.push(build_result_set(&mut stmt, keep_rows)?);
            }

            if counts {
                rows_affected += total_changes(conn)? - before;
                counted = true;
            }
        }
    }

    Ok(Execution::from_raw(
        result_sets,
        if counted { rows_affected } else { -1 },
        parameters,
    ))
}
