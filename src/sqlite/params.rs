use rusqlite::Statement;
use rusqlite::types::Value;

use crate::error::FluentDbError;
use crate::params::{Parameter, ParameterBag};
use crate::types::RowValues;

/// Convert a single `RowValues` to a rusqlite `Value`.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Bind bag entries to every marker of a prepared statement.
///
/// Named markers (`@name`, `:name`, `$name`) look the name up in the whole bag, so an
/// output slot can be read back by the statement that fills it. `?NNN` takes the
/// NNN-th caller-supplied value and a bare `?` its own ordinal; both count Input and
/// `InputOutput` entries in bag order.
pub(super) fn bind_parameters(
    stmt: &mut Statement<'_>,
    parameters: &ParameterBag,
    positional: &[&Parameter],
) -> Result<(), FluentDbError> {
    for index in 1..=stmt.parameter_count() {
        let marker = stmt.parameter_name(index).map(str::to_owned);
        let parameter = match marker.as_deref() {
            Some(name) if name.starts_with('?') => name[1..]
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|pos| positional.get(pos).copied()),
            Some(name) => parameters.get(name),
            None => positional.get(index - 1).copied(),
        };
        let parameter = parameter.ok_or_else(|| {
            FluentDbError::ExecutionError(format!(
                "no value supplied for parameter {}",
                marker.unwrap_or_else(|| format!("?{index}"))
            ))
        })?;
        stmt.raw_bind_parameter(index, row_value_to_sqlite_value(&parameter.value))?;
    }
    Ok(())
}
