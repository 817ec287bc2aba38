//! Row-to-type materialization.
//!
//! Targets are any `serde::Deserialize` type. Struct fields are matched to columns by
//! name, ignoring case and underscores; columns nobody asks for are skipped and fields
//! with no column fall back to `#[serde(default)]` or fail with a mapping error.

mod de;
mod shapes;
mod split;

use serde::de::DeserializeOwned;

pub use de::{RowDeserializer, ValueDeserializer};
pub use shapes::{Combine, FromSegments, ResultShapes};
pub use split::{SplitOn, plan_segments};

use crate::error::FluentDbError;
use crate::results::{CustomDbRow, ResultSet};
use crate::types::RowValues;

/// Materialize a whole row into `T`.
///
/// # Errors
/// Returns `FluentDbError::Mapping` if the row's values do not fit `T`.
pub fn from_row<T: DeserializeOwned>(row: &CustomDbRow) -> Result<T, FluentDbError> {
    from_columns(&row.column_names, &row.rows)
}

/// Materialize a slice of columns into `T`.
///
/// # Errors
/// Returns `FluentDbError::Mapping` if the values do not fit `T`.
pub fn from_columns<T: DeserializeOwned>(
    columns: &[String],
    values: &[RowValues],
) -> Result<T, FluentDbError> {
    T::deserialize(RowDeserializer::new(columns, values))
}

/// Convert a single column value into `T`.
///
/// # Errors
/// Returns `FluentDbError::Mapping` if the value does not fit `T`.
pub fn from_value<T: DeserializeOwned>(value: &RowValues) -> Result<T, FluentDbError> {
    T::deserialize(ValueDeserializer::new(value))
}

/// Materialize every row of a result set, preserving row order.
///
/// # Errors
/// Fails on the first row that does not fit `T`.
pub fn from_result_set<T: DeserializeOwned>(set: ResultSet) -> Result<Vec<T>, FluentDbError> {
    set.results.iter().map(from_row).collect()
}
