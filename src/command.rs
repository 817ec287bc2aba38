use std::time::Duration;

use crate::params::{ParameterBag, parameter_names_match};
use crate::results::ResultSet;
use crate::types::{CommandKind, RowValues};

/// Snapshot of a session's configuration handed to a `QueryEngine` for one round-trip.
#[derive(Debug, Clone)]
pub struct Command {
    pub text: String,
    pub kind: CommandKind,
    pub parameters: ParameterBag,
    pub timeout: Option<Duration>,
}

/// What the caller intends to do with the command's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteMode {
    /// Only the affected-row count (and output parameters) matter.
    NonQuery,
    /// Result sets are materialized.
    Query,
}

/// Raw outcome of one engine round-trip.
#[derive(Debug, Clone, Default)]
pub struct Execution {
    /// Result sets in the order the database produced them.
    pub result_sets: Vec<ResultSet>,
    /// Affected rows, or `-1` when the engine cannot tell.
    pub rows_affected: i64,
    /// Values written back for non-input parameters, keyed by parameter name.
    pub output_values: Vec<(String, RowValues)>,
}

impl Execution {
    /// Build an execution, splitting off the trailing output-parameter row when the
    /// command declares non-input parameters.
    ///
    /// Both engines select output parameters as the final result set. That set is
    /// consumed only when its columns name every declared output; otherwise the result
    /// sets are left alone and `output_values` stays empty.
    #[must_use]
    pub fn from_raw(
        mut result_sets: Vec<ResultSet>,
        rows_affected: i64,
        parameters: &ParameterBag,
    ) -> Self {
        let mut output_values = Vec::new();
        if parameters.has_outputs()
            && let Some(last) = result_sets.last()
            && covers_outputs(last, parameters)
        {
            let output_row = result_sets.pop().and_then(ResultSet::into_first);
            for parameter in parameters.outputs() {
                let value = output_row
                    .as_ref()
                    .and_then(|row| {
                        row.iter()
                            .find(|(column, _)| parameter_names_match(column, &parameter.name))
                            .map(|(_, value)| value.clone())
                    })
                    .unwrap_or(RowValues::Null);
                output_values.push((parameter.name.clone(), value));
            }
        }
        Self {
            result_sets,
            rows_affected,
            output_values,
        }
    }
}

fn covers_outputs(result_set: &ResultSet, parameters: &ParameterBag) -> bool {
    let columns = result_set.column_names();
    parameters
        .outputs()
        .all(|parameter| columns.iter().any(|column| parameter_names_match(column, &parameter.name)))
}
