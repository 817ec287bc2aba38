use serde::de::DeserializeOwned;

use crate::command::ExecuteMode;
use crate::error::FluentDbError;
use crate::mapping::{from_result_set, from_row, from_value};
use crate::results::{CustomDbRow, ResultSet};
use crate::session::CommandSession;

impl CommandSession {
    async fn first_result_set(&mut self) -> Result<Option<ResultSet>, FluentDbError> {
        let execution = self.run_command(ExecuteMode::Query).await?;
        Ok(execution.result_sets.into_iter().next())
    }

    async fn first_row(&mut self) -> Result<Option<CustomDbRow>, FluentDbError> {
        Ok(self.first_result_set().await?.and_then(ResultSet::into_first))
    }

    /// Run a non-query and return the affected-row count, `-1` when the database
    /// cannot tell.
    ///
    /// # Errors
    /// Session misuse, latched configuration errors, or the engine's error.
    pub async fn execute(&mut self) -> Result<i64, FluentDbError> {
        let execution = self.run_command(ExecuteMode::NonQuery).await?;
        Ok(execution.rows_affected)
    }

    /// First column of the first row, or `None` when there is no row or the value is NULL.
    ///
    /// # Errors
    /// Session misuse, the engine's error, or `FluentDbError::Mapping`.
    pub async fn execute_scalar<T: DeserializeOwned>(&mut self) -> Result<Option<T>, FluentDbError> {
        match self.first_row().await? {
            Some(row) => match row.get_by_index(0) {
                Some(value) if !value.is_null() => from_value(value).map(Some),
                _ => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// First row mapped to `T`, or `None` when the query returns no rows.
    ///
    /// # Errors
    /// Session misuse, the engine's error, or `FluentDbError::Mapping`.
    pub async fn execute_object<T: DeserializeOwned>(&mut self) -> Result<Option<T>, FluentDbError> {
        self.first_row().await?.as_ref().map(from_row).transpose()
    }

    /// Every row of the first result set mapped to `T`; empty when there are none.
    ///
    /// # Errors
    /// Session misuse, the engine's error, or `FluentDbError::Mapping`.
    pub async fn execute_list<T: DeserializeOwned>(&mut self) -> Result<Vec<T>, FluentDbError> {
        match self.first_result_set().await? {
            Some(set) => from_result_set(set),
            None => Ok(Vec::new()),
        }
    }

    /// First row as an ordered column → value map, empty when there is no row.
    ///
    /// # Errors
    /// Session misuse or the engine's error.
    pub async fn execute_dictionary(&mut self) -> Result<CustomDbRow, FluentDbError> {
        Ok(self.first_row().await?.unwrap_or_else(CustomDbRow::empty))
    }
}
