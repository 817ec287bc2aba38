use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::command::ExecuteMode;
use crate::error::FluentDbError;
use crate::mapping::from_row;
use crate::results::{CustomDbRow, ResultSet};
use crate::session::CommandSession;

/// Forward-only cursor over the rows of every result set a command produced.
///
/// The reader holds the session's exclusive borrow, so the session cannot run another
/// command until the reader is dropped.
#[derive(Debug)]
pub struct RowReader<'s> {
    columns: Arc<Vec<String>>,
    rows: std::vec::IntoIter<CustomDbRow>,
    remaining: std::vec::IntoIter<ResultSet>,
    records_affected: i64,
    _session: PhantomData<&'s mut CommandSession>,
}

impl RowReader<'_> {
    fn new(result_sets: Vec<ResultSet>, records_affected: i64) -> Self {
        let mut reader = Self {
            columns: Arc::new(Vec::new()),
            rows: Vec::new().into_iter(),
            remaining: result_sets.into_iter(),
            records_affected,
            _session: PhantomData,
        };
        reader.next_result();
        reader
    }

    /// Column names of the current result set.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Next row of the current result set.
    pub fn next_row(&mut self) -> Option<CustomDbRow> {
        self.rows.next()
    }

    /// Next row of the current result set, mapped to `T`.
    ///
    /// # Errors
    /// Returns `FluentDbError::Mapping` if the row does not fit `T`.
    pub fn read<T: DeserializeOwned>(&mut self) -> Result<Option<T>, FluentDbError> {
        self.rows.next().as_ref().map(from_row).transpose()
    }

    /// Advance to the next result set, discarding unread rows of the current one.
    /// Returns `false` once every set has been consumed.
    pub fn next_result(&mut self) -> bool {
        match self.remaining.next() {
            Some(set) => {
                self.columns = Arc::clone(set.column_names());
                self.rows = set.into_iter();
                true
            }
            None => {
                self.columns = Arc::new(Vec::new());
                self.rows = Vec::new().into_iter();
                false
            }
        }
    }

    /// Rows changed by the command, `-1` when unknown.
    #[must_use]
    pub fn records_affected(&self) -> i64 {
        self.records_affected
    }
}

impl Iterator for RowReader<'_> {
    type Item = CustomDbRow;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl CommandSession {
    /// Run the command and return a cursor over its rows.
    ///
    /// # Errors
    /// Session misuse or the engine's error.
    pub async fn execute_reader(&mut self) -> Result<RowReader<'_>, FluentDbError> {
        let execution = self.run_command(ExecuteMode::Query).await?;
        Ok(RowReader::new(
            execution.result_sets,
            execution.rows_affected,
        ))
    }
}
