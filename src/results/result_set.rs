use std::collections::HashMap;
use std::sync::Arc;

use super::row::{CustomDbRow, build_column_index};
use crate::types::RowValues;

/// A result set from a database query
///
/// This struct represents one tabular result produced by a command,
/// containing the rows returned and the column names they share.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// Column names shared by all rows (to avoid duplicating in each row)
    column_names: Arc<Vec<String>>,
    column_index_cache: Arc<HashMap<String, usize>>,
}

impl ResultSet {
    /// Create an empty result set for the given columns.
    #[must_use]
    pub fn new(column_names: Vec<String>) -> Self {
        Self::with_capacity(column_names, 10)
    }

    /// Create a new result set with a known capacity
    ///
    /// # Arguments
    ///
    /// * `column_names` - The columns every row carries
    /// * `capacity` - The initial capacity for the result rows
    #[must_use]
    pub fn with_capacity(column_names: Vec<String>, capacity: usize) -> ResultSet {
        let column_index_cache = Arc::new(build_column_index(&column_names));
        ResultSet {
            results: Vec::with_capacity(capacity),
            column_names: Arc::new(column_names),
            column_index_cache,
        }
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn column_names(&self) -> &Arc<Vec<String>> {
        &self.column_names
    }

    /// Add a row to the result set
    ///
    /// # Arguments
    ///
    /// * `row_values` - The values for this row, in column order
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        let row = CustomDbRow::with_cache(
            Arc::clone(&self.column_names),
            row_values,
            Arc::clone(&self.column_index_cache),
        );
        self.results.push(row);
    }

    /// Number of rows in this result set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// First row, if any.
    #[must_use]
    pub fn first(&self) -> Option<&CustomDbRow> {
        self.results.first()
    }

    /// Consume the result set and take its first row.
    #[must_use]
    pub fn into_first(self) -> Option<CustomDbRow> {
        self.results.into_iter().next()
    }
}

impl IntoIterator for ResultSet {
    type Item = CustomDbRow;
    type IntoIter = std::vec::IntoIter<CustomDbRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}
