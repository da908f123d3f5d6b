use std::sync::Arc;

use crate::types::RowValues;

/// Raw rows fetched by a cursor, before they are shaped for the caller.
///
/// Column names are stored once and shared by every row.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    column_names: Arc<Vec<String>>,
    rows: Vec<Vec<RowValues>>,
}

impl ResultSet {
    #[must_use]
    pub fn with_capacity(column_names: Arc<Vec<String>>, capacity: usize) -> ResultSet {
        ResultSet {
            column_names,
            rows: Vec::with_capacity(capacity),
        }
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn column_names(&self) -> &Arc<Vec<String>> {
        &self.column_names
    }

    /// Add a row to the result set
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        self.rows.push(row_values);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Take the first row, if any (`fetchone`).
    #[must_use]
    pub fn into_first(self) -> (Arc<Vec<String>>, Option<Vec<RowValues>>) {
        let first = self.rows.into_iter().next();
        (self.column_names, first)
    }

    /// Take every row (`fetchall`).
    #[must_use]
    pub fn into_parts(self) -> (Arc<Vec<String>>, Vec<Vec<RowValues>>) {
        (self.column_names, self.rows)
    }
}
