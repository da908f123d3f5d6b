use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

/// A row keyed by column name.
///
/// Column names are shared (`Arc`) across every row of one result set; values keep the column
/// order the engine reported.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    column_names: Arc<Vec<String>>,
    values: Vec<RowValues>,
}

impl MappedRow {
    /// Create a mapped row.
    ///
    /// # Arguments
    ///
    /// * `column_names` - The column names, in select-list order
    /// * `values` - The values for this row, one per column
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<RowValues>) -> Self {
        debug_assert_eq!(
            column_names.len(),
            values.len(),
            "row width must match column metadata"
        );
        Self {
            column_names,
            values,
        }
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.column_names.iter().position(|col| col == column_name)
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.column_names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Drop the ordering and return a plain map.
    #[must_use]
    pub fn into_map(self) -> HashMap<String, RowValues> {
        self.column_names
            .iter()
            .cloned()
            .zip(self.values)
            .collect()
    }
}

/// Zip column metadata with a fetched row. An absent row maps to `None`.
#[must_use]
pub fn map_row(column_names: &Arc<Vec<String>>, row: Option<Vec<RowValues>>) -> Option<MappedRow> {
    row.map(|values| MappedRow::new(Arc::clone(column_names), values))
}
