mod result_set;
mod row;

pub use result_set::ResultSet;
pub use row::{MappedRow, map_row};

use std::sync::Arc;

use crate::types::RowValues;

/// A fetched row, shaped according to the query's dictionary mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    /// Column name → value (dictionary mode).
    Mapped(MappedRow),
    /// Positional values in select-list order.
    Tuple(Vec<RowValues>),
}

impl Row {
    pub(crate) fn shape(column_names: &Arc<Vec<String>>, values: Vec<RowValues>, dictionary: bool) -> Self {
        if dictionary {
            Row::Mapped(MappedRow::new(Arc::clone(column_names), values))
        } else {
            Row::Tuple(values)
        }
    }

    /// Look a value up by column name; `None` for tuple rows.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        match self {
            Row::Mapped(row) => row.get(column_name),
            Row::Tuple(_) => None,
        }
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        match self {
            Row::Mapped(row) => row.get_by_index(index),
            Row::Tuple(values) => values.get(index),
        }
    }

    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        match self {
            Row::Mapped(row) => row.values(),
            Row::Tuple(values) => values,
        }
    }

    #[must_use]
    pub fn as_mapped(&self) -> Option<&MappedRow> {
        match self {
            Row::Mapped(row) => Some(row),
            Row::Tuple(_) => None,
        }
    }
}
