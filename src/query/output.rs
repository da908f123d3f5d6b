use super::ResultShape;
use crate::error::SqlDecorateError;
use crate::results::Row;

/// What a query call produced, tagged by its result shape.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// Rowid generated by an insert.
    LastInsertId(i64),
    /// Rows changed by an update or delete, or inserted by a batch insert.
    RowCount(u64),
    /// At most one row from a select.
    Row(Option<Row>),
    /// Every row from a multi-row select.
    Rows(Vec<Row>),
}

impl QueryOutput {
    #[must_use]
    pub fn shape(&self) -> ResultShape {
        match self {
            QueryOutput::LastInsertId(_) => ResultShape::ScalarId,
            QueryOutput::RowCount(_) => ResultShape::RowCount,
            QueryOutput::Row(_) => ResultShape::SingleRow,
            QueryOutput::Rows(_) => ResultShape::RowList,
        }
    }

    #[must_use]
    pub fn last_insert_id(&self) -> Option<i64> {
        match self {
            QueryOutput::LastInsertId(id) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub fn rows_affected(&self) -> Option<u64> {
        match self {
            QueryOutput::RowCount(count) => Some(*count),
            _ => None,
        }
    }

    /// The single row of a select.
    ///
    /// # Errors
    /// Returns `SqlDecorateError::ExecutionError` for any other shape.
    pub fn into_row(self) -> Result<Option<Row>, SqlDecorateError> {
        match self {
            QueryOutput::Row(row) => Ok(row),
            other => Err(shape_mismatch(ResultShape::SingleRow, other.shape())),
        }
    }

    /// The rows of a multi-row select.
    ///
    /// # Errors
    /// Returns `SqlDecorateError::ExecutionError` for any other shape.
    pub fn into_rows(self) -> Result<Vec<Row>, SqlDecorateError> {
        match self {
            QueryOutput::Rows(rows) => Ok(rows),
            other => Err(shape_mismatch(ResultShape::RowList, other.shape())),
        }
    }
}

fn shape_mismatch(wanted: ResultShape, actual: ResultShape) -> SqlDecorateError {
    SqlDecorateError::ExecutionError(format!("expected {wanted:?} output, query returned {actual:?}"))
}
