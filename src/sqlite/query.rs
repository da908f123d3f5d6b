use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{Statement, ToSql};

use crate::error::SqlDecorateError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
///
/// Returns `SqlDecorateError` if the value cannot be read.
pub fn sqlite_extract_value_sync(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<RowValues, SqlDecorateError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

/// Run a prepared statement and collect its rows, stopping after `limit` rows when given.
///
/// Column names are captured once and shared by every row of the result.
///
/// # Errors
/// Returns `SqlDecorateError` if execution or value extraction fails.
pub fn build_result_set(
    stmt: &mut Statement<'_>,
    params: &[Value],
    limit: Option<usize>,
) -> Result<ResultSet, SqlDecorateError> {
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|v| v as &dyn ToSql).collect();
    let column_names: Arc<Vec<String>> = Arc::new(
        stmt.column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect(),
    );
    let col_count = column_names.len();

    let mut rows_iter = stmt.query(&param_refs[..])?;
    let mut result_set = ResultSet::with_capacity(column_names, limit.unwrap_or(10).min(10));

    while limit.is_none_or(|max| result_set.len() < max) {
        let Some(row) = rows_iter.next()? else {
            break;
        };
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(sqlite_extract_value_sync(row, i)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, score REAL, data BLOB);
             INSERT INTO t (name, score, data) VALUES ('a', 1.5, x'01'), ('b', NULL, NULL);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn collects_rows_and_columns() {
        let conn = seeded();
        let mut stmt = conn.prepare("SELECT id, name, score, data FROM t ORDER BY id").unwrap();
        let rs = build_result_set(&mut stmt, &[], None).unwrap();
        assert_eq!(rs.column_names().as_slice(), ["id", "name", "score", "data"]);
        assert_eq!(rs.len(), 2);
        let (_, rows) = rs.into_parts();
        assert_eq!(
            rows[0],
            vec![
                RowValues::Int(1),
                RowValues::Text("a".into()),
                RowValues::Float(1.5),
                RowValues::Blob(vec![1]),
            ]
        );
        assert_eq!(rows[1][2], RowValues::Null);
    }

    #[test]
    fn limit_stops_early() {
        let conn = seeded();
        let mut stmt = conn.prepare("SELECT name FROM t WHERE id > ?").unwrap();
        let rs = build_result_set(&mut stmt, &[Value::Integer(0)], Some(1)).unwrap();
        assert_eq!(rs.len(), 1);
    }
}
