use rusqlite::types::Value;
use rusqlite::{Statement, ToSql};
use tracing::debug;

use super::config::SharedSqliteConnection;
use super::connection::run_in_epoch;
use super::params::Params;
use super::query::build_result_set;
use crate::error::SqlDecorateError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Rowid of the most recent successful insert on this connection.
    pub last_insert_id: i64,
    pub rows_affected: u64,
}

/// Statement runner bound to one pooled connection.
///
/// Obtained from [`SqliteConnection::cursor`](super::SqliteConnection::cursor) or from the
/// ambient transaction. A prepared cursor goes through the connection's statement cache.
#[derive(Debug, Clone)]
pub struct Cursor {
    conn: SharedSqliteConnection,
    epoch: u64,
    prepared: bool,
}

impl Cursor {
    pub(crate) fn new(conn: SharedSqliteConnection, epoch: u64, prepared: bool) -> Self {
        Self {
            conn,
            epoch,
            prepared,
        }
    }

    /// Execute a single statement.
    ///
    /// # Errors
    /// Returns `SqlDecorateError` if preparing or executing the statement fails.
    pub async fn execute(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ExecOutcome, SqlDecorateError> {
        let sql_owned = sql.to_owned();
        let values = Params::convert(params).0;
        let prepared = self.prepared;
        debug!(sql = %sql_owned, params = values.len(), "sqlite execute");
        run_in_epoch(self.conn.clone(), self.epoch, move |guard| {
            let rows_affected = with_statement(guard, &sql_owned, prepared, |stmt| {
                Ok(stmt.execute(&as_refs(&values)[..])?)
            })?;
            Ok(ExecOutcome {
                last_insert_id: guard.last_insert_rowid(),
                rows_affected: rows_affected as u64,
            })
        })
        .await
    }

    /// Execute one statement once per row, returning the total rows affected.
    ///
    /// # Errors
    /// Returns `SqlDecorateError` on the first row that fails.
    pub async fn execute_many(
        &self,
        sql: &str,
        rows: &[Vec<RowValues>],
    ) -> Result<u64, SqlDecorateError> {
        let sql_owned = sql.to_owned();
        let batch: Vec<Vec<Value>> = rows.iter().map(|row| Params::convert(row).0).collect();
        let prepared = self.prepared;
        debug!(sql = %sql_owned, rows = batch.len(), "sqlite execute_many");
        run_in_epoch(self.conn.clone(), self.epoch, move |guard| {
            with_statement(guard, &sql_owned, prepared, |stmt| {
                let mut total = 0u64;
                for values in &batch {
                    total += stmt.execute(&as_refs(values)[..])? as u64;
                }
                Ok(total)
            })
        })
        .await
    }

    /// Run a query and keep at most its first row.
    ///
    /// # Errors
    /// Returns `SqlDecorateError` if preparing or executing the query fails.
    pub async fn fetch_one(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, SqlDecorateError> {
        self.fetch(sql, params, Some(1)).await
    }

    /// Run a query and collect every row.
    ///
    /// # Errors
    /// Returns `SqlDecorateError` if preparing or executing the query fails.
    pub async fn fetch_all(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, SqlDecorateError> {
        self.fetch(sql, params, None).await
    }

    async fn fetch(
        &self,
        sql: &str,
        params: &[RowValues],
        limit: Option<usize>,
    ) -> Result<ResultSet, SqlDecorateError> {
        let sql_owned = sql.to_owned();
        let values = Params::convert(params).0;
        let prepared = self.prepared;
        debug!(sql = %sql_owned, params = values.len(), "sqlite query");
        run_in_epoch(self.conn.clone(), self.epoch, move |guard| {
            with_statement(guard, &sql_owned, prepared, |stmt| {
                build_result_set(stmt, &values, limit)
            })
        })
        .await
    }
}

fn as_refs(values: &[Value]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v as &dyn ToSql).collect()
}

fn with_statement<R>(
    conn: &rusqlite::Connection,
    sql: &str,
    prepared: bool,
    func: impl FnOnce(&mut Statement<'_>) -> Result<R, SqlDecorateError>,
) -> Result<R, SqlDecorateError> {
    if prepared {
        let mut stmt = conn.prepare_cached(sql)?;
        func(&mut stmt)
    } else {
        let mut stmt = conn.prepare(sql)?;
        func(&mut stmt)
    }
}
