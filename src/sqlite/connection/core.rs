use std::fmt;
use std::sync::Arc;

use bb8::PooledConnection;
use tracing::warn;

use super::tx::rollback_with_busy_retries;
use crate::error::SqlDecorateError;
use crate::sqlite::config::{SharedSqliteConnection, SqliteManager};
use crate::sqlite::cursor::Cursor;

/// A connection checked out of the `SQLite` pool.
pub type SqlitePooledConnection = PooledConnection<'static, SqliteManager>;

/// Connection wrapper backed by a bb8 pooled `SQLite` connection.
///
/// Dropping it returns the connection to the pool. A transaction still open at that point is
/// rolled back first.
pub struct SqliteConnection {
    // `None` only once `Drop` has handed the checkout to the release job.
    conn: Option<SqlitePooledConnection>,
    handle: SharedSqliteConnection,
    pub(crate) in_transaction: bool,
}

impl SqliteConnection {
    pub(crate) fn new(conn: SqlitePooledConnection) -> Self {
        let handle = Arc::clone(&*conn);
        Self {
            conn: Some(conn),
            handle,
            in_transaction: false,
        }
    }

    /// Whether `begin` has been called without a matching `commit` or `rollback`.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Open a cursor on this connection. `prepared` reuses cached statements.
    ///
    /// The cursor stays usable until the current transaction ends or the connection is
    /// dropped; after that its statements fail without running.
    #[must_use]
    pub fn cursor(&self, prepared: bool) -> Cursor {
        Cursor::new(self.handle(), self.epoch(), prepared)
    }

    /// Execute a batch of statements; wraps in a transaction when not already inside one.
    ///
    /// # Errors
    /// Returns `SqlDecorateError` if executing the batch fails.
    pub async fn execute_batch(&mut self, sql: &str) -> Result<(), SqlDecorateError> {
        let sql_owned = sql.to_owned();
        run_blocking(self.handle(), move |guard| {
            if guard.is_autocommit() {
                let tx = guard.transaction()?;
                tx.execute_batch(&sql_owned)?;
                tx.commit()?;
            } else {
                guard.execute_batch(&sql_owned)?;
            }
            Ok(())
        })
        .await
    }

    pub(crate) fn handle(&self) -> SharedSqliteConnection {
        Arc::clone(&self.handle)
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.handle.epoch()
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        // Statements still queued for this checkout must not run after it ends.
        self.handle.advance_epoch();
        if !std::mem::take(&mut self.in_transaction) {
            return;
        }

        // Keep the checkout until the rollback is done so nobody else gets the connection
        // mid-transaction.
        let pooled = self.conn.take();
        let handle = self.handle();
        let release = move || {
            if let Err(err) = rollback_with_busy_retries(&handle) {
                warn!(error = %err, "rollback of abandoned sqlite transaction failed");
            }
            drop(pooled);
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(release);
            }
            Err(_) => release(),
        }
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}

/// Run `func` against the connection on a blocking worker thread.
pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    func: F,
) -> Result<R, SqlDecorateError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlDecorateError> + Send + 'static,
    R: Send + 'static,
{
    run_on_worker(conn, None, func).await
}

/// Like [`run_blocking`], but refuse to run once the connection has left `epoch`.
///
/// The check happens under the connection lock, so a statement whose caller was cancelled
/// while it sat in the blocking queue cannot land after the transaction it belonged to.
pub(crate) async fn run_in_epoch<F, R>(
    conn: SharedSqliteConnection,
    epoch: u64,
    func: F,
) -> Result<R, SqlDecorateError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlDecorateError> + Send + 'static,
    R: Send + 'static,
{
    run_on_worker(conn, Some(epoch), func).await
}

async fn run_on_worker<F, R>(
    conn: SharedSqliteConnection,
    epoch: Option<u64>,
    func: F,
) -> Result<R, SqlDecorateError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlDecorateError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.lock().map_err(|_| {
            SqlDecorateError::ExecutionError("sqlite connection lock poisoned".into())
        })?;
        if epoch.is_some_and(|expected| conn.epoch() != expected) {
            return Err(SqlDecorateError::ExecutionError(
                "cursor outlived its transaction or connection checkout".into(),
            ));
        }
        func(&mut guard)
    })
    .await
    .map_err(|e| SqlDecorateError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}
