use std::sync::PoisonError;
use std::thread;
use std::time::Duration;

use tracing::debug;

use super::{SqliteConnection, run_blocking};
use crate::error::SqlDecorateError;
use crate::sqlite::config::SharedSqliteConnection;

const ROLLBACK_BUSY_RETRIES: &[Duration] = &[
    Duration::from_millis(10),
    Duration::from_millis(25),
    Duration::from_millis(50),
];

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::DatabaseBusy)
}

/// Roll back on the calling thread, retrying briefly while the database reports busy.
///
/// A connection that is already in autocommit mode has nothing to roll back.
pub(crate) fn rollback_with_busy_retries(
    handle: &SharedSqliteConnection,
) -> Result<(), SqlDecorateError> {
    let guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
    handle.advance_epoch();
    for (idx, delay) in ROLLBACK_BUSY_RETRIES.iter().copied().enumerate() {
        if guard.is_autocommit() {
            return Ok(());
        }
        match guard.execute_batch("ROLLBACK") {
            Ok(()) => return Ok(()),
            Err(err) if is_busy(&err) && idx + 1 < ROLLBACK_BUSY_RETRIES.len() => {
                thread::sleep(delay);
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(SqlDecorateError::ExecutionError(
        "rollback retries exhausted".into(),
    ))
}

impl SqliteConnection {
    /// Begin a transaction, transitioning this connection into transactional mode.
    ///
    /// # Errors
    /// Returns `SqlDecorateError` if the transaction cannot be started or is already active.
    pub async fn begin(&mut self) -> Result<(), SqlDecorateError> {
        if self.in_transaction {
            return Err(SqlDecorateError::ExecutionError(
                "SQLite transaction already in progress".into(),
            ));
        }
        run_blocking(self.handle(), |guard| Ok(guard.execute_batch("BEGIN")?)).await?;
        self.in_transaction = true;
        debug!("sqlite transaction started");
        Ok(())
    }

    /// Commit an open transaction.
    ///
    /// On failure the transaction stays open so the caller can roll it back.
    ///
    /// # Errors
    /// Returns `SqlDecorateError` if committing fails or no transaction is active.
    pub async fn commit(&mut self) -> Result<(), SqlDecorateError> {
        if !self.in_transaction {
            return Err(SqlDecorateError::ExecutionError(
                "SQLite transaction not active".into(),
            ));
        }
        let handle = self.handle();
        run_blocking(self.handle(), move |guard| {
            guard.execute_batch("COMMIT")?;
            handle.advance_epoch();
            Ok(())
        })
        .await?;
        self.in_transaction = false;
        debug!("sqlite transaction committed");
        Ok(())
    }

    /// Roll back an open transaction.
    ///
    /// # Errors
    /// Returns `SqlDecorateError` if rolling back fails or no transaction is active.
    pub async fn rollback(&mut self) -> Result<(), SqlDecorateError> {
        if !self.in_transaction {
            return Err(SqlDecorateError::ExecutionError(
                "SQLite transaction not active".into(),
            ));
        }
        self.in_transaction = false;
        let handle = self.handle();
        let result = tokio::task::spawn_blocking(move || rollback_with_busy_retries(&handle))
            .await
            .map_err(|e| {
                SqlDecorateError::ExecutionError(format!("sqlite spawn_blocking join error: {e}"))
            })?;
        debug!(ok = result.is_ok(), "sqlite transaction rolled back");
        result
    }
}
