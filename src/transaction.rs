//! Task-scoped ambient transactions.
//!
//! The first [`transactional`] call for a [`Database`] in a tokio task owns the transaction: it
//! checks out a connection, begins, and binds the connection to the task for the lifetime of its
//! body. Nested calls and every [`Query::call`](crate::query::Query::call) made inside the body
//! against the same database reuse that connection. Only the owner commits or rolls back.
//!
//! Bindings are kept per database. Work addressed to another database inside the body runs on
//! that database's own connection, or joins its own ambient transaction if one is open.
//!
//! Tasks spawned from inside a body do not inherit the transaction.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::SqlDecorateError;
use crate::pool::Database;
use crate::sqlite::{Cursor, SharedSqliteConnection};

/// An open transaction bound to the current task.
#[derive(Debug, Clone)]
struct AmbientTx {
    pool_id: usize,
    conn: SharedSqliteConnection,
    epoch: u64,
}

tokio::task_local! {
    static AMBIENT_TX: Arc<[AmbientTx]>;
}

/// Whether the current task is inside a [`transactional`] body for any database.
#[must_use]
pub fn in_transaction() -> bool {
    AMBIENT_TX.try_with(|scopes| !scopes.is_empty()).unwrap_or(false)
}

fn ambient_for(pool_id: usize) -> Option<AmbientTx> {
    AMBIENT_TX
        .try_with(|scopes| scopes.iter().find(|tx| tx.pool_id == pool_id).cloned())
        .ok()
        .flatten()
}

/// A cursor on `db`'s ambient transaction connection, if the task has one open.
pub(crate) fn ambient_cursor(db: &Database, prepared: bool) -> Option<Cursor> {
    ambient_for(db.pool_id()).map(|tx| Cursor::new(tx.conn, tx.epoch, prepared))
}

/// Run `body` inside the current task's transaction on `db`, starting one if none is active.
///
/// The outermost call commits when `body` returns `Ok` and rolls back when it returns `Err`.
/// A rollback failure is logged and the body's error is returned. If `COMMIT` fails the
/// transaction is rolled back and the commit error is returned. Nested calls on the same
/// database run `body` directly and leave the outcome to the owner.
///
/// If the body panics or the returned future is dropped early, the connection rolls back before
/// it goes back to the pool, and statements still queued for it are discarded.
///
/// # Errors
/// Returns the body's error, or the error from checking out a connection, `BEGIN` or `COMMIT`.
pub async fn transactional<F, Fut, T>(db: &Database, body: F) -> Result<T, SqlDecorateError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, SqlDecorateError>>,
{
    let pool_id = db.pool_id();
    if ambient_for(pool_id).is_some() {
        return body().await;
    }

    let mut conn = db.get_connection().await?;
    conn.begin().await?;

    let mut scopes: Vec<AmbientTx> = AMBIENT_TX
        .try_with(|scopes| scopes.to_vec())
        .unwrap_or_default();
    scopes.push(AmbientTx {
        pool_id,
        conn: conn.handle(),
        epoch: conn.epoch(),
    });
    let outcome = AMBIENT_TX.scope(scopes.into(), body()).await;

    match outcome {
        Ok(value) => match conn.commit().await {
            Ok(()) => Ok(value),
            Err(commit_err) => {
                if let Err(rollback_err) = conn.rollback().await {
                    warn!(error = %rollback_err, "rollback after failed commit also failed");
                }
                Err(commit_err)
            }
        },
        Err(err) => {
            debug!(error = %err, "transaction body failed; rolling back");
            if let Err(rollback_err) = conn.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
