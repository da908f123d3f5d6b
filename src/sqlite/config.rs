use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LockResult, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bb8::{ManageConnection, Pool};

use crate::config::PoolConfig;
use crate::error::SqlDecorateError;

/// A `rusqlite` connection shared between the async side and blocking workers.
pub type SharedSqliteConnection = Arc<SqliteSession>;

/// A pooled `SQLite` connection plus a counter of finished transactions and checkouts.
///
/// Work queued for a blocking thread records the epoch it was issued under. Once the epoch
/// moves on, that work is refused instead of running against whatever state the connection
/// is in by then.
pub struct SqliteSession {
    conn: Mutex<rusqlite::Connection>,
    epoch: AtomicU64,
}

impl SqliteSession {
    fn new(conn: rusqlite::Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            epoch: AtomicU64::new(0),
        }
    }

    pub(crate) fn lock(&self) -> LockResult<MutexGuard<'_, rusqlite::Connection>> {
        self.conn.lock()
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Invalidate every cursor and queued statement issued under the current epoch.
    pub(crate) fn advance_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    fn is_poisoned(&self) -> bool {
        self.conn.is_poisoned()
    }
}

impl fmt::Debug for SqliteSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteSession")
            .field("epoch", &self.epoch())
            .finish_non_exhaustive()
    }
}

/// bb8 manager for `SQLite` connections.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    db_path: String,
    busy_timeout: Duration,
    reset_session: bool,
}

impl SqliteManager {
    #[must_use]
    pub fn from_config(config: &PoolConfig) -> Self {
        Self {
            db_path: config.database.clone(),
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
            reset_session: config.pool_reset_session,
        }
    }

    /// Build a pool from this manager.
    ///
    /// # Errors
    /// Returns `SqlDecorateError` if the initial connections cannot be opened.
    pub async fn build_pool(self, config: &PoolConfig) -> Result<Pool<SqliteManager>, SqlDecorateError> {
        Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .test_on_check_out(true)
            .build(self)
            .await
            .map_err(|e| {
                SqlDecorateError::ConnectionError(format!(
                    "failed to build pool {:?}: {e}",
                    config.pool_name
                ))
            })
    }

    fn open(&self) -> Result<rusqlite::Connection, rusqlite::Error> {
        let conn = rusqlite::Connection::open(&self.db_path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        Ok(conn)
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SharedSqliteConnection;
    type Error = rusqlite::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let opened = self.open().map(|conn| Arc::new(SqliteSession::new(conn)));
        async move { opened }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let checked = reset_session(conn, self.reset_session);
        async move { checked }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_poisoned()
    }
}

/// Validate a connection on checkout, rolling back a transaction a previous holder left open.
fn reset_session(conn: &SharedSqliteConnection, reset: bool) -> Result<(), rusqlite::Error> {
    let guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
    if reset && !guard.is_autocommit() {
        tracing::warn!("rolling back transaction left open on a pooled connection");
        guard.execute_batch("ROLLBACK")?;
    }
    guard.query_row("SELECT 1", [], |_| Ok(()))
}
