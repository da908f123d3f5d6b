use std::future::Future;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use bb8::Pool;
use tracing::info;

use crate::config::PoolConfig;
use crate::error::SqlDecorateError;
use crate::sqlite::{SqliteConnection, SqliteManager};

/// Configuration and connection pool for a database.
#[derive(Clone, Debug)]
pub struct ConfigAndPool {
    pub config: PoolConfig,
    pub pool: Pool<SqliteManager>,
}

impl ConfigAndPool {
    /// Validate `config` and build its pool.
    ///
    /// # Errors
    /// Returns `SqlDecorateError::ConfigError` for an invalid configuration, or
    /// `SqlDecorateError::ConnectionError` if the pool cannot be built.
    pub async fn new(config: PoolConfig) -> Result<Self, SqlDecorateError> {
        config.validate()?;
        config.warn_ignored_fields();
        let pool = SqliteManager::from_config(&config)
            .build_pool(&config)
            .await?;
        info!(
            pool = %config.pool_name,
            size = config.pool_size,
            database = %config.database,
            "sqlite pool initialized"
        );
        Ok(Self { config, pool })
    }

    /// Check a connection out of the pool, waiting up to the configured timeout.
    ///
    /// # Errors
    /// Returns `SqlDecorateError` if checkout times out or a new connection cannot be opened.
    pub async fn get_connection(&self) -> Result<SqliteConnection, SqlDecorateError> {
        let conn = self.pool.get_owned().await?;
        Ok(SqliteConnection::new(conn))
    }
}

/// Shared handle to a lazily initialized pool.
///
/// Cloning is cheap and every clone sees the same pool. Queries and transactions take a
/// `&Database`; using one before `init_from_config` or `init_from_conf_file` fails with
/// [`SqlDecorateError::NotInitialized`].
#[derive(Clone, Debug, Default)]
pub struct Database {
    inner: Arc<OnceLock<ConfigAndPool>>,
}

impl Database {
    /// An uninitialized handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a handle and initialize it from `config`.
    ///
    /// # Errors
    /// See [`Database::init_from_config`].
    pub async fn connect(config: PoolConfig) -> Result<Self, SqlDecorateError> {
        let db = Self::new();
        db.init_from_config(config).await?;
        Ok(db)
    }

    /// Initialize the pool from an in-memory configuration.
    ///
    /// # Errors
    /// Returns `SqlDecorateError::ConfigError` if the configuration is invalid or this handle is
    /// already initialized, and `SqlDecorateError::ConnectionError` if the pool cannot be built.
    pub async fn init_from_config(&self, config: PoolConfig) -> Result<(), SqlDecorateError> {
        if self.is_initialized() {
            return Err(already_initialized());
        }
        let config_and_pool = ConfigAndPool::new(config).await?;
        self.inner
            .set(config_and_pool)
            .map_err(|_| already_initialized())
    }

    /// Initialize the pool from a TOML configuration file.
    ///
    /// # Errors
    /// Returns `SqlDecorateError::ConfigError` if the file cannot be read or parsed, otherwise
    /// the errors of [`Database::init_from_config`].
    pub async fn init_from_conf_file(&self, path: impl AsRef<Path>) -> Result<(), SqlDecorateError> {
        let config = PoolConfig::from_file(path)?;
        self.init_from_config(config).await
    }

    /// Identity shared by every clone of this handle.
    pub(crate) fn pool_id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.get().is_some()
    }

    /// The configuration and pool behind this handle.
    ///
    /// # Errors
    /// Returns `SqlDecorateError::NotInitialized` before initialization.
    pub fn config_and_pool(&self) -> Result<&ConfigAndPool, SqlDecorateError> {
        self.inner.get().ok_or(SqlDecorateError::NotInitialized)
    }

    /// Check a connection out of the pool.
    ///
    /// # Errors
    /// Returns `SqlDecorateError::NotInitialized` before initialization, or the checkout error.
    pub async fn get_connection(&self) -> Result<SqliteConnection, SqlDecorateError> {
        self.config_and_pool()?.get_connection().await
    }

    /// Run `body` inside the ambient transaction of the current task.
    ///
    /// See [`crate::transaction::transactional`].
    ///
    /// # Errors
    /// Returns the body's error after rolling back, or the error from `BEGIN`/`COMMIT`.
    pub async fn transactional<F, Fut, T>(&self, body: F) -> Result<T, SqlDecorateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SqlDecorateError>>,
    {
        crate::transaction::transactional(self, body).await
    }
}

fn already_initialized() -> SqlDecorateError {
    SqlDecorateError::ConfigError("database already initialized".into())
}
