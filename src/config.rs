use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SqlDecorateError;

/// Pool configuration.
///
/// Loaded from a flat TOML table (`pool_name`, `pool_size`, `db`, ...). Network fields are accepted
/// so that existing configuration files parse unchanged, but the `SQLite` engine ignores them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_pool_name")]
    pub pool_name: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// `SQLite` database file path.
    #[serde(alias = "db")]
    pub database: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub charset: Option<String>,
    /// Roll back transactions left open on a connection when it is checked out again.
    #[serde(default = "default_true")]
    pub pool_reset_session: bool,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
}

fn default_pool_name() -> String {
    "default".to_string()
}

fn default_pool_size() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_connection_timeout_ms() -> u64 {
    30_000
}

impl PoolConfig {
    /// Configuration for `database` with every other field at its default.
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            pool_name: default_pool_name(),
            pool_size: default_pool_size(),
            database: database.into(),
            host: None,
            port: None,
            user: None,
            password: None,
            charset: None,
            pool_reset_session: true,
            busy_timeout_ms: default_busy_timeout_ms(),
            connection_timeout_ms: default_connection_timeout_ms(),
        }
    }

    #[must_use]
    pub fn builder(database: impl Into<String>) -> PoolConfigBuilder {
        PoolConfigBuilder::new(database)
    }

    /// Parse a configuration from TOML text.
    ///
    /// # Errors
    /// Returns `SqlDecorateError::ConfigError` if the text is not valid TOML or misses `database`.
    pub fn from_toml_str(content: &str) -> Result<Self, SqlDecorateError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a configuration from a TOML file.
    ///
    /// # Errors
    /// Returns `SqlDecorateError::ConfigError` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SqlDecorateError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SqlDecorateError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Check the values a pool cannot be built without.
    ///
    /// # Errors
    /// Returns `SqlDecorateError::ConfigError` for an empty database path or a zero pool size.
    pub fn validate(&self) -> Result<(), SqlDecorateError> {
        if self.database.trim().is_empty() {
            return Err(SqlDecorateError::ConfigError(
                "database path must not be empty".into(),
            ));
        }
        if self.pool_size == 0 {
            return Err(SqlDecorateError::ConfigError(
                "pool_size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Names of the network fields that are set but have no meaning for `SQLite`.
    #[must_use]
    pub fn ignored_fields(&self) -> Vec<&'static str> {
        [
            ("host", self.host.is_some()),
            ("port", self.port.is_some()),
            ("user", self.user.is_some()),
            ("password", self.password.is_some()),
            ("charset", self.charset.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }

    pub(crate) fn warn_ignored_fields(&self) {
        let ignored = self.ignored_fields();
        if !ignored.is_empty() {
            warn!(pool = %self.pool_name, fields = ?ignored, "network settings are ignored by the sqlite engine");
        }
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("pool_name", &self.pool_name)
            .field("pool_size", &self.pool_size)
            .field("database", &self.database)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("charset", &self.charset)
            .field("pool_reset_session", &self.pool_reset_session)
            .field("busy_timeout_ms", &self.busy_timeout_ms)
            .field("connection_timeout_ms", &self.connection_timeout_ms)
            .finish()
    }
}

/// Fluent builder for [`PoolConfig`].
#[derive(Debug, Clone)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            config: PoolConfig::new(database),
        }
    }

    #[must_use]
    pub fn pool_name(mut self, pool_name: impl Into<String>) -> Self {
        self.config.pool_name = pool_name.into();
        self
    }

    #[must_use]
    pub fn pool_size(mut self, pool_size: u32) -> Self {
        self.config.pool_size = pool_size;
        self
    }

    #[must_use]
    pub fn pool_reset_session(mut self, reset: bool) -> Self {
        self.config.pool_reset_session = reset;
        self
    }

    #[must_use]
    pub fn busy_timeout_ms(mut self, millis: u64) -> Self {
        self.config.busy_timeout_ms = millis;
        self
    }

    #[must_use]
    pub fn connection_timeout_ms(mut self, millis: u64) -> Self {
        self.config.connection_timeout_ms = millis;
        self
    }

    #[must_use]
    pub fn finish(self) -> PoolConfig {
        self.config
    }
}
