use thiserror::Error;

/// Errors raised while binding parameters to a SQL template.
///
/// These are always detected before a connection is checked out, so a binding error never
/// leaves partial work behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("expected {expected} parameter(s) for {expected} placeholder(s), got {supplied}")]
    PlaceholderCountMismatch { expected: usize, supplied: usize },

    #[error("missing value for named placeholder :{0}")]
    MissingNamedParam(String),

    #[error("named parameter {0:?} is not referenced by the query")]
    UnusedNamedParam(String),

    #[error("`:name` placeholders cannot be mixed with `?` placeholders")]
    MixedPlaceholders,

    #[error("numbered placeholder `?{0}` is not supported; use bare `?`")]
    NumberedPlaceholder(String),

    #[error("{0}")]
    DialectMismatch(String),

    #[error("this query only accepts named parameters")]
    NamedParamsRequired,

    #[error("value for :{name} must match [a-zA-Z0-9_ ]*, got {value:?}")]
    InvalidIdentifier { name: String, value: String },

    #[error("list parameter at {0} is empty")]
    EmptyList(String),

    #[error("batch insert needs at least one row")]
    EmptyBatch,

    #[error("batch insert needs a sequence of rows")]
    BatchRowsRequired,
}

#[derive(Debug, Error)]
pub enum SqlDecorateError {
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error(transparent)]
    BindingError(#[from] BindingError),

    #[error("Database not initialized; call Database::init_from_config or init_from_conf_file first")]
    NotInitialized,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),
}

impl From<bb8::RunError<rusqlite::Error>> for SqlDecorateError {
    fn from(err: bb8::RunError<rusqlite::Error>) -> Self {
        match err {
            bb8::RunError::User(e) => SqlDecorateError::SqliteError(e),
            bb8::RunError::TimedOut => {
                SqlDecorateError::ConnectionError("sqlite checkout timed out".into())
            }
        }
    }
}

impl From<toml::de::Error> for SqlDecorateError {
    fn from(err: toml::de::Error) -> Self {
        SqlDecorateError::ConfigError(format!("invalid TOML: {err}"))
    }
}
