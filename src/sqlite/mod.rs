// SQLite engine adapter.
//
// - config: pool manager and connection setup
// - params: value conversion into rusqlite values
// - query: row extraction and result building
// - connection: pooled connection wrapper and transaction control
// - cursor: statement execution

pub mod config;
pub mod connection;
pub mod cursor;
pub mod params;
pub mod query;

pub use config::{SharedSqliteConnection, SqliteManager, SqliteSession};
pub use connection::{SqliteConnection, SqlitePooledConnection};
pub use cursor::{Cursor, ExecOutcome};
pub use query::build_result_set;
