mod core;
mod tx;

pub(crate) use self::core::{run_blocking, run_in_epoch};
pub use self::core::{SqliteConnection, SqlitePooledConnection};
