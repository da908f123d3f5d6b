//! Declarative SQL queries over a pooled `SQLite` database.
//!
//! A [`QueryDefinition`] pairs a SQL template with the kind of operation it performs. Calling it
//! binds the parameters (`?` positional with list expansion, or `:name` named with `groupby` /
//! `orderby` identifier clauses), checks a connection out of the [`Database`] pool, executes
//! the statement and shapes the result. [`transactional`] scopes a transaction to the current
//! tokio task so that nested queries share it.
//!
//! ```no_run
//! use sql_decorate::prelude::*;
//!
//! # async fn run() -> Result<(), SqlDecorateError> {
//! let db = Database::connect(PoolConfig::new("app.db")).await?;
//! let add = QueryDefinition::insert("insert into users (name) values (?)").bind::<(String,)>();
//! let rename = QueryDefinition::update("update users set name = :name where id = :id")
//!     .bind::<Params>();
//!
//! db.transactional(|| async {
//!     let id = add.call(&db, ("ada".to_string(),)).await?.last_insert_id();
//!     rename
//!         .call(&db, named_params! { "name" => "Ada", "id" => id.unwrap_or_default() })
//!         .await?;
//!     Ok(())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod params;
pub mod pool;
pub mod prelude;
pub mod query;
pub mod results;
pub mod rewrite;
pub mod sqlite;
pub mod transaction;
pub mod types;

pub use config::{PoolConfig, PoolConfigBuilder};
pub use error::{BindingError, SqlDecorateError};
pub use params::{IntoParams, NamedParams, ParamBinder, ParamValue, Params};
pub use pool::{ConfigAndPool, Database};
pub use query::{Query, QueryDefinition, QueryKind, QueryOutput, ResultShape};
pub use results::{MappedRow, ResultSet, Row, map_row};
pub use rewrite::{RewrittenQuery, rewrite};
pub use transaction::{in_transaction, transactional};
pub use types::RowValues;
