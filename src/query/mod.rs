//! Declarative query definitions and their execution.
//!
//! ```no_run
//! use sql_decorate::prelude::*;
//!
//! # async fn run(db: &Database) -> Result<(), SqlDecorateError> {
//! let find = QueryDefinition::select("select id, name from users where id = ?").bind::<(i64,)>();
//! if let Some(row) = find.call(db, (1,)).await?.into_row()? {
//!     println!("{:?}", row.get("name"));
//! }
//! # Ok(())
//! # }
//! ```

mod definition;
mod output;

use std::fmt;

pub use definition::{QueryDefinition, QueryKind, ResultShape};
pub use output::QueryOutput;

use crate::error::SqlDecorateError;
use crate::params::ParamBinder;
use crate::pool::Database;

/// A query definition together with the way its call arguments become parameters.
pub struct Query<A> {
    definition: QueryDefinition,
    binder: ParamBinder<A>,
}

impl<A> Query<A> {
    #[must_use]
    pub fn new(definition: QueryDefinition, binder: ParamBinder<A>) -> Self {
        Self { definition, binder }
    }

    #[must_use]
    pub fn definition(&self) -> &QueryDefinition {
        &self.definition
    }

    /// Normalize `args` into parameters and execute the query.
    ///
    /// # Errors
    /// See [`QueryDefinition::execute`].
    pub async fn call(&self, db: &Database, args: A) -> Result<QueryOutput, SqlDecorateError> {
        let params = self.binder.normalize(args);
        self.definition.execute(db, params).await
    }
}

impl<A> Clone for Query<A> {
    fn clone(&self) -> Self {
        Self {
            definition: self.definition.clone(),
            binder: self.binder.clone(),
        }
    }
}

impl<A> fmt::Debug for Query<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("definition", &self.definition)
            .field("binder", &self.binder)
            .finish()
    }
}
