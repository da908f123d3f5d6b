use std::sync::Arc;

use tracing::debug;

use super::{Query, QueryOutput};
use crate::error::{BindingError, SqlDecorateError};
use crate::params::{IntoParams, ParamBinder, Params};
use crate::pool::Database;
use crate::results::{Row, map_row};
use crate::rewrite::{RewrittenQuery, rewrite, validate_batch};
use crate::sqlite::Cursor;
use crate::transaction::{ambient_cursor, transactional};

/// The operation a query definition performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Insert,
    BatchInsert,
    Select,
    SelectMany,
    Update,
    Delete,
    /// A multi-row select whose `:groupby` / `:orderby` values are spliced in as identifiers.
    SelectManyByQueryClauses,
}

/// The form of a query's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultShape {
    ScalarId,
    RowCount,
    SingleRow,
    RowList,
}

impl QueryKind {
    #[must_use]
    pub fn shape(self) -> ResultShape {
        match self {
            QueryKind::Insert => ResultShape::ScalarId,
            QueryKind::BatchInsert | QueryKind::Update | QueryKind::Delete => ResultShape::RowCount,
            QueryKind::Select => ResultShape::SingleRow,
            QueryKind::SelectMany | QueryKind::SelectManyByQueryClauses => ResultShape::RowList,
        }
    }
}

/// A SQL template paired with the kind of operation it performs.
///
/// Definitions are immutable; each execution rewrites the template into a fresh statement,
/// so one definition can be shared by any number of tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDefinition {
    sql: Arc<str>,
    kind: QueryKind,
    dictionary: bool,
}

impl QueryDefinition {
    #[must_use]
    pub fn new(kind: QueryKind, sql: impl Into<Arc<str>>) -> Self {
        Self {
            sql: sql.into(),
            kind,
            dictionary: true,
        }
    }

    #[must_use]
    pub fn insert(sql: impl Into<Arc<str>>) -> Self {
        Self::new(QueryKind::Insert, sql)
    }

    #[must_use]
    pub fn batch_insert(sql: impl Into<Arc<str>>) -> Self {
        Self::new(QueryKind::BatchInsert, sql)
    }

    #[must_use]
    pub fn select(sql: impl Into<Arc<str>>) -> Self {
        Self::new(QueryKind::Select, sql)
    }

    #[must_use]
    pub fn select_many(sql: impl Into<Arc<str>>) -> Self {
        Self::new(QueryKind::SelectMany, sql)
    }

    #[must_use]
    pub fn update(sql: impl Into<Arc<str>>) -> Self {
        Self::new(QueryKind::Update, sql)
    }

    #[must_use]
    pub fn delete(sql: impl Into<Arc<str>>) -> Self {
        Self::new(QueryKind::Delete, sql)
    }

    #[must_use]
    pub fn select_many_by_query_clauses(sql: impl Into<Arc<str>>) -> Self {
        Self::new(QueryKind::SelectManyByQueryClauses, sql)
    }

    /// Return rows as column → value maps (`true`, the default) or as plain value tuples.
    #[must_use]
    pub fn dictionary(mut self, dictionary: bool) -> Self {
        self.dictionary = dictionary;
        self
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    #[must_use]
    pub fn is_dictionary(&self) -> bool {
        self.dictionary
    }

    #[must_use]
    pub fn shape(&self) -> ResultShape {
        self.kind.shape()
    }

    /// Take parameters straight from the call arguments.
    #[must_use]
    pub fn bind<A: IntoParams>(self) -> Query<A> {
        Query::new(self, ParamBinder::args())
    }

    /// Compute parameters from the call arguments; `None` falls back to the arguments themselves.
    pub fn bind_with<A, F>(self, body: F) -> Query<A>
    where
        A: IntoParams,
        F: Fn(&A) -> Option<Params> + Send + Sync + 'static,
    {
        Query::new(self, ParamBinder::return_value(body))
    }

    /// Convert call arguments of any type into parameters.
    pub fn convert_with<A, F>(self, convert: F) -> Query<A>
    where
        F: Fn(&A) -> Params + Send + Sync + 'static,
    {
        Query::new(self, ParamBinder::converter(convert))
    }

    /// Bind `params` to the template and execute it.
    ///
    /// Binding happens before a connection is touched. Inside a [`transactional`] body on the
    /// same database the ambient connection is used; otherwise one is checked out of `db` for
    /// this call and returned afterwards.
    ///
    /// # Errors
    /// Returns `SqlDecorateError::BindingError` when the parameters do not fit the template,
    /// `SqlDecorateError::NotInitialized` for an uninitialized database, and engine errors as
    /// `SqlDecorateError::SqliteError`.
    pub async fn execute(
        &self,
        db: &Database,
        params: impl IntoParams,
    ) -> Result<QueryOutput, SqlDecorateError> {
        let params = params.into_params();
        if self.kind == QueryKind::BatchInsert {
            return self.execute_batch(db, params).await;
        }
        if self.kind == QueryKind::SelectManyByQueryClauses && !matches!(params, Params::Named(_)) {
            return Err(BindingError::NamedParamsRequired.into());
        }

        let rewritten = rewrite(&self.sql, params)?;
        match ambient_cursor(db, true) {
            Some(cursor) => self.run_on(&cursor, rewritten).await,
            None => {
                let conn = db.get_connection().await?;
                self.run_on(&conn.cursor(true), rewritten).await
            }
        }
    }

    async fn execute_batch(
        &self,
        db: &Database,
        params: Params,
    ) -> Result<QueryOutput, SqlDecorateError> {
        let Params::Batch(rows) = params else {
            return Err(BindingError::BatchRowsRequired.into());
        };
        validate_batch(&self.sql, &rows)?;

        let sql = &self.sql;
        let inserted = transactional(db, || async move {
            let cursor = ambient_cursor(db, true).ok_or_else(|| {
                SqlDecorateError::ExecutionError("batch insert ran outside its transaction".into())
            })?;
            cursor.execute_many(sql, &rows).await
        })
        .await?;
        debug!(rows = inserted, "batch insert finished");
        Ok(QueryOutput::RowCount(inserted))
    }

    async fn run_on(
        &self,
        cursor: &Cursor,
        rewritten: RewrittenQuery,
    ) -> Result<QueryOutput, SqlDecorateError> {
        let RewrittenQuery { sql, params } = rewritten;
        let output = match self.kind {
            QueryKind::Insert => {
                QueryOutput::LastInsertId(cursor.execute(&sql, &params).await?.last_insert_id)
            }
            QueryKind::Update | QueryKind::Delete => {
                QueryOutput::RowCount(cursor.execute(&sql, &params).await?.rows_affected)
            }
            QueryKind::Select => {
                let (column_names, row) = cursor.fetch_one(&sql, &params).await?.into_first();
                let row = if self.dictionary {
                    map_row(&column_names, row).map(Row::Mapped)
                } else {
                    row.map(Row::Tuple)
                };
                QueryOutput::Row(row)
            }
            QueryKind::SelectMany | QueryKind::SelectManyByQueryClauses => {
                let (column_names, rows) = cursor.fetch_all(&sql, &params).await?.into_parts();
                QueryOutput::Rows(
                    rows.into_iter()
                        .map(|values| Row::shape(&column_names, values, self.dictionary))
                        .collect(),
                )
            }
            QueryKind::BatchInsert => {
                return Err(SqlDecorateError::ExecutionError(
                    "batch inserts take a batch of rows".into(),
                ));
            }
        };
        Ok(output)
    }
}
