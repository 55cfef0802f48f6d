use sqlx::{
    postgres::{PgArguments, PgRow},
    Arguments, FromRow, PgPool,
};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::filter::{ColumnKind, SqlResult, SqlValue};

/// Executes built statements against the pool, binding every `SqlValue`
/// positionally and bounding each round trip by the statement timeout.
pub struct QueryBuilder<'p> {
    pool: &'p PgPool,
    statement_timeout: Duration,
    log_queries: bool,
}

impl<'p> QueryBuilder<'p> {
    pub fn new(pool: &'p PgPool, statement_timeout: Duration, log_queries: bool) -> Self {
        Self { pool, statement_timeout, log_queries }
    }

    pub async fn fetch_all<T>(&self, sql: &SqlResult) -> Result<Vec<T>, DatabaseError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        self.log(sql);
        let q = sqlx::query_as_with::<_, T, _>(&sql.query, bind_params(&sql.params));
        self.bounded(q.fetch_all(self.pool)).await
    }

    pub async fn fetch_optional<T>(&self, sql: &SqlResult) -> Result<Option<T>, DatabaseError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        self.log(sql);
        let q = sqlx::query_as_with::<_, T, _>(&sql.query, bind_params(&sql.params));
        self.bounded(q.fetch_optional(self.pool)).await
    }

    pub async fn count(&self, sql: &SqlResult) -> Result<i64, DatabaseError> {
        self.log(sql);
        let q = sqlx::query_scalar_with::<_, i64, _>(&sql.query, bind_params(&sql.params));
        self.bounded(q.fetch_one(self.pool)).await
    }

    /// Returns the number of affected rows.
    pub async fn execute(&self, sql: &SqlResult) -> Result<u64, DatabaseError> {
        self.log(sql);
        let q = sqlx::query_with(&sql.query, bind_params(&sql.params));
        let result = self.bounded(q.execute(self.pool)).await?;
        Ok(result.rows_affected())
    }

    pub async fn execute_raw(&self, query: &str) -> Result<u64, DatabaseError> {
        let result = self.bounded(sqlx::query(query).execute(self.pool)).await?;
        Ok(result.rows_affected())
    }

    async fn bounded<F, T>(&self, fut: F) -> Result<T, DatabaseError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.statement_timeout, fut).await {
            Ok(result) => result.map_err(DatabaseError::from),
            Err(_) => {
                warn!("Statement exceeded {:?}", self.statement_timeout);
                Err(DatabaseError::Timeout)
            }
        }
    }

    fn log(&self, sql: &SqlResult) {
        if self.log_queries {
            debug!(query = %sql.query, params = sql.params.len(), "executing statement");
        }
    }
}

/// Values are cloned into the argument buffer so the statement owns them.
pub fn bind_params(params: &[SqlValue]) -> PgArguments {
    let mut args = PgArguments::default();
    for value in params {
        match value {
            SqlValue::Text(s) => args.add(s.clone()),
            SqlValue::Uuid(u) => args.add(*u),
            SqlValue::Int(i) => args.add(*i),
            SqlValue::Float(f) => args.add(*f),
            SqlValue::Bool(b) => args.add(*b),
            SqlValue::Timestamp(t) => args.add(*t),
            SqlValue::TextArray(items) => args.add(items.clone()),
            SqlValue::Null(kind) => match kind {
                ColumnKind::Text => args.add(None::<String>),
                ColumnKind::Uuid => args.add(None::<Uuid>),
                ColumnKind::Float => args.add(None::<f64>),
                ColumnKind::Bool => args.add(None::<bool>),
                ColumnKind::Timestamp => args.add(None::<DateTime<Utc>>),
                ColumnKind::TextArray => args.add(None::<Vec<String>>),
            },
        }
    }
    args
}
