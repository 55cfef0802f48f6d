use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::config::DatabaseConfig;
use crate::database::query_builder::QueryBuilder;
use crate::filter::FilterError;

/// Postgres SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Errors from the database layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Statement timed out")]
    Timeout,

    #[error("Decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                let constraint = db.constraint().unwrap_or("unique constraint").to_string();
                DatabaseError::Conflict(constraint)
            }
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) => {
                let constraint = db.constraint().unwrap_or("foreign key").to_string();
                DatabaseError::Conflict(constraint)
            }
            sqlx::Error::ColumnDecode { ref index, ref source } => {
                DatabaseError::Decode(format!("column {}: {}", index, source))
            }
            other => DatabaseError::Sqlx(other),
        }
    }
}

impl From<FilterError> for DatabaseError {
    fn from(err: FilterError) -> Self {
        DatabaseError::Validation(err.to_string())
    }
}

/// Owns the connection pool plus the per-statement execution settings.
///
/// Cloning is cheap: `PgPool` is reference counted.
#[derive(Clone)]
pub struct DatabaseManager {
    pool: PgPool,
    statement_timeout: Duration,
    log_queries: bool,
}

impl DatabaseManager {
    /// Connect using the database section of the application config.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let raw = config.url.as_deref().ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
        let url = url::Url::parse(raw).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(DatabaseError::InvalidDatabaseUrl);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url.as_str())
            .await?;

        info!(
            "Created database pool for {} (max {} connections)",
            Self::redacted(&url),
            config.max_connections
        );

        Ok(Self::from_pool(
            pool,
            Duration::from_millis(config.statement_timeout_ms),
            config.enable_query_logging,
        ))
    }

    pub fn from_pool(pool: PgPool, statement_timeout: Duration, log_queries: bool) -> Self {
        Self { pool, statement_timeout, log_queries }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Statement executor bound to this pool's timeout and logging settings.
    pub fn query(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(&self.pool, self.statement_timeout, self.log_queries)
    }

    /// Apply the embedded migrations under `migrations/`.
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| {
            error!("Migration failed: {}", e);
            DatabaseError::from(e)
        })?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        self.query().execute_raw("SELECT 1").await?;
        Ok(())
    }

    /// Close the pool (e.g., on shutdown)
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }

    /// Connection string with the password masked, for logs.
    fn redacted(url: &url::Url) -> String {
        let mut url = url.clone();
        if url.password().is_some() {
            let _ = url.set_password(Some("***"));
        }
        url.to_string()
    }
}
