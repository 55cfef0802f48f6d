use sqlx::{postgres::PgRow, FromRow};
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::RowsEffected;
use crate::filter::{FilterQuery, GetListFilter, SqlResult, SqlValue, TableSpec, UpdatableField, UpdateFieldRequest};

/// Table-generic operations shared by the entity repositories.
pub struct Repository<T> {
    table: &'static TableSpec,
    db: DatabaseManager,
    _phantom: std::marker::PhantomData<fn() -> T>,
}

impl<T> Repository<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    pub fn new(table: &'static TableSpec, db: DatabaseManager) -> Self {
        Self { table, db, _phantom: std::marker::PhantomData }
    }

    pub fn filter(&self) -> Result<FilterQuery<'static>, DatabaseError> {
        Ok(FilterQuery::new(self.table)?)
    }

    /// One page plus the total count for the same predicate. Both statements
    /// run concurrently on separate connections.
    pub async fn select_list(&self, req: &GetListFilter) -> Result<(Vec<T>, i64), DatabaseError> {
        let sql = self.filter()?.to_list_sql(req)?;
        let query = self.db.query();
        futures::try_join!(query.fetch_all::<T>(&sql.rows), query.count(&sql.count))
    }

    pub async fn select_optional(&self, column: &str, value: SqlValue) -> Result<Option<T>, DatabaseError> {
        let sql = self.filter()?.to_select_by_sql(column, value)?;
        self.db.query().fetch_optional(&sql).await
    }

    pub async fn select_404(&self, column: &str, value: SqlValue) -> Result<T, DatabaseError> {
        self.select_optional(column, value)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} record not found", self.table.name)))
    }

    /// Runs an `INSERT/UPDATE ... RETURNING` statement.
    pub async fn returning(&self, sql: &SqlResult) -> Result<Option<T>, DatabaseError> {
        self.db.query().fetch_optional(sql).await
    }

    pub async fn delete_404(&self, id: Uuid) -> Result<(), DatabaseError> {
        let sql = self.filter()?.to_delete_by_sql("id", SqlValue::Uuid(id))?;
        match self.db.query().execute(&sql).await? {
            0 => Err(DatabaseError::NotFound(format!("{} record not found", self.table.name))),
            _ => Ok(()),
        }
    }

    pub async fn update_fields<F: UpdatableField>(
        &self,
        req: &UpdateFieldRequest<F>,
    ) -> Result<RowsEffected, DatabaseError> {
        self.update_fields_excluding(req, vec![]).await
    }

    /// Rows matching any `exclude` equality are skipped inside the same
    /// statement.
    pub async fn update_fields_excluding<F: UpdatableField>(
        &self,
        req: &UpdateFieldRequest<F>,
        exclude: Vec<(&str, SqlValue)>,
    ) -> Result<RowsEffected, DatabaseError> {
        // Validation failures surface before any statement reaches the pool.
        let sql = self.filter()?.to_update_sql_excluding(req, exclude)?;
        let rows = self.db.query().execute(&sql).await?;
        Ok(RowsEffected::from(rows))
    }
}
