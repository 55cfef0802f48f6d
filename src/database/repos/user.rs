use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::database::models::user::USERS;
use crate::database::models::{
    NewUser, RowsEffected, User, UserField, UserList, UserLookup, UserRole, UserStatus, UserUpdate,
};
use crate::database::repository::Repository;
use crate::database::{DatabaseError, DatabaseManager};
use crate::filter::{ColumnKind, GetListFilter, SqlValue, UpdateFieldRequest};
use crate::usecase::UserRepo;

pub struct PgUserRepo {
    repo: Repository<User>,
}

impl PgUserRepo {
    pub fn new(db: DatabaseManager) -> Self {
        Self { repo: Repository::new(&USERS, db) }
    }

    /// Runs a status-guarded patch. Zero rows after the existence check means
    /// the status moved under us.
    async fn patch_guarded(
        &self,
        id: Uuid,
        changes: Vec<(&str, SqlValue)>,
        expected: UserStatus,
    ) -> Result<User, DatabaseError> {
        let sql = self
            .repo
            .filter()?
            .to_patch_sql(("id", id.into()), changes, vec![("status", expected.into())])?;
        self.repo
            .returning(&sql)
            .await?
            .ok_or_else(|| DatabaseError::Conflict("user status changed concurrently".to_string()))
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn create(&self, user: NewUser) -> Result<User, DatabaseError> {
        let sql = self.repo.filter()?.to_insert_sql(vec![
            ("id", Uuid::new_v4().into()),
            ("email", user.email.into()),
            ("full_name", user.full_name.into()),
            ("password", user.password.into()),
            ("user_type", user.user_type.into()),
            ("user_role", user.user_role.into()),
            ("status", user.status.into()),
        ])?;
        let created = self
            .repo
            .returning(&sql)
            .await?
            .ok_or_else(|| DatabaseError::Decode("insert returned no row".to_string()))?;
        info!("Created user {}", created.id);
        Ok(created)
    }

    async fn get_single(&self, lookup: UserLookup) -> Result<User, DatabaseError> {
        let (column, value) = lookup.column_value();
        self.repo.select_404(column, value).await
    }

    async fn get_list(&self, req: GetListFilter) -> Result<UserList, DatabaseError> {
        let (users, count) = self.repo.select_list(&req).await?;
        Ok(UserList { users, count })
    }

    async fn update(&self, update: UserUpdate) -> Result<User, DatabaseError> {
        let update = update.normalized();
        let current = self.get_single(UserLookup::Id(update.id)).await?;
        if let Some(to) = update.status {
            current.status.check_update(to).map_err(|e| DatabaseError::Validation(e.to_string()))?;
        }

        let changes = vec![
            ("email", SqlValue::opt(update.email, ColumnKind::Text)),
            ("full_name", SqlValue::opt(update.full_name, ColumnKind::Text)),
            ("password", SqlValue::opt(update.password, ColumnKind::Text)),
            ("user_type", SqlValue::opt(update.user_type, ColumnKind::Text)),
            ("user_role", SqlValue::opt(update.user_role, ColumnKind::Text)),
            ("status", SqlValue::opt(update.status, ColumnKind::Text)),
        ];
        self.patch_guarded(update.id, changes, current.status).await
    }

    async fn verify(&self, id: Uuid) -> Result<User, DatabaseError> {
        let current = self.get_single(UserLookup::Id(id)).await?;
        current.status.check_verify().map_err(|e| DatabaseError::Validation(e.to_string()))?;
        let user = self
            .patch_guarded(id, vec![("status", UserStatus::Active.into())], UserStatus::InVerify)
            .await?;
        info!("User {} verified", user.id);
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.repo.delete_404(id).await
    }

    async fn update_field(&self, req: UpdateFieldRequest<UserField>) -> Result<RowsEffected, DatabaseError> {
        self.repo.update_fields(&req).await
    }

    async fn update_field_sparing(
        &self,
        req: UpdateFieldRequest<UserField>,
        spared: UserRole,
    ) -> Result<RowsEffected, DatabaseError> {
        self.repo.update_fields_excluding(&req, vec![("user_role", spared.into())]).await
    }
}
