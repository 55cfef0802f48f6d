use async_trait::async_trait;
use uuid::Uuid;

use crate::database::models::session::SESSIONS;
use crate::database::models::{NewSession, RowsEffected, Session, SessionField, SessionList, SessionUpdate};
use crate::database::repository::Repository;
use crate::database::{DatabaseError, DatabaseManager};
use crate::filter::{ColumnKind, GetListFilter, SqlValue, UpdateFieldRequest};
use crate::usecase::SessionRepo;

pub struct PgSessionRepo {
    repo: Repository<Session>,
}

impl PgSessionRepo {
    pub fn new(db: DatabaseManager) -> Self {
        Self { repo: Repository::new(&SESSIONS, db) }
    }
}

#[async_trait]
impl SessionRepo for PgSessionRepo {
    async fn create(&self, session: NewSession) -> Result<Session, DatabaseError> {
        let sql = self.repo.filter()?.to_insert_sql(vec![
            ("id", Uuid::new_v4().into()),
            ("user_id", session.user_id.into()),
            ("ip_address", session.ip_address.into()),
            ("user_agent", session.user_agent.into()),
            ("platform", session.platform.into()),
            ("is_active", true.into()),
            ("expires_at", session.expires_at.into()),
        ])?;
        self.repo
            .returning(&sql)
            .await?
            .ok_or_else(|| DatabaseError::Decode("insert returned no row".to_string()))
    }

    async fn get_single(&self, id: Uuid) -> Result<Session, DatabaseError> {
        self.repo.select_404("id", id.into()).await
    }

    async fn get_list(&self, req: GetListFilter) -> Result<SessionList, DatabaseError> {
        let (sessions, count) = self.repo.select_list(&req).await?;
        Ok(SessionList { sessions, count })
    }

    async fn update(&self, update: SessionUpdate) -> Result<Session, DatabaseError> {
        let update = update.normalized();
        let sql = self.repo.filter()?.to_patch_sql(
            ("id", update.id.into()),
            vec![
                ("platform", SqlValue::opt(update.platform, ColumnKind::Text)),
                ("is_active", SqlValue::opt(update.is_active, ColumnKind::Bool)),
                ("expires_at", SqlValue::opt(update.expires_at, ColumnKind::Timestamp)),
                ("last_active_at", SqlValue::opt(update.last_active_at, ColumnKind::Timestamp)),
            ],
            vec![],
        )?;
        self.repo
            .returning(&sql)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("sessions record not found".to_string()))
    }

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.repo.delete_404(id).await
    }

    async fn update_field(&self, req: UpdateFieldRequest<SessionField>) -> Result<RowsEffected, DatabaseError> {
        self.repo.update_fields(&req).await
    }
}
