use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::database::models::business::BUSINESSES;
use crate::database::models::{Business, BusinessField, BusinessList, BusinessUpdate, NewBusiness, RowsEffected};
use crate::database::repository::Repository;
use crate::database::{DatabaseError, DatabaseManager};
use crate::filter::{ColumnKind, GetListFilter, SqlValue, UpdateFieldRequest};
use crate::usecase::BusinessRepo;

pub struct PgBusinessRepo {
    repo: Repository<Business>,
}

impl PgBusinessRepo {
    pub fn new(db: DatabaseManager) -> Self {
        Self { repo: Repository::new(&BUSINESSES, db) }
    }
}

#[async_trait]
impl BusinessRepo for PgBusinessRepo {
    async fn create(&self, business: NewBusiness) -> Result<Business, DatabaseError> {
        let sql = self.repo.filter()?.to_insert_sql(vec![
            ("id", Uuid::new_v4().into()),
            ("name", business.name.into()),
            ("category", business.category.into()),
            ("description", business.description.into()),
            ("contact_information", business.contact_information.into()),
            ("latitude", business.location.latitude.into()),
            ("longitude", business.location.longitude.into()),
            ("attachments", business.attachments.into()),
            ("created_by", business.created_by.into()),
        ])?;
        let created = self
            .repo
            .returning(&sql)
            .await?
            .ok_or_else(|| DatabaseError::Decode("insert returned no row".to_string()))?;
        info!("Created business {} ({})", created.id, created.category);
        Ok(created)
    }

    async fn get_single(&self, id: Uuid) -> Result<Business, DatabaseError> {
        self.repo.select_404("id", id.into()).await
    }

    async fn get_list(&self, req: GetListFilter) -> Result<BusinessList, DatabaseError> {
        let (businesses, count) = self.repo.select_list(&req).await?;
        Ok(BusinessList { businesses, count })
    }

    async fn update(&self, update: BusinessUpdate) -> Result<Business, DatabaseError> {
        let update = update.normalized();
        let (latitude, longitude) = match update.location {
            Some(l) => (Some(l.latitude), Some(l.longitude)),
            None => (None, None),
        };
        let sql = self.repo.filter()?.to_patch_sql(
            ("id", update.id.into()),
            vec![
                ("name", SqlValue::opt(update.name, ColumnKind::Text)),
                ("category", SqlValue::opt(update.category, ColumnKind::Text)),
                ("description", SqlValue::opt(update.description, ColumnKind::Text)),
                ("contact_information", SqlValue::opt(update.contact_information, ColumnKind::Text)),
                ("latitude", SqlValue::opt(latitude, ColumnKind::Float)),
                ("longitude", SqlValue::opt(longitude, ColumnKind::Float)),
                ("attachments", SqlValue::opt(update.attachments, ColumnKind::TextArray)),
            ],
            vec![],
        )?;
        self.repo
            .returning(&sql)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("businesses record not found".to_string()))
    }

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.repo.delete_404(id).await
    }

    async fn update_field(&self, req: UpdateFieldRequest<BusinessField>) -> Result<RowsEffected, DatabaseError> {
        self.repo.update_fields(&req).await
    }
}
