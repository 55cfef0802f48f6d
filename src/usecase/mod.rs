//! Repository contracts and the aggregate handed to HTTP handlers.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::models::{
    Business, BusinessField, BusinessList, BusinessUpdate, NewBusiness, NewSession, NewUser, RowsEffected, Session,
    SessionField, SessionList, SessionUpdate, User, UserField, UserList, UserLookup, UserRole, UserUpdate,
};
use crate::database::DatabaseError;
use crate::filter::{GetListFilter, UpdateFieldRequest};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, DatabaseError>;
    async fn get_single(&self, lookup: UserLookup) -> Result<User, DatabaseError>;
    async fn get_list(&self, req: GetListFilter) -> Result<UserList, DatabaseError>;
    /// Partial update; enforces the administrative status transitions.
    async fn update(&self, update: UserUpdate) -> Result<User, DatabaseError>;
    /// Moves an `inverify` account to `active`.
    async fn verify(&self, id: Uuid) -> Result<User, DatabaseError>;
    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError>;
    async fn update_field(&self, req: UpdateFieldRequest<UserField>) -> Result<RowsEffected, DatabaseError>;
    /// Like `update_field`, but accounts holding `spared` are left untouched.
    async fn update_field_sparing(
        &self,
        req: UpdateFieldRequest<UserField>,
        spared: UserRole,
    ) -> Result<RowsEffected, DatabaseError>;
}

#[async_trait]
pub trait SessionRepo: Send + Sync {
    async fn create(&self, session: NewSession) -> Result<Session, DatabaseError>;
    async fn get_single(&self, id: Uuid) -> Result<Session, DatabaseError>;
    async fn get_list(&self, req: GetListFilter) -> Result<SessionList, DatabaseError>;
    async fn update(&self, update: SessionUpdate) -> Result<Session, DatabaseError>;
    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError>;
    async fn update_field(&self, req: UpdateFieldRequest<SessionField>) -> Result<RowsEffected, DatabaseError>;
}

#[async_trait]
pub trait BusinessRepo: Send + Sync {
    async fn create(&self, business: NewBusiness) -> Result<Business, DatabaseError>;
    async fn get_single(&self, id: Uuid) -> Result<Business, DatabaseError>;
    async fn get_list(&self, req: GetListFilter) -> Result<BusinessList, DatabaseError>;
    async fn update(&self, update: BusinessUpdate) -> Result<Business, DatabaseError>;
    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError>;
    async fn update_field(&self, req: UpdateFieldRequest<BusinessField>) -> Result<RowsEffected, DatabaseError>;
}

#[derive(Clone)]
pub struct UseCase {
    pub users: Arc<dyn UserRepo>,
    pub sessions: Arc<dyn SessionRepo>,
    pub businesses: Arc<dyn BusinessRepo>,
}

impl UseCase {
    pub fn new(users: Arc<dyn UserRepo>, sessions: Arc<dyn SessionRepo>, businesses: Arc<dyn BusinessRepo>) -> Self {
        Self { users, sessions, businesses }
    }

    pub fn postgres(db: crate::database::DatabaseManager) -> Self {
        use crate::database::repos::{PgBusinessRepo, PgSessionRepo, PgUserRepo};
        Self::new(
            Arc::new(PgUserRepo::new(db.clone())),
            Arc::new(PgSessionRepo::new(db.clone())),
            Arc::new(PgBusinessRepo::new(db)),
        )
    }
}
