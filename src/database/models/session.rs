use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::filter::{ColumnKind, ColumnSpec, SqlValue, TableSpec, UpdatableField};

pub static SESSIONS: TableSpec = TableSpec {
    name: "sessions",
    columns: &[
        ColumnSpec::new("id", ColumnKind::Uuid),
        ColumnSpec::new("user_id", ColumnKind::Uuid),
        ColumnSpec::new("ip_address", ColumnKind::Text),
        ColumnSpec::new("user_agent", ColumnKind::Text),
        ColumnSpec::new("platform", ColumnKind::Text),
        ColumnSpec::new("is_active", ColumnKind::Bool),
        ColumnSpec::new("expires_at", ColumnKind::Timestamp),
        ColumnSpec::new("last_active_at", ColumnKind::Timestamp),
        ColumnSpec::new("created_at", ColumnKind::Timestamp),
        ColumnSpec::new("updated_at", ColumnKind::Timestamp),
    ],
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ip_address: String,
    pub user_agent: String,
    pub platform: String,
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A session authenticates requests only while active and unexpired.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: Uuid,
    pub ip_address: String,
    pub user_agent: String,
    pub platform: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionUpdate {
    pub id: Uuid,
    pub platform: Option<String>,
    pub is_active: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_active_at: Option<DateTime<Utc>>,
}

impl SessionUpdate {
    pub fn normalized(mut self) -> Self {
        self.platform = super::non_empty(self.platform);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionList {
    pub sessions: Vec<Session>,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "column", content = "value", rename_all = "snake_case")]
pub enum SessionField {
    Platform(String),
    IsActive(bool),
    ExpiresAt(DateTime<Utc>),
    LastActiveAt(DateTime<Utc>),
}

impl UpdatableField for SessionField {
    fn column(&self) -> &'static str {
        match self {
            SessionField::Platform(_) => "platform",
            SessionField::IsActive(_) => "is_active",
            SessionField::ExpiresAt(_) => "expires_at",
            SessionField::LastActiveAt(_) => "last_active_at",
        }
    }

    fn to_value(&self) -> SqlValue {
        match self {
            SessionField::Platform(v) => SqlValue::Text(v.clone()),
            SessionField::IsActive(v) => SqlValue::Bool(*v),
            SessionField::ExpiresAt(v) | SessionField::LastActiveAt(v) => SqlValue::Timestamp(*v),
        }
    }
}
