use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::ModelError;
use crate::filter::{ColumnKind, ColumnSpec, SqlValue, TableSpec, UpdatableField};

pub static USERS: TableSpec = TableSpec {
    name: "users",
    columns: &[
        ColumnSpec::new("id", ColumnKind::Uuid),
        ColumnSpec::new("email", ColumnKind::Text),
        ColumnSpec::new("full_name", ColumnKind::Text),
        ColumnSpec::private("password", ColumnKind::Text),
        ColumnSpec::new("user_type", ColumnKind::Text),
        ColumnSpec::new("user_role", ColumnKind::Text),
        ColumnSpec::new("status", ColumnKind::Text),
        ColumnSpec::new("created_at", ColumnKind::Timestamp),
        ColumnSpec::new("updated_at", ColumnKind::Timestamp),
        ColumnSpec::new("deleted_at", ColumnKind::Timestamp),
    ],
};

text_enum! {
    /// Which client surface an account belongs to.
    UserType { User => "user", Admin => "admin" }
}

text_enum! {
    /// Role name handed to the policy enforcer.
    UserRole { User => "user", Admin => "admin", SuperAdmin => "superadmin" }
}

text_enum! {
    UserStatus { InVerify => "inverify", Active => "active", Blocked => "blocked" }
}

impl UserStatus {
    /// Transitions permitted through an administrative update.
    pub fn check_update(self, to: UserStatus) -> Result<(), ModelError> {
        use UserStatus::*;
        match (self, to) {
            (from, to) if from == to => Ok(()),
            (Active, Blocked) | (Blocked, Active) => Ok(()),
            (from, to) => Err(ModelError::InvalidTransition { from: from.as_str(), to: to.as_str() }),
        }
    }

    /// `inverify -> active` happens only through OTP verification.
    pub fn check_verify(self) -> Result<(), ModelError> {
        match self {
            UserStatus::InVerify => Ok(()),
            from => Err(ModelError::InvalidTransition { from: from.as_str(), to: UserStatus::Active.as_str() }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    /// PHC hash. Never leaves the process.
    #[serde(skip_serializing, default)]
    pub password: String,
    pub user_type: UserType,
    pub user_role: UserRole,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Insert payload. `password` must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub user_type: UserType,
    pub user_role: UserRole,
    pub status: UserStatus,
}

/// Partial update. `None` and empty strings leave the column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password: Option<String>,
    pub user_type: Option<UserType>,
    pub user_role: Option<UserRole>,
    pub status: Option<UserStatus>,
}

impl UserUpdate {
    /// Drop empty strings so they read as "not provided".
    pub fn normalized(mut self) -> Self {
        self.email = super::non_empty(self.email);
        self.full_name = super::non_empty(self.full_name);
        self.password = super::non_empty(self.password);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLookup {
    Id(Uuid),
    Email(String),
}

impl UserLookup {
    pub fn column_value(&self) -> (&'static str, SqlValue) {
        match self {
            UserLookup::Id(id) => ("id", SqlValue::Uuid(*id)),
            UserLookup::Email(email) => ("email", SqlValue::Text(email.clone())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserList {
    pub users: Vec<User>,
    pub count: i64,
}

/// Columns writable through the bulk field update. Status is excluded: its
/// transitions are checked per row by `update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "column", content = "value", rename_all = "snake_case")]
pub enum UserField {
    Email(String),
    FullName(String),
    UserType(UserType),
    UserRole(UserRole),
}

impl UpdatableField for UserField {
    fn column(&self) -> &'static str {
        match self {
            UserField::Email(_) => "email",
            UserField::FullName(_) => "full_name",
            UserField::UserType(_) => "user_type",
            UserField::UserRole(_) => "user_role",
        }
    }

    fn to_value(&self) -> SqlValue {
        match self {
            UserField::Email(v) | UserField::FullName(v) => SqlValue::Text(v.clone()),
            UserField::UserType(v) => (*v).into(),
            UserField::UserRole(v) => (*v).into(),
        }
    }
}
