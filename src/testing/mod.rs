//! In-memory stand-ins for the store, cache and mailer, plus helpers for
//! driving the router in tests.
//!
//! List and field-update requests are validated by the real query builder
//! before being applied here, so column and value errors match Postgres.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crate::auth::{hash_password, TokenIssuer};
use crate::cache::MokaCache;
use crate::config::AppConfig;
use crate::database::models::business::BUSINESSES;
use crate::database::models::session::SESSIONS;
use crate::database::models::user::USERS;
use crate::database::models::{
    Business, BusinessField, BusinessList, BusinessUpdate, NewBusiness, NewSession, NewUser, RowsEffected, Session,
    SessionField, SessionList, SessionUpdate, User, UserField, UserList, UserLookup, UserRole, UserStatus, UserType,
    UserUpdate,
};
use crate::database::DatabaseError;
use crate::filter::filter_where::group_filters;
use crate::filter::{
    Filter, FilterQuery, FilterType, GetListFilter, OrderBy, SortDirection, TableSpec, UpdatableField,
    UpdateFieldRequest,
};
use crate::mail::{EmailMessage, MailError, Mailer};
use crate::metrics::{HttpMetrics, METRICS_PREFIX};
use crate::policy::{PolicyEnforcer, PolicySet};
use crate::state::{AppState, AppStateInner};
use crate::usecase::{BusinessRepo, SessionRepo, UseCase, UserRepo};

pub const TEST_JWT_SECRET: &str = "test-secret";
pub const TEST_PASSWORD: &str = "correct horse battery";

/// Rows of one table behind a mutex. The lock is never held across an await.
struct Table<T> {
    rows: Mutex<Vec<T>>,
    clock: Mutex<DateTime<Utc>>,
}

impl<T: Clone + Serialize + DeserializeOwned> Table<T> {
    fn new() -> Self {
        Self { rows: Mutex::new(Vec::new()), clock: Mutex::new(Utc::now()) }
    }

    fn rows(&self) -> MutexGuard<'_, Vec<T>> {
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Strictly increasing timestamps so "newest first" is deterministic.
    fn tick(&self) -> DateTime<Utc> {
        let mut last = self.clock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Utc::now().max(*last + Duration::microseconds(1));
        *last = now;
        now
    }

    fn list(&self, spec: &TableSpec, req: &GetListFilter) -> Result<(Vec<T>, i64), DatabaseError> {
        FilterQuery::new(spec)?.to_list_sql(req)?;

        let mut matched: Vec<(Value, T)> = self
            .rows()
            .iter()
            .map(|row| (to_json(row), row.clone()))
            .filter(|(json, _)| matches(json, &req.filters))
            .collect();
        matched.sort_by(|(a, _), (b, _)| compare(a, b, &req.order_by));

        let count = matched.len() as i64;
        let page = matched
            .into_iter()
            .skip(req.offset() as usize)
            .take(req.limit() as usize)
            .map(|(_, row)| row)
            .collect();
        Ok((page, count))
    }

    /// `spare` rows are skipped; `restore` copies over columns the JSON
    /// round trip cannot carry.
    fn update_fields<F: UpdatableField + Serialize>(
        &self,
        spec: &TableSpec,
        req: &UpdateFieldRequest<F>,
        spare: impl Fn(&T) -> bool,
        restore: impl Fn(&T, &mut T),
    ) -> Result<RowsEffected, DatabaseError> {
        FilterQuery::new(spec)?.to_update_sql(req)?;

        let now = self.tick();
        let mut rows = self.rows();
        let mut changed = 0u64;
        for row in rows.iter_mut() {
            let mut json = to_json(&*row);
            if spare(row) || !matches(&json, &req.filter) {
                continue;
            }
            for item in &req.items {
                json[item.column()] = serde_json::to_value(item)
                    .map(|v| v["value"].clone())
                    .map_err(|e| DatabaseError::Decode(e.to_string()))?;
            }
            json["updated_at"] = Value::String(now.to_rfc3339());
            let mut updated: T = serde_json::from_value(json).map_err(|e| DatabaseError::Decode(e.to_string()))?;
            restore(row, &mut updated);
            *row = updated;
            changed += 1;
        }
        Ok(changed.into())
    }
}

fn to_json<T: Serialize>(row: &T) -> Value {
    serde_json::to_value(row).unwrap_or(Value::Null)
}

fn cells(row: &Value, column: &str) -> Vec<String> {
    let render = |v: &Value| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match row.get(column) {
        None | Some(Value::Null) => vec![],
        Some(Value::Array(items)) => items.iter().map(render).collect(),
        Some(other) => vec![render(other)],
    }
}

fn matches(row: &Value, filters: &[Filter]) -> bool {
    group_filters(filters).iter().all(|group| {
        group.iter().any(|f| {
            let cells = cells(row, &f.column);
            match f.filter_type {
                FilterType::Exact => cells.iter().any(|c| c == &f.value),
                FilterType::Search => {
                    let needle = f.value.to_lowercase();
                    cells.iter().any(|c| c.to_lowercase().contains(&needle))
                }
            }
        })
    })
}

fn compare(a: &Value, b: &Value, order: &[OrderBy]) -> Ordering {
    for o in order {
        let ord = compare_cell(a.get(&o.column), b.get(&o.column));
        let ord = match o.order {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_cell(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
        (x, y) => x.is_some().cmp(&y.is_some()),
    }
}

fn not_found(entity: &str, id: impl std::fmt::Display) -> DatabaseError {
    DatabaseError::NotFound(format!("{} {} not found", entity, id))
}

pub struct MemoryUserRepo {
    table: Table<User>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self { table: Table::new() }
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn create(&self, user: NewUser) -> Result<User, DatabaseError> {
        let now = self.table.tick();
        let mut rows = self.table.rows();
        if rows.iter().any(|u| u.email == user.email) {
            return Err(DatabaseError::Conflict("users_email_key".to_string()));
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            full_name: user.full_name,
            password: user.password,
            user_type: user.user_type,
            user_role: user.user_role,
            status: user.status,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        rows.push(created.clone());
        Ok(created)
    }

    async fn get_single(&self, lookup: UserLookup) -> Result<User, DatabaseError> {
        self.table
            .rows()
            .iter()
            .find(|u| match &lookup {
                UserLookup::Id(id) => u.id == *id,
                UserLookup::Email(email) => u.email == *email,
            })
            .cloned()
            .ok_or_else(|| not_found("user", format!("{:?}", lookup)))
    }

    async fn get_list(&self, req: GetListFilter) -> Result<UserList, DatabaseError> {
        let (users, count) = self.table.list(&USERS, &req)?;
        Ok(UserList { users, count })
    }

    async fn update(&self, update: UserUpdate) -> Result<User, DatabaseError> {
        let update = update.normalized();
        let now = self.table.tick();
        let mut rows = self.table.rows();
        if let Some(email) = &update.email {
            if rows.iter().any(|u| u.id != update.id && &u.email == email) {
                return Err(DatabaseError::Conflict("users_email_key".to_string()));
            }
        }
        let user = rows.iter_mut().find(|u| u.id == update.id).ok_or_else(|| not_found("user", update.id))?;
        if let Some(to) = update.status {
            user.status.check_update(to).map_err(|e| DatabaseError::Validation(e.to_string()))?;
            user.status = to;
        }
        if let Some(v) = update.email {
            user.email = v;
        }
        if let Some(v) = update.full_name {
            user.full_name = v;
        }
        if let Some(v) = update.password {
            user.password = v;
        }
        if let Some(v) = update.user_type {
            user.user_type = v;
        }
        if let Some(v) = update.user_role {
            user.user_role = v;
        }
        user.updated_at = now;
        Ok(user.clone())
    }

    async fn verify(&self, id: Uuid) -> Result<User, DatabaseError> {
        let now = self.table.tick();
        let mut rows = self.table.rows();
        let user = rows.iter_mut().find(|u| u.id == id).ok_or_else(|| not_found("user", id))?;
        user.status.check_verify().map_err(|e| DatabaseError::Validation(e.to_string()))?;
        user.status = UserStatus::Active;
        user.updated_at = now;
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut rows = self.table.rows();
        let before = rows.len();
        rows.retain(|u| u.id != id);
        if rows.len() == before {
            return Err(not_found("user", id));
        }
        Ok(())
    }

    async fn update_field(&self, req: UpdateFieldRequest<UserField>) -> Result<RowsEffected, DatabaseError> {
        self.table.update_fields(&USERS, &req, |_| false, |old, new| new.password = old.password.clone())
    }

    async fn update_field_sparing(
        &self,
        req: UpdateFieldRequest<UserField>,
        spared: UserRole,
    ) -> Result<RowsEffected, DatabaseError> {
        self.table.update_fields(&USERS, &req, |u| u.user_role == spared, |old, new| new.password = old.password.clone())
    }
}

pub struct MemorySessionRepo {
    table: Table<Session>,
}

impl MemorySessionRepo {
    pub fn new() -> Self {
        Self { table: Table::new() }
    }
}

#[async_trait]
impl SessionRepo for MemorySessionRepo {
    async fn create(&self, session: NewSession) -> Result<Session, DatabaseError> {
        let now = self.table.tick();
        let created = Session {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            ip_address: session.ip_address,
            user_agent: session.user_agent,
            platform: session.platform,
            is_active: true,
            expires_at: session.expires_at,
            last_active_at: now,
            created_at: now,
            updated_at: now,
        };
        self.table.rows().push(created.clone());
        Ok(created)
    }

    async fn get_single(&self, id: Uuid) -> Result<Session, DatabaseError> {
        self.table.rows().iter().find(|s| s.id == id).cloned().ok_or_else(|| not_found("session", id))
    }

    async fn get_list(&self, req: GetListFilter) -> Result<SessionList, DatabaseError> {
        let (sessions, count) = self.table.list(&SESSIONS, &req)?;
        Ok(SessionList { sessions, count })
    }

    async fn update(&self, update: SessionUpdate) -> Result<Session, DatabaseError> {
        let update = update.normalized();
        let now = self.table.tick();
        let mut rows = self.table.rows();
        let session = rows.iter_mut().find(|s| s.id == update.id).ok_or_else(|| not_found("session", update.id))?;
        if let Some(v) = update.platform {
            session.platform = v;
        }
        if let Some(v) = update.is_active {
            session.is_active = v;
        }
        if let Some(v) = update.expires_at {
            session.expires_at = v;
        }
        if let Some(v) = update.last_active_at {
            session.last_active_at = v;
        }
        session.updated_at = now;
        Ok(session.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut rows = self.table.rows();
        let before = rows.len();
        rows.retain(|s| s.id != id);
        if rows.len() == before {
            return Err(not_found("session", id));
        }
        Ok(())
    }

    async fn update_field(&self, req: UpdateFieldRequest<SessionField>) -> Result<RowsEffected, DatabaseError> {
        self.table.update_fields(&SESSIONS, &req, |_| false, |_, _| {})
    }
}

pub struct MemoryBusinessRepo {
    table: Table<Business>,
}

impl MemoryBusinessRepo {
    pub fn new() -> Self {
        Self { table: Table::new() }
    }
}

#[async_trait]
impl BusinessRepo for MemoryBusinessRepo {
    async fn create(&self, business: NewBusiness) -> Result<Business, DatabaseError> {
        let now = self.table.tick();
        let created = Business {
            id: Uuid::new_v4(),
            name: business.name,
            category: business.category,
            description: business.description,
            contact_information: business.contact_information,
            location: business.location,
            attachments: business.attachments,
            created_by: business.created_by,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.table.rows().push(created.clone());
        Ok(created)
    }

    async fn get_single(&self, id: Uuid) -> Result<Business, DatabaseError> {
        self.table.rows().iter().find(|b| b.id == id).cloned().ok_or_else(|| not_found("business", id))
    }

    async fn get_list(&self, req: GetListFilter) -> Result<BusinessList, DatabaseError> {
        let (businesses, count) = self.table.list(&BUSINESSES, &req)?;
        Ok(BusinessList { businesses, count })
    }

    async fn update(&self, update: BusinessUpdate) -> Result<Business, DatabaseError> {
        let update = update.normalized();
        let now = self.table.tick();
        let mut rows = self.table.rows();
        let business =
            rows.iter_mut().find(|b| b.id == update.id).ok_or_else(|| not_found("business", update.id))?;
        if let Some(v) = update.name {
            business.name = v;
        }
        if let Some(v) = update.category {
            business.category = v;
        }
        if let Some(v) = update.description {
            business.description = v;
        }
        if let Some(v) = update.contact_information {
            business.contact_information = v;
        }
        if let Some(v) = update.location {
            business.location = v;
        }
        if let Some(v) = update.attachments {
            business.attachments = v;
        }
        business.updated_at = now;
        Ok(business.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut rows = self.table.rows();
        let before = rows.len();
        rows.retain(|b| b.id != id);
        if rows.len() == before {
            return Err(not_found("business", id));
        }
        Ok(())
    }

    async fn update_field(&self, req: UpdateFieldRequest<BusinessField>) -> Result<RowsEffected, DatabaseError> {
        self.table.update_fields(&BUSINESSES, &req, |_| false, |_, _| {})
    }
}

/// Keeps every message instead of sending it. While `fail_sends` is on,
/// every send errors and nothing is recorded.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    pub fn fail_sends(&self, on: bool) {
        self.failing.store(on, AtomicOrdering::SeqCst);
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        if self.failing.load(AtomicOrdering::SeqCst) {
            let refused = "relay down".parse::<lettre::message::Mailbox>().expect_err("not an address");
            return Err(MailError::Address(refused));
        }
        self.sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(message);
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        let mut config = AppConfig::development();
        config.security.jwt_secret = TEST_JWT_SECRET.to_string();

        let policy = PolicySet::from_yaml(include_str!("../../config/policy.yaml")).expect("bundled policy parses");
        let mailer = Arc::new(RecordingMailer::default());

        let state = Arc::new(AppStateInner {
            usecase: UseCase::new(
                Arc::new(MemoryUserRepo::new()),
                Arc::new(MemorySessionRepo::new()),
                Arc::new(MemoryBusinessRepo::new()),
            ),
            cache: Arc::new(MokaCache::new(config.cache.max_entries)),
            mailer: mailer.clone(),
            policy: Arc::new(PolicyEnforcer::from_set(policy)),
            tokens: TokenIssuer::new(TEST_JWT_SECRET, config.security.jwt_expiry_hours).expect("test secret is valid"),
            metrics: HttpMetrics::new(METRICS_PREFIX).expect("metrics register"),
            config,
        });
        Self { state, mailer }
    }

    pub fn router(&self) -> Router {
        crate::router::app(self.state.clone())
    }

    /// Inserts an account directly, bypassing registration.
    pub async fn seed_user(&self, email: &str, user_type: UserType, user_role: UserRole, status: UserStatus) -> User {
        self.state
            .usecase
            .users
            .create(NewUser {
                email: email.to_string(),
                full_name: email.split('@').next().unwrap_or(email).to_string(),
                password: hash_password(TEST_PASSWORD).expect("hash"),
                user_type,
                user_role,
                status,
            })
            .await
            .expect("seed user")
    }

    /// Logs in through the router and returns the bearer token.
    pub async fn login(&self, email: &str, platform: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/v1/auth/login",
                None,
                Some(serde_json::json!({"email": email, "password": TEST_PASSWORD, "platform": platform})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["data"]["access_token"].as_str().expect("access_token").to_string()
    }

    /// Plain GET returning the raw body, for non-JSON endpoints.
    pub async fn call_text(&self, uri: &str) -> (StatusCode, String) {
        let request = Request::builder().method(Method::GET).uri(uri).body(Body::empty()).expect("request");
        let response = self.router().oneshot(request).await.expect("infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        let response = self.router().oneshot(request).await.expect("infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).expect("json body") };
        (status, json)
    }
}
