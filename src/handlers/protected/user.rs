// handlers/protected/user.rs - /v1/user/* account administration handlers

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::hash_password;
use crate::database::models::{
    NewUser, RowsEffected, User, UserField, UserList, UserLookup, UserRole, UserStatus, UserType, UserUpdate,
};
use crate::error::ApiError;
use crate::filter::{Filter, OrderBy, UpdateFieldRequest};
use crate::handlers::utils::{list_filter, normalize_email, require, validate_email};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, Message};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
    #[serde(default)]
    pub user_type: Option<UserType>,
    #[serde(default)]
    pub user_role: Option<UserRole>,
    #[serde(default)]
    pub status: Option<UserStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub user_role: Option<String>,
    pub order: Option<String>,
}

/// Only a superadmin may hand out the superadmin role.
fn check_role_grant(caller: &AuthUser, role: Option<UserRole>) -> Result<(), ApiError> {
    match role {
        Some(UserRole::SuperAdmin) if caller.user_role != UserRole::SuperAdmin => {
            Err(ApiError::forbidden("Only a superadmin can grant the superadmin role"))
        }
        _ => Ok(()),
    }
}

/// Superadmin accounts can only be changed or removed by a superadmin.
fn check_target(caller: &AuthUser, target: &User) -> Result<(), ApiError> {
    if target.user_role == UserRole::SuperAdmin && caller.user_role != UserRole::SuperAdmin {
        return Err(ApiError::forbidden("Only a superadmin can modify a superadmin account"));
    }
    Ok(())
}

/// POST /v1/user - Create an account directly (no OTP round trip)
///
/// Accounts created here default to `user`/`user`/`active`.
#[utoipa::path(
    post,
    path = "/v1/user",
    tag = "user",
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Created account"),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Superadmin role needs a superadmin caller"),
        (status = 409, description = "Email taken"),
    )
)]
pub async fn user_create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<User> {
    let Json(body) = body?;
    require(&body.full_name, "Full name")?;
    require(&body.password, "Password")?;
    validate_email(body.email.trim())?;
    check_role_grant(&auth, body.user_role)?;

    let user = state
        .usecase
        .users
        .create(NewUser {
            email: normalize_email(&body.email),
            full_name: body.full_name.trim().to_string(),
            password: hash_password(&body.password)?,
            user_type: body.user_type.unwrap_or(UserType::User),
            user_role: body.user_role.unwrap_or(UserRole::User),
            status: body.status.unwrap_or(UserStatus::Active),
        })
        .await?;

    info!("User {} created account {}", auth.user_id, user.id);
    Ok(ApiResponse::created(user))
}

/// GET /v1/user/:id
#[utoipa::path(
    get,
    path = "/v1/user/{id}",
    tag = "user",
    params(("id" = uuid::Uuid, Path, description = "User id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Account"),
        (status = 404, description = "No such account"),
    )
)]
pub async fn user_get(State(state): State<AppState>, id: Result<Path<Uuid>, PathRejection>) -> ApiResult<User> {
    let Path(id) = id?;
    let user = state.usecase.users.get_single(UserLookup::Id(id)).await?;
    Ok(ApiResponse::success(user))
}

/// GET /v1/user/list?page=1&limit=10&search=ali&status=active&user_role=admin
///
/// `search` matches full name or email; `status` and `user_role` narrow the
/// result. Newest accounts first unless `order` says otherwise.
#[utoipa::path(
    get,
    path = "/v1/user/list",
    tag = "user",
    params(
        ("page" = Option<String>, Query, description = "1-based page, default 1"),
        ("limit" = Option<String>, Query, description = "Page size, default 10"),
        ("order" = Option<String>, Query, description = "e.g. `created_at desc`"),
        ("search" = Option<String>, Query, description = "Matches full name or email"),
        ("status" = Option<String>, Query, description = "Exact status"),
        ("user_role" = Option<String>, Query, description = "Exact role"),
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Page of accounts with total count"),
    )
)]
pub async fn user_list(
    State(state): State<AppState>,
    query: Result<Query<UserListQuery>, QueryRejection>,
) -> ApiResult<UserList> {
    let Query(q) = query?;
    let search = q.search.unwrap_or_default();

    let req = list_filter(&state, q.page.as_deref(), q.limit.as_deref(), q.order.as_deref(), OrderBy::desc("created_at"))
        .filter(Filter::search("full_name", search.clone()))
        .filter(Filter::search("email", search))
        .filter(Filter::exact("status", q.status.unwrap_or_default()))
        .filter(Filter::exact("user_role", q.user_role.unwrap_or_default()));

    let users = state.usecase.users.get_list(req).await?;
    Ok(ApiResponse::success(users))
}

/// PUT /v1/user - Partial update by id
///
/// Expected Input:
/// ```json
/// { "id": "uuid", "full_name": "string", "status": "blocked" }
/// ```
///
/// Omitted or empty fields keep their value. A new password is hashed
/// before it is stored. Status may only move between `active` and
/// `blocked`; leaving `inverify` happens through email verification.
/// Superadmin accounts are writable by superadmins only.
#[utoipa::path(
    put,
    path = "/v1/user",
    tag = "user",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated account"),
        (status = 400, description = "Invalid field or status transition"),
        (status = 403, description = "Superadmin accounts need a superadmin caller"),
        (status = 404, description = "No such account"),
    )
)]
pub async fn user_update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<UserUpdate>, JsonRejection>,
) -> ApiResult<User> {
    let Json(body) = body?;
    let mut update = body.normalized();
    check_role_grant(&auth, update.user_role)?;
    let target = state.usecase.users.get_single(UserLookup::Id(update.id)).await?;
    check_target(&auth, &target)?;

    if let Some(email) = update.email.take() {
        validate_email(email.trim())?;
        update.email = Some(normalize_email(&email));
    }
    if let Some(password) = update.password.take() {
        update.password = Some(hash_password(&password)?);
    }

    let user = state.usecase.users.update(update).await?;
    info!("User {} updated account {}", auth.user_id, user.id);
    Ok(ApiResponse::success(user))
}

/// DELETE /v1/user/:id
#[utoipa::path(
    delete,
    path = "/v1/user/{id}",
    tag = "user",
    params(("id" = uuid::Uuid, Path, description = "User id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Account deleted"),
        (status = 403, description = "Superadmin accounts need a superadmin caller"),
        (status = 409, description = "Account still owns businesses"),
    )
)]
pub async fn user_delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Message> {
    let Path(id) = id?;
    if id == auth.user_id {
        return Err(ApiError::validation("You cannot delete your own account"));
    }
    let target = state.usecase.users.get_single(UserLookup::Id(id)).await?;
    check_target(&auth, &target)?;
    state.usecase.users.delete(id).await?;
    info!("User {} deleted account {}", auth.user_id, id);
    Ok(ApiResponse::success(Message::new("User deleted successfully")))
}

/// PATCH /v1/user/fields - Set columns on every row matching the filters
///
/// Expected Input:
/// ```json
/// {
///   "items": [{ "column": "user_role", "value": "admin" }],
///   "filter": [{ "column": "email", "type": "exact", "value": "a@b.co" }]
/// }
/// ```
///
/// For callers below superadmin, superadmin rows never match.
#[utoipa::path(
    patch,
    path = "/v1/user/fields",
    tag = "user",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Number of rows changed"),
        (status = 400, description = "Empty items or missing exact filter"),
    )
)]
pub async fn user_update_fields(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<UpdateFieldRequest<UserField>>, JsonRejection>,
) -> ApiResult<RowsEffected> {
    let Json(req) = body?;
    for item in &req.items {
        if let UserField::UserRole(role) = item {
            check_role_grant(&auth, Some(*role))?;
        }
    }
    let rows = if auth.user_role == UserRole::SuperAdmin {
        state.usecase.users.update_field(req).await?
    } else {
        state.usecase.users.update_field_sparing(req, UserRole::SuperAdmin).await?
    };
    info!("User {} updated {} account rows", auth.user_id, rows.rows_effected);
    Ok(ApiResponse::success(rows))
}
