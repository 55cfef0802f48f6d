// handlers/protected/session.rs - /v1/session/* session administration handlers
//
// Sessions are opened only by login and verify-email; these endpoints let an
// admin inspect, extend, deactivate or drop them.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::database::models::{RowsEffected, Session, SessionField, SessionList, SessionUpdate};
use crate::filter::{Filter, OrderBy, UpdateFieldRequest};
use crate::handlers::utils::list_filter;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, Message};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SessionListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub user_id: Option<String>,
    pub platform: Option<String>,
    pub order: Option<String>,
}

/// GET /v1/session/:id
#[utoipa::path(
    get,
    path = "/v1/session/{id}",
    tag = "session",
    params(("id" = uuid::Uuid, Path, description = "Session id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Session"),
        (status = 404, description = "No such session"),
    )
)]
pub async fn session_get(State(state): State<AppState>, id: Result<Path<Uuid>, PathRejection>) -> ApiResult<Session> {
    let Path(id) = id?;
    let session = state.usecase.sessions.get_single(id).await?;
    Ok(ApiResponse::success(session))
}

/// GET /v1/session/list?user_id=<uuid>&platform=web
#[utoipa::path(
    get,
    path = "/v1/session/list",
    tag = "session",
    params(
        ("page" = Option<String>, Query, description = "1-based page, default 1"),
        ("limit" = Option<String>, Query, description = "Page size, default 10"),
        ("order" = Option<String>, Query, description = "e.g. `created_at desc`"),
        ("user_id" = Option<String>, Query, description = "Exact owner id"),
        ("platform" = Option<String>, Query, description = "Exact platform"),
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Page of sessions with total count"),
    )
)]
pub async fn session_list(
    State(state): State<AppState>,
    query: Result<Query<SessionListQuery>, QueryRejection>,
) -> ApiResult<SessionList> {
    let Query(q) = query?;
    let req = list_filter(&state, q.page.as_deref(), q.limit.as_deref(), q.order.as_deref(), OrderBy::desc("created_at"))
        .filter(Filter::exact("user_id", q.user_id.unwrap_or_default()))
        .filter(Filter::exact("platform", q.platform.unwrap_or_default()));

    let sessions = state.usecase.sessions.get_list(req).await?;
    Ok(ApiResponse::success(sessions))
}

/// PUT /v1/session - Partial update by id
///
/// Expected Input:
/// ```json
/// { "id": "uuid", "is_active": false }
/// ```
#[utoipa::path(
    put,
    path = "/v1/session",
    tag = "session",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated session"),
        (status = 404, description = "No such session"),
    )
)]
pub async fn session_update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<SessionUpdate>, JsonRejection>,
) -> ApiResult<Session> {
    let Json(body) = body?;
    let session = state.usecase.sessions.update(body.normalized()).await?;
    info!("User {} updated session {}", auth.user_id, session.id);
    Ok(ApiResponse::success(session))
}

/// DELETE /v1/session/:id
#[utoipa::path(
    delete,
    path = "/v1/session/{id}",
    tag = "session",
    params(("id" = uuid::Uuid, Path, description = "Session id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Session deleted"),
        (status = 404, description = "No such session"),
    )
)]
pub async fn session_delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Message> {
    let Path(id) = id?;
    state.usecase.sessions.delete(id).await?;
    info!("User {} deleted session {}", auth.user_id, id);
    Ok(ApiResponse::success(Message::new("Session deleted successfully")))
}

/// PATCH /v1/session/fields
///
/// Typical use is revoking every session of one account:
/// `{"items":[{"column":"is_active","value":false}],"filter":[{"column":"user_id","type":"exact","value":"<uuid>"}]}`
#[utoipa::path(
    patch,
    path = "/v1/session/fields",
    tag = "session",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Number of rows changed"),
        (status = 400, description = "Empty items or missing exact filter"),
    )
)]
pub async fn session_update_fields(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<UpdateFieldRequest<SessionField>>, JsonRejection>,
) -> ApiResult<RowsEffected> {
    let Json(req) = body?;
    let rows = state.usecase.sessions.update_field(req).await?;
    info!("User {} updated {} session rows", auth.user_id, rows.rows_effected);
    Ok(ApiResponse::success(rows))
}
