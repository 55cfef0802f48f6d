// handlers/protected/auth/logout.rs - POST /v1/auth/logout handler

use axum::{extract::State, Extension};
use tracing::info;

use crate::middleware::{ApiResponse, ApiResult, AuthUser, Message};
use crate::state::AppState;

/// POST /v1/auth/logout - Delete the session the bearer token is bound to
///
/// The token itself stays cryptographically valid until `exp`, but every
/// later request with it fails the live-session check.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "auth",
    security(("bearer" = [])),
    responses((status = 200, description = "Session deleted"), (status = 401, description = "No live session"))
)]
pub async fn logout_post(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<Message> {
    state.usecase.sessions.delete(auth.session_id).await?;
    info!("User {} logged out of session {}", auth.user_id, auth.session_id);
    Ok(ApiResponse::success(Message::new("Logged out successfully")))
}
