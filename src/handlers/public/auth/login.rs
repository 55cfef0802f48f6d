// handlers/public/auth/login.rs - POST /v1/auth/login handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;
use tracing::warn;
use utoipa::ToSchema;

use super::{check_platform, open_session, AuthResponse};
use crate::auth::verify_password;
use crate::database::models::{UserLookup, UserStatus};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::handlers::utils::{normalize_email, require, ClientMeta};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub platform: String,
}

/// POST /v1/auth/login - Exchange credentials for a session token
///
/// Expected Input:
/// ```json
/// { "email": "string", "password": "string", "platform": "web" }
/// ```
///
/// Checks run in a fixed order: platform, then account status, then the
/// password. A regular account asking for the admin platform is refused
/// before its password is looked at.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "User, session and bearer token"),
        (status = 401, description = "Incorrect email or password"),
        (status = 403, description = "Wrong platform, unverified or blocked account"),
    )
)]
pub async fn login_post(
    State(state): State<AppState>,
    client: ClientMeta,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<AuthResponse> {
    let Json(body) = body?;
    require(&body.platform, "Platform")?;
    let email = normalize_email(&body.email);

    let user = match state.usecase.users.get_single(UserLookup::Email(email.clone())).await {
        Ok(user) => user,
        Err(DatabaseError::NotFound(_)) => {
            warn!("Login attempt for unknown email {}", email);
            return Err(ApiError::invalid_credentials("Incorrect email or password"));
        }
        Err(e) => return Err(e.into()),
    };

    check_platform(user.user_type, &body.platform)?;

    match user.status {
        UserStatus::Active => {}
        UserStatus::InVerify => return Err(ApiError::forbidden("Email address is not verified")),
        UserStatus::Blocked => return Err(ApiError::forbidden("Account is blocked")),
    }

    if !verify_password(&body.password, &user.password)? {
        warn!("Wrong password for user {}", user.id);
        return Err(ApiError::invalid_credentials("Incorrect email or password"));
    }

    let response = open_session(&state, user, &body.platform, client).await?;
    Ok(ApiResponse::success(response))
}
