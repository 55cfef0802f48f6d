// handlers/public/auth/verify.rs - POST /v1/auth/verify-email handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;
use tracing::warn;
use utoipa::ToSchema;

use super::{check_platform, open_session, AuthResponse};
use crate::auth::otp::{otp_attempts_key, otp_key, MAX_OTP_ATTEMPTS};
use crate::database::models::UserLookup;
use crate::error::ApiError;
use crate::handlers::utils::{normalize_email, require, ClientMeta};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub otp: String,
    pub platform: String,
}

/// POST /v1/auth/verify-email - Confirm the emailed OTP and open a session
///
/// Expected Input:
/// ```json
/// { "email": "string", "otp": "123456", "platform": "web" }
/// ```
///
/// A missing, expired or mismatched code is a 400 and leaves the account
/// untouched. A code is consumed by the first successful verification and
/// discarded after `MAX_OTP_ATTEMPTS` wrong guesses; registering again with
/// the same credentials issues a new one.
#[utoipa::path(
    post,
    path = "/v1/auth/verify-email",
    tag = "auth",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Account activated; user, session and bearer token"),
        (status = 400, description = "Code missing, expired, wrong or exhausted"),
        (status = 403, description = "Platform not allowed for this account"),
    )
)]
pub async fn verify_email_post(
    State(state): State<AppState>,
    client: ClientMeta,
    body: Result<Json<VerifyEmailRequest>, JsonRejection>,
) -> ApiResult<AuthResponse> {
    let Json(body) = body?;
    require(&body.platform, "Platform")?;
    let email = normalize_email(&body.email);
    let key = otp_key(&email);
    let attempts_key = otp_attempts_key(&email);

    match state.cache.get(&key).await {
        Some(code) if code == body.otp.trim() => {}
        Some(_) => {
            let attempts = state.cache.incr(&attempts_key, state.config.otp_ttl()).await;
            warn!("OTP mismatch for {} ({}/{})", email, attempts, MAX_OTP_ATTEMPTS);
            if attempts >= MAX_OTP_ATTEMPTS {
                state.cache.remove(&key).await;
                state.cache.remove(&attempts_key).await;
                return Err(ApiError::validation("Too many incorrect attempts, register again for a new code"));
            }
            return Err(ApiError::validation("Incorrect OTP"));
        }
        None => {
            warn!("No live OTP for {}", email);
            return Err(ApiError::validation("OTP expired or not found"));
        }
    }

    let user = state.usecase.users.get_single(UserLookup::Email(email)).await?;
    check_platform(user.user_type, &body.platform)?;

    let user = state.usecase.users.verify(user.id).await?;
    state.cache.remove(&key).await;
    state.cache.remove(&attempts_key).await;

    let response = open_session(&state, user, &body.platform, client).await?;
    Ok(ApiResponse::success(response))
}
