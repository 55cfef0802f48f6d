// handlers/public/auth/register.rs - POST /v1/auth/register handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::auth::otp::{otp_attempts_key, otp_key};
use crate::auth::{generate_otp, hash_password, verify_password};
use crate::database::models::{NewUser, User, UserLookup, UserRole, UserStatus, UserType};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::handlers::utils::{normalize_email, require, validate_email};
use crate::mail::otp_email;
use crate::middleware::{ApiResponse, ApiResult, Message};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require(&self.full_name, "Full name")?;
        require(&self.password, "Password")?;
        validate_email(self.email.trim())
    }
}

/// POST /v1/auth/register - Create an unverified account and email an OTP
///
/// Expected Input:
/// ```json
/// {
///   "full_name": "string",
///   "email": "string",
///   "password": "string"
/// }
/// ```
///
/// The account starts as `inverify` and cannot log in until the code sent
/// by email is confirmed through `/v1/auth/verify-email`. Registering an
/// `inverify` account again with its password issues a fresh code once the
/// previous one is gone (expired, exhausted or never delivered).
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account pending verification, code emailed"),
        (status = 400, description = "Missing field or malformed email"),
        (status = 409, description = "Email already registered or verification already pending"),
    )
)]
pub async fn register_post(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<Message> {
    let Json(body) = body?;
    body.validate()?;
    let email = normalize_email(&body.email);
    let key = otp_key(&email);
    let otp = generate_otp();
    let ttl = state.config.otp_ttl();

    let user = match state.usecase.users.get_single(UserLookup::Email(email.clone())).await {
        Ok(existing) => reissue(&state, existing, &body.password, &key, &otp, ttl).await?,
        Err(DatabaseError::NotFound(_)) => {
            // a concurrent registration that slips past the lookup still
            // fails on the unique email index and surfaces as Conflict
            let user = state
                .usecase
                .users
                .create(NewUser {
                    email,
                    full_name: body.full_name.trim().to_string(),
                    password: hash_password(&body.password)?,
                    user_type: UserType::User,
                    user_role: UserRole::User,
                    status: UserStatus::InVerify,
                })
                .await?;
            claim_otp(&state, &key, &otp, ttl).await?;
            info!("Registered user {} pending email verification", user.id);
            user
        }
        Err(e) => return Err(e.into()),
    };

    state.cache.remove(&otp_attempts_key(&user.email)).await;
    if let Err(e) = state.mailer.send(otp_email(&state.config.mail.from, &user.email, &otp, ttl)).await {
        // drop the undelivered code so the next attempt can issue another
        state.cache.remove(&key).await;
        return Err(e.into());
    }

    Ok(ApiResponse::created(Message::new("User registered successfully, please check your email for the verification code")))
}

/// An existing account gets a new code only while it is still `inverify`
/// and the caller knows its password.
async fn reissue(
    state: &AppState,
    existing: User,
    password: &str,
    key: &str,
    otp: &str,
    ttl: Duration,
) -> Result<User, ApiError> {
    if existing.status != UserStatus::InVerify || !verify_password(password, &existing.password)? {
        return Err(ApiError::conflict("User already exists"));
    }
    claim_otp(state, key, otp, ttl).await?;
    info!("Re-issued verification code for pending user {}", existing.id);
    Ok(existing)
}

async fn claim_otp(state: &AppState, key: &str, otp: &str, ttl: Duration) -> Result<(), ApiError> {
    if state.cache.insert_if_absent(key, otp, ttl).await {
        Ok(())
    } else {
        warn!("Verification already pending under {}", key);
        Err(ApiError::conflict("User already exists"))
    }
}
