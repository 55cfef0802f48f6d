// handlers/public/auth/mod.rs - Public authentication handlers
//
// Account creation, email verification and token acquisition. None of these
// require a bearer token; the policy grants them to the anonymous role.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::database::models::{NewSession, Session, User, UserType};
use crate::error::ApiError;
use crate::handlers::utils::ClientMeta;
use crate::state::AppState;

pub mod login;
pub mod register;
pub mod verify;

pub use login::login_post;
pub use register::register_post;
pub use verify::verify_email_post;

/// Platform name reserved for the staff console.
pub const ADMIN_PLATFORM: &str = "admin";

/// Returned by verify-email and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub session: Session,
    pub access_token: String,
}

/// Regular accounts may not use the admin console; admin accounts may use
/// nothing else.
pub fn check_platform(user_type: UserType, platform: &str) -> Result<(), ApiError> {
    match (user_type, platform == ADMIN_PLATFORM) {
        (UserType::User, true) => Err(ApiError::forbidden("User can't login to admin web")),
        (UserType::Admin, false) => Err(ApiError::forbidden("Admin can only login to admin web")),
        _ => Ok(()),
    }
}

/// Creates a session for `user` and signs a token bound to it.
pub(crate) async fn open_session(
    state: &AppState,
    user: User,
    platform: &str,
    client: ClientMeta,
) -> Result<AuthResponse, ApiError> {
    let session = state
        .usecase
        .sessions
        .create(NewSession {
            user_id: user.id,
            ip_address: client.ip_address,
            user_agent: client.user_agent,
            platform: platform.to_string(),
            expires_at: chrono::Utc::now() + state.tokens.expiry(),
        })
        .await?;

    let claims = state.tokens.claims(user.id, user.user_role, user.user_type, platform, session.id);
    let access_token = state.tokens.issue(&claims)?;

    info!("Opened session {} for user {} on {}", session.id, user.id, platform);
    Ok(AuthResponse { user, session, access_token })
}
