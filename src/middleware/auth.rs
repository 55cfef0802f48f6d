use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::auth::Claims;
use crate::database::models::{User, UserLookup, UserRole, UserStatus, UserType};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated caller context extracted from the bearer token
#[derive(Clone, Debug, PartialEq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub user_role: UserRole,
    pub user_type: UserType,
    pub platform: String,
    pub session_id: Uuid,
}

impl AuthUser {
    /// Role and type come from the stored account, not the token, so a
    /// demotion applies to tokens already handed out.
    fn new(claims: Claims, user: &User) -> Self {
        Self {
            user_id: user.id,
            user_role: user.user_role,
            user_type: user.user_type,
            platform: claims.platform,
            session_id: claims.session_id,
        }
    }
}

/// Authenticates the caller (if a token is present) and asks the policy
/// enforcer whether its role may call this path and method.
///
/// A token must verify, its session must still exist, be active and belong
/// to the token's subject, and that account must still be `active`. Requests
/// without a token are evaluated as the policy's anonymous role.
pub async fn authorize(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();
    let method = request.method().as_str().to_string();

    let token = extract_bearer_token(request.headers()).map_err(ApiError::unauthorized)?.map(str::to_owned);

    let role = match token {
        None => None,
        Some(token) => {
            let claims = state.tokens.verify(&token)?;
            ensure_live_session(&state, &claims).await?;
            let user = active_account(&state, &claims).await?;
            let role = user.user_role.as_str().to_string();
            request.extensions_mut().insert(AuthUser::new(claims, &user));
            Some(role)
        }
    };

    let authenticated = role.is_some();
    let role = match role {
        Some(role) => role,
        None => state.policy.anonymous_role().await,
    };

    if !state.policy.enforce(&role, &path, &method).await {
        warn!("Denied {} {} for role {}", method, path, role);
        return Err(if authenticated {
            ApiError::forbidden("You do not have access to this resource")
        } else {
            ApiError::unauthorized("Authentication required")
        });
    }

    Ok(next.run(request).await)
}

async fn ensure_live_session(state: &AppState, claims: &Claims) -> Result<(), ApiError> {
    let session = match state.usecase.sessions.get_single(claims.session_id).await {
        Ok(session) => session,
        Err(DatabaseError::NotFound(_)) => {
            warn!("Token for user {} references missing session {}", claims.sub, claims.session_id);
            return Err(ApiError::unauthorized("Session has ended"));
        }
        Err(other) => return Err(other.into()),
    };

    if session.user_id != claims.sub || !session.is_usable(Utc::now()) {
        warn!("Session {} is inactive, expired or foreign", session.id);
        return Err(ApiError::unauthorized("Session has ended"));
    }
    Ok(())
}

async fn active_account(state: &AppState, claims: &Claims) -> Result<User, ApiError> {
    let user = match state.usecase.users.get_single(UserLookup::Id(claims.sub)).await {
        Ok(user) => user,
        Err(DatabaseError::NotFound(_)) => {
            warn!("Token subject {} no longer exists", claims.sub);
            return Err(ApiError::unauthorized("Session has ended"));
        }
        Err(other) => return Err(other.into()),
    };

    if user.status != UserStatus::Active {
        warn!("Rejected token for {} account {}", user.status, user.id);
        return Err(ApiError::unauthorized("Account is not active"));
    }
    Ok(user)
}

/// `Ok(None)` when no Authorization header is present.
fn extract_bearer_token(headers: &HeaderMap) -> Result<Option<&str>, String> {
    let Some(auth_header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(Some(token.trim()))
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}
