// handlers/utils.rs - Request helpers shared by public and protected handlers

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts},
};
use std::convert::Infallible;
use std::net::SocketAddr;

use crate::error::ApiError;
use crate::filter::{filter_order::FilterOrder, GetListFilter, OrderBy};
use crate::state::AppState;

/// Caller address and user agent recorded on new sessions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientMeta {
    pub ip_address: String,
    pub user_agent: String,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // first hop of X-Forwarded-For wins over the socket peer
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Ok(Self { ip_address: forwarded.or(peer).unwrap_or_default(), user_agent })
    }
}

/// Pagination and ordering common to every list endpoint.
///
/// An explicit `order` (e.g. `"created_at desc, id"`) replaces the default.
pub fn list_filter(
    state: &AppState,
    page: Option<&str>,
    limit: Option<&str>,
    order: Option<&str>,
    default_order: OrderBy,
) -> GetListFilter {
    let mut req = GetListFilter::from_params(page, limit).capped(state.config.filter.max_limit);
    let requested = order.map(FilterOrder::parse).unwrap_or_default();
    if requested.is_empty() {
        req = req.order(default_order);
    } else {
        for o in requested {
            req = req.order(o);
        }
    }
    req
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'),
        None => false,
    };
    if valid && !email.chars().any(char::is_whitespace) {
        Ok(())
    } else {
        Err(ApiError::validation("Invalid email address"))
    }
}

pub fn require(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{} is required", field)));
    }
    Ok(())
}
