use axum::{
    http::{HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, patch, post, put},
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::handlers;
use crate::metrics::{metrics_handler, track};
use crate::middleware::authorize;
use crate::openapi::openapi_json;
use crate::state::AppState;

/// Full application router. Everything under `/v1` runs through the
/// authorize middleware; `/`, `/healthz`, `/metrics` and `/openapi.json`
/// never do.
pub fn app(state: AppState) -> Router {
    let v1 = Router::new()
        .merge(auth_routes())
        .merge(user_routes())
        .merge(session_routes())
        .merge(business_routes())
        .route_layer(from_fn_with_state(state.clone(), authorize));

    Router::new()
        // Public
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi_json))
        .merge(v1)
        // Global middleware
        .layer(from_fn_with_state(state.clone(), track))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(cors_layer(&state.config.security.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_routes() -> Router<AppState> {
    use handlers::{protected::auth as protected_auth, public::auth};

    Router::new()
        // Token acquisition
        .route("/v1/auth/register", post(auth::register_post))
        .route("/v1/auth/verify-email", post(auth::verify_email_post))
        .route("/v1/auth/login", post(auth::login_post))
        // Session teardown
        .route("/v1/auth/logout", post(protected_auth::logout_post))
}

fn user_routes() -> Router<AppState> {
    use handlers::protected::user;

    Router::new()
        .route("/v1/user", post(user::user_create).put(user::user_update))
        .route("/v1/user/list", get(user::user_list))
        .route("/v1/user/fields", patch(user::user_update_fields))
        .route("/v1/user/:id", get(user::user_get).delete(user::user_delete))
}

fn session_routes() -> Router<AppState> {
    use handlers::protected::session;

    Router::new()
        .route("/v1/session", put(session::session_update))
        .route("/v1/session/list", get(session::session_list))
        .route("/v1/session/fields", patch(session::session_update_fields))
        .route("/v1/session/:id", get(session::session_get).delete(session::session_delete))
}

fn business_routes() -> Router<AppState> {
    use handlers::protected::business;

    Router::new()
        .route("/v1/business", post(business::business_create).put(business::business_update))
        .route("/v1/business/list", get(business::business_list))
        .route("/v1/business/fields", patch(business::business_update_fields))
        .route("/v1/business/:id", get(business::business_get).delete(business::business_delete))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("Ignoring unparsable CORS origin {:?}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
}

async fn root() -> axum::Json<Value> {
    axum::Json(json!({
        "success": true,
        "data": {
            "name": "Yalp API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "health": "/healthz (public)",
                "metrics": "/metrics (public, Prometheus text)",
                "docs": "/openapi.json (public)",
                "auth": "/v1/auth/{register,verify-email,login} (public), /v1/auth/logout (token)",
                "user": "/v1/user[/list|/fields|/:id] (token)",
                "session": "/v1/session[/list|/fields|/:id] (token)",
                "business": "/v1/business[/list|/fields|/:id] (token)",
            }
        }
    }))
}

/// Liveness only; the database is not consulted.
async fn healthz() {}
