//! OpenAPI 3 description of the `/v1` surface, served at `/openapi.json`.

use axum::{http::header, response::IntoResponse, Json};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::handlers::protected::{auth as protected_auth, business, session, user};
use crate::handlers::public::auth::{login, register, verify};

#[derive(OpenApi)]
#[openapi(
    info(title = "Yalp API", description = "Users, sessions and businesses behind JWT auth and role policy"),
    paths(
        register::register_post,
        verify::verify_email_post,
        login::login_post,
        protected_auth::logout::logout_post,
        user::user_create,
        user::user_get,
        user::user_list,
        user::user_update,
        user::user_delete,
        user::user_update_fields,
        session::session_get,
        session::session_list,
        session::session_update,
        session::session_delete,
        session::session_update_fields,
        business::business_create,
        business::business_get,
        business::business_list,
        business::business_update,
        business::business_delete,
        business::business_update_fields,
    ),
    components(schemas(register::RegisterRequest, verify::VerifyEmailRequest, login::LoginRequest)),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Registration, verification and sessions"),
        (name = "user", description = "Account administration"),
        (name = "session", description = "Session administration"),
        (name = "business", description = "Business listings"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
        );
    }
}

/// GET /openapi.json
pub async fn openapi_json() -> impl IntoResponse {
    ([(header::CACHE_CONTROL, "no-store")], Json(ApiDoc::openapi()))
}
