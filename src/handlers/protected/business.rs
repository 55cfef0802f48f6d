// handlers/protected/business.rs - /v1/business/* handlers

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::database::models::{
    Business, BusinessCategory, BusinessField, BusinessList, BusinessUpdate, Location, NewBusiness, RowsEffected,
};
use crate::error::ApiError;
use crate::filter::{Filter, OrderBy, UpdateFieldRequest};
use crate::handlers::utils::{list_filter, require};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, Message};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBusinessRequest {
    pub name: String,
    pub category: BusinessCategory,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub contact_information: String,
    pub location: Location,
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BusinessListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub order: Option<String>,
}

fn check_location(location: &Location) -> Result<(), ApiError> {
    if !location.is_valid() {
        return Err(ApiError::validation("Location is out of range"));
    }
    Ok(())
}

/// POST /v1/business - Create a business owned by the caller
///
/// Expected Input:
/// ```json
/// {
///   "name": "Corner Cafe",
///   "category": "Restaurant",
///   "description": "string",
///   "contact_information": "string",
///   "location": { "latitude": 41.31, "longitude": 69.24 },
///   "attachments": ["https://..."]
/// }
/// ```
#[utoipa::path(
    post,
    path = "/v1/business",
    tag = "business",
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Created business"),
        (status = 400, description = "Missing name or location out of range"),
    )
)]
pub async fn business_create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<CreateBusinessRequest>, JsonRejection>,
) -> ApiResult<Business> {
    let Json(body) = body?;
    require(&body.name, "Name")?;
    check_location(&body.location)?;

    let business = state
        .usecase
        .businesses
        .create(NewBusiness {
            name: body.name.trim().to_string(),
            category: body.category,
            description: body.description,
            contact_information: body.contact_information,
            location: body.location,
            attachments: body.attachments,
            created_by: auth.user_id,
        })
        .await?;

    info!("User {} created business {}", auth.user_id, business.id);
    Ok(ApiResponse::created(business))
}

/// GET /v1/business/:id
#[utoipa::path(
    get,
    path = "/v1/business/{id}",
    tag = "business",
    params(("id" = uuid::Uuid, Path, description = "Business id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Business"),
        (status = 404, description = "No such business"),
    )
)]
pub async fn business_get(State(state): State<AppState>, id: Result<Path<Uuid>, PathRejection>) -> ApiResult<Business> {
    let Path(id) = id?;
    let business = state.usecase.businesses.get_single(id).await?;
    Ok(ApiResponse::success(business))
}

/// GET /v1/business/list?search=cafe&category=Restaurant
///
/// One `search` term is matched against name, category and description;
/// `category` is an exact narrowing filter on top of it.
#[utoipa::path(
    get,
    path = "/v1/business/list",
    tag = "business",
    params(
        ("page" = Option<String>, Query, description = "1-based page, default 1"),
        ("limit" = Option<String>, Query, description = "Page size, default 10"),
        ("order" = Option<String>, Query, description = "e.g. `created_at desc`"),
        ("search" = Option<String>, Query, description = "Matches name, description or category"),
        ("category" = Option<String>, Query, description = "Exact category"),
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Page of businesses with total count"),
    )
)]
pub async fn business_list(
    State(state): State<AppState>,
    query: Result<Query<BusinessListQuery>, QueryRejection>,
) -> ApiResult<BusinessList> {
    let Query(q) = query?;
    let search = q.search.unwrap_or_default();
    let category = q.category.unwrap_or_default();

    let mut req =
        list_filter(&state, q.page.as_deref(), q.limit.as_deref(), q.order.as_deref(), OrderBy::desc("created_at"))
            .filter(Filter::search("name", search.clone()))
            .filter(Filter::search("description", search.clone()));
    // filters sharing a column are ORed, so a pinned category replaces the
    // category search instead of joining it
    req = if category.is_empty() {
        req.filter(Filter::search("category", search))
    } else {
        req.filter(Filter::exact("category", category))
    };

    let businesses = state.usecase.businesses.get_list(req).await?;
    Ok(ApiResponse::success(businesses))
}

/// PUT /v1/business - Partial update by id
#[utoipa::path(
    put,
    path = "/v1/business",
    tag = "business",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated business"),
        (status = 400, description = "Location out of range"),
        (status = 404, description = "No such business"),
    )
)]
pub async fn business_update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<BusinessUpdate>, JsonRejection>,
) -> ApiResult<Business> {
    let Json(body) = body?;
    if let Some(location) = &body.location {
        check_location(location)?;
    }
    let business = state.usecase.businesses.update(body.normalized()).await?;
    info!("User {} updated business {}", auth.user_id, business.id);
    Ok(ApiResponse::success(business))
}

/// DELETE /v1/business/:id
#[utoipa::path(
    delete,
    path = "/v1/business/{id}",
    tag = "business",
    params(("id" = uuid::Uuid, Path, description = "Business id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Business deleted"),
        (status = 404, description = "No such business"),
    )
)]
pub async fn business_delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Message> {
    let Path(id) = id?;
    state.usecase.businesses.delete(id).await?;
    info!("User {} deleted business {}", auth.user_id, id);
    Ok(ApiResponse::success(Message::new("Business deleted successfully")))
}

/// PATCH /v1/business/fields
#[utoipa::path(
    patch,
    path = "/v1/business/fields",
    tag = "business",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Number of rows changed"),
        (status = 400, description = "Empty items or missing exact filter"),
    )
)]
pub async fn business_update_fields(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Result<Json<UpdateFieldRequest<BusinessField>>, JsonRejection>,
) -> ApiResult<RowsEffected> {
    let Json(req) = body?;
    let rows = state.usecase.businesses.update_field(req).await?;
    info!("User {} updated {} business rows", auth.user_id, rows.rows_effected);
    Ok(ApiResponse::success(rows))
}
