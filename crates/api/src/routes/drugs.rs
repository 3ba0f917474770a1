//! Drug catalog routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState, error::ApiError, extractors::ValidatedJson, middleware::Principal, routes::page_request,
};
use apotik_core::permission::Permission;
use apotik_db::{DrugRepository, repositories::CreateDrugInput};
use apotik_shared::types::PageResponse;

/// Creates the drug routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/drugs", get(list_drugs).post(create_drug))
        .route("/drugs/{drug_id}", get(get_drug))
}

/// Query parameters for listing drugs.
#[derive(Debug, Deserialize)]
pub struct ListDrugsQuery {
    /// Fragment of the name, generic name or code.
    pub search: Option<String>,
    /// Page number (1-indexed).
    pub page: Option<u32>,
    /// Page size.
    pub per_page: Option<u32>,
}

/// Request body for creating a drug.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDrugRequest {
    /// Code, unique within the organization.
    #[validate(length(min = 1, max = 50, message = "Code is required"))]
    pub code: String,
    /// Brand or trade name.
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    /// International non-proprietary name.
    pub generic_name: Option<String>,
    /// Stock unit (TAB, BTL, ...).
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
}

/// GET /drugs - Page through the catalog.
async fn list_drugs(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<ListDrugsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::DrugRead, None)?;

    let page = page_request(query.page, query.per_page);
    let (drugs, total) = DrugRepository::new((*state.db).clone())
        .list(principal.organization_id(), query.search.as_deref(), page)
        .await?;

    Ok(Json(PageResponse::new(drugs, page, total)))
}

/// POST /drugs - Add a drug to the catalog.
async fn create_drug(
    State(state): State<AppState>,
    principal: Principal,
    ValidatedJson(payload): ValidatedJson<CreateDrugRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::DrugCreate, None)?;

    let drug = DrugRepository::new((*state.db).clone())
        .create(
            principal.organization_id(),
            CreateDrugInput {
                code: payload.code,
                name: payload.name,
                generic_name: payload.generic_name,
                unit: payload.unit,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(drug)))
}

/// GET /drugs/{drug_id} - One drug.
async fn get_drug(
    State(state): State<AppState>,
    principal: Principal,
    Path(drug_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::DrugRead, None)?;

    let drug = DrugRepository::new((*state.db).clone())
        .find(principal.organization_id(), drug_id)
        .await?;

    Ok(Json(drug))
}
