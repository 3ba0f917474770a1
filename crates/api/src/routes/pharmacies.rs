//! Pharmacy routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{AppState, error::ApiError, extractors::ValidatedJson, middleware::Principal};
use apotik_core::permission::Permission;
use apotik_db::{PharmacyRepository, repositories::CreatePharmacyInput};

/// Creates the pharmacy routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pharmacies", get(list_pharmacies).post(create_pharmacy))
        .route("/pharmacies/{pharmacy_id}", get(get_pharmacy))
}

/// Request body for creating a pharmacy.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePharmacyRequest {
    /// Code, unique within the organization.
    #[validate(length(min = 1, max = 50, message = "Code is required"))]
    pub code: String,
    /// Display name.
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    /// Street address.
    pub address: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Central warehouse; at most one per organization.
    #[serde(default)]
    pub is_main_warehouse: bool,
}

/// GET /pharmacies - Pharmacies whose stock the caller may read.
async fn list_pharmacies(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    let scope = principal.access.pharmacy_scope(Permission::InventoryRead);
    let pharmacies = PharmacyRepository::new((*state.db).clone())
        .list(principal.organization_id(), &scope)
        .await?;

    Ok(Json(json!({ "pharmacies": pharmacies })))
}

/// POST /pharmacies - Create a pharmacy.
async fn create_pharmacy(
    State(state): State<AppState>,
    principal: Principal,
    ValidatedJson(payload): ValidatedJson<CreatePharmacyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::SuperAdmin, None)?;

    let pharmacy = PharmacyRepository::new((*state.db).clone())
        .create(
            principal.organization_id(),
            CreatePharmacyInput {
                code: payload.code,
                name: payload.name,
                address: payload.address,
                phone: payload.phone,
                is_main_warehouse: payload.is_main_warehouse,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(pharmacy)))
}

/// GET /pharmacies/{pharmacy_id} - One pharmacy.
async fn get_pharmacy(
    State(state): State<AppState>,
    principal: Principal,
    Path(pharmacy_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::InventoryRead, Some(pharmacy_id))?;

    let pharmacy = PharmacyRepository::new((*state.db).clone())
        .find(principal.organization_id(), pharmacy_id)
        .await?;

    Ok(Json(pharmacy))
}
