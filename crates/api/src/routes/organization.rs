//! The caller's organization.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::Principal};
use apotik_core::permission::Permission;
use apotik_db::{OrganizationRepository, entities::organizations};

/// Creates the organization routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/organization", get(get_organization))
}

/// Organization with the caller's standing in it.
#[derive(Debug, Serialize)]
pub struct OrganizationResponse {
    /// The organization.
    #[serde(flatten)]
    pub organization: organizations::Model,
    /// The caller.
    pub user_id: Uuid,
    /// The caller owns the organization.
    pub is_owner: bool,
    /// The caller holds every permission in the organization.
    pub is_super_admin: bool,
    /// Role ids held by the caller.
    pub role_ids: Vec<Uuid>,
}

/// GET /organization - The organization of the token.
async fn get_organization(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<OrganizationResponse>, ApiError> {
    principal.require(Permission::Authenticated, None)?;

    let organization = OrganizationRepository::new((*state.db).clone())
        .find_by_id(principal.organization_id())
        .await?
        .ok_or_else(|| ApiError::not_found("Organization not found"))?;

    Ok(Json(OrganizationResponse {
        organization,
        user_id: principal.user_id(),
        is_owner: principal.access.is_owner,
        is_super_admin: principal.access.is_super_admin(),
        role_ids: principal.access.roles.iter().map(|r| r.role_id).collect(),
    }))
}
