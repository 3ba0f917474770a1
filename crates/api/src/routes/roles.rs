//! Roles, pharmacy scopes and role assignments.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{AppState, error::ApiError, extractors::ValidatedJson, middleware::Principal};
use apotik_core::permission::Permission;
use apotik_db::{RoleRepository, UserRepository, repositories::CreateRoleInput};

/// Creates the role and user-role routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/{role_id}/pharmacies", put(set_role_pharmacies))
        .route("/users", get(list_users))
        .route("/users/{user_id}/roles", post(assign_role))
        .route("/users/{user_id}/roles/{role_id}", delete(unassign_role))
}

/// Request body for creating a role.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoleRequest {
    /// Name, unique within the organization.
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Capability strings such as `inventory:adjust`.
    #[serde(default)]
    pub permissions: Vec<Permission>,
    /// Pharmacies the role is limited to; omit for every pharmacy.
    #[serde(default)]
    pub pharmacy_ids: Vec<Uuid>,
}

/// Request body replacing a role's pharmacy scope.
#[derive(Debug, Deserialize, Validate)]
pub struct SetPharmaciesRequest {
    /// New scope; empty widens the role to every pharmacy.
    pub pharmacy_ids: Vec<Uuid>,
}

/// Request body for assigning a role.
#[derive(Debug, Deserialize, Validate)]
pub struct AssignRoleRequest {
    /// Role to assign.
    pub role_id: Uuid,
}

/// GET /roles
async fn list_roles(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::UserManageRoles, None)?;
    let roles = RoleRepository::new((*state.db).clone())
        .list(principal.organization_id())
        .await?;
    Ok(Json(json!({ "roles": roles })))
}

/// POST /roles
async fn create_role(
    State(state): State<AppState>,
    principal: Principal,
    ValidatedJson(payload): ValidatedJson<CreateRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::UserManageRoles, None)?;

    // Only holders of every permission may hand out super_admin.
    if payload.permissions.contains(&Permission::SuperAdmin) {
        principal.require(Permission::SuperAdmin, None)?;
    }
    if payload.permissions.iter().any(|p| {
        matches!(
            p,
            Permission::Owner | Permission::PlatformSuperAdmin | Permission::Public
        )
    }) {
        return Err(ApiError::validation(
            "owner, platform_super_admin and public cannot be granted through a role",
        ));
    }

    let role = RoleRepository::new((*state.db).clone())
        .create(
            principal.organization_id(),
            CreateRoleInput {
                name: payload.name,
                description: payload.description,
                permissions: payload.permissions,
                pharmacy_ids: payload.pharmacy_ids,
            },
        )
        .await?;

    info!(user_id = %principal.user_id(), role_id = %role.role.id, "Role created");
    Ok((StatusCode::CREATED, Json(role)))
}

/// PUT /roles/{role_id}/pharmacies - Replace the role's pharmacy scope.
async fn set_role_pharmacies(
    State(state): State<AppState>,
    principal: Principal,
    Path(role_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<SetPharmaciesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::UserManageRoles, None)?;

    let pharmacy_ids = RoleRepository::new((*state.db).clone())
        .set_pharmacies(principal.organization_id(), role_id, &payload.pharmacy_ids)
        .await?;

    info!(
        user_id = %principal.user_id(),
        role_id = %role_id,
        pharmacies = pharmacy_ids.len(),
        "Role scope replaced"
    );
    Ok(Json(json!({ "role_id": role_id, "pharmacy_ids": pharmacy_ids })))
}

/// GET /users - Members of the organization.
async fn list_users(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::UserRead, None)?;
    let users = UserRepository::new((*state.db).clone())
        .list_by_organization(principal.organization_id())
        .await?;
    Ok(Json(json!({ "users": users })))
}

/// POST /users/{user_id}/roles - Assign a role.
async fn assign_role(
    State(state): State<AppState>,
    principal: Principal,
    Path(user_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<AssignRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::UserManageRoles, None)?;

    RoleRepository::new((*state.db).clone())
        .assign_to_user(principal.organization_id(), user_id, payload.role_id)
        .await?;

    info!(
        user_id = %principal.user_id(),
        target_user_id = %user_id,
        role_id = %payload.role_id,
        "Role assigned"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /users/{user_id}/roles/{role_id} - Remove a role.
async fn unassign_role(
    State(state): State<AppState>,
    principal: Principal,
    Path((user_id, role_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::UserManageRoles, None)?;

    let removed = RoleRepository::new((*state.db).clone())
        .unassign_from_user(principal.organization_id(), user_id, role_id)
        .await?;
    if !removed {
        return Err(ApiError::not_found("Role is not assigned to the user"));
    }

    info!(
        user_id = %principal.user_id(),
        target_user_id = %user_id,
        role_id = %role_id,
        "Role removed"
    );
    Ok(StatusCode::NO_CONTENT)
}
