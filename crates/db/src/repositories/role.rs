//! Roles, their permissions and pharmacy scope, and user assignments.
//!
//! Also resolves the [`AccessContext`] a request is authorized against.

use std::collections::{BTreeSet, HashMap};

use apotik_core::access::{AccessContext, RoleGrant};
use apotik_core::permission::Permission;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::{
    organizations, pharmacies, role_permissions, role_pharmacies, roles, user_roles, users,
};
use crate::repositories::constraint::is_unique_violation;
use crate::rls::RlsExt;

/// Error types for role operations.
#[derive(Debug, thiserror::Error)]
pub enum RoleError {
    /// Role name already used in the organization.
    #[error("Role '{0}' already exists")]
    DuplicateName(String),

    /// Role not found in the organization.
    #[error("Role not found: {0}")]
    NotFound(Uuid),

    /// User not found in the organization.
    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    /// Pharmacy belongs to another organization or does not exist.
    #[error("Pharmacy {0} does not belong to this organization")]
    PharmacyNotInOrganization(Uuid),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Input for creating a role.
#[derive(Debug, Clone, Default)]
pub struct CreateRoleInput {
    /// Name, unique within the organization.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Granted permissions.
    pub permissions: Vec<Permission>,
    /// Pharmacies the role is limited to; empty means all.
    pub pharmacy_ids: Vec<Uuid>,
}

/// A role with its permissions and pharmacy scope.
#[derive(Debug, Clone, Serialize)]
pub struct RoleWithScope {
    /// The role record.
    #[serde(flatten)]
    pub role: roles::Model,
    /// Permissions, sorted by capability string.
    pub permissions: Vec<Permission>,
    /// Pharmacies the role is limited to; empty means all.
    pub pharmacy_ids: Vec<Uuid>,
}

/// Role repository.
#[derive(Debug, Clone)]
pub struct RoleRepository {
    db: DatabaseConnection,
}

impl RoleRepository {
    /// Creates a new role repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a role with its permissions and pharmacy scope.
    ///
    /// # Errors
    ///
    /// Returns an error for a duplicate name or a pharmacy outside the
    /// organization.
    pub async fn create(
        &self,
        organization_id: Uuid,
        input: CreateRoleInput,
    ) -> Result<RoleWithScope, RoleError> {
        let name = input.name.trim().to_string();
        let now = chrono::Utc::now().into();
        let rls = self.db.with_rls(organization_id).await?;

        let role = roles::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            name: Set(name.clone()),
            description: Set(input.description),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(rls.transaction())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RoleError::DuplicateName(name.clone())
            } else {
                RoleError::Database(e)
            }
        })?;

        let permissions: BTreeSet<Permission> = input.permissions.into_iter().collect();
        for permission in &permissions {
            role_permissions::ActiveModel {
                role_id: Set(role.id),
                permission: Set(permission.as_str().to_string()),
                created_at: Set(now),
            }
            .insert(rls.transaction())
            .await?;
        }

        let pharmacy_ids =
            replace_pharmacies(rls.transaction(), organization_id, role.id, &input.pharmacy_ids)
                .await?;
        rls.commit().await?;

        tracing::info!(org_id = %organization_id, role_id = %role.id, name = %role.name, "Role created");
        Ok(RoleWithScope {
            role,
            permissions: permissions.into_iter().collect(),
            pharmacy_ids,
        })
    }

    /// Lists the roles of an organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self, organization_id: Uuid) -> Result<Vec<RoleWithScope>, DbErr> {
        let rls = self.db.with_rls(organization_id).await?;
        let txn = rls.transaction();

        let roles = roles::Entity::find()
            .filter(roles::Column::OrganizationId.eq(organization_id))
            .order_by_asc(roles::Column::Name)
            .all(txn)
            .await?;
        let ids: Vec<Uuid> = roles.iter().map(|r| r.id).collect();
        let (mut permissions, mut pharmacies) = load_scopes(txn, &ids).await?;
        rls.commit().await?;

        Ok(roles
            .into_iter()
            .map(|role| RoleWithScope {
                permissions: permissions
                    .remove(&role.id)
                    .map(|p| p.into_iter().collect())
                    .unwrap_or_default(),
                pharmacy_ids: pharmacies
                    .remove(&role.id)
                    .map(|p| p.into_iter().collect())
                    .unwrap_or_default(),
                role,
            })
            .collect())
    }

    /// Replaces the pharmacy scope of a role.
    ///
    /// # Errors
    ///
    /// Returns an error if the role is unknown or a pharmacy belongs to
    /// another organization.
    pub async fn set_pharmacies(
        &self,
        organization_id: Uuid,
        role_id: Uuid,
        pharmacy_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, RoleError> {
        let rls = self.db.with_rls(organization_id).await?;
        find_role(rls.transaction(), organization_id, role_id).await?;
        let ids = replace_pharmacies(rls.transaction(), organization_id, role_id, pharmacy_ids)
            .await?;
        rls.commit().await?;

        tracing::info!(org_id = %organization_id, role_id = %role_id, pharmacies = ids.len(), "Role scope replaced");
        Ok(ids)
    }

    /// Assigns a role to a user of the same organization.
    ///
    /// Assigning a role twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the role or user is not in the organization.
    pub async fn assign_to_user(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        role_id: Uuid,
    ) -> Result<(), RoleError> {
        let rls = self.db.with_rls(organization_id).await?;
        let txn = rls.transaction();

        find_role(txn, organization_id, role_id).await?;
        let member = users::Entity::find_by_id(user_id)
            .filter(users::Column::OrganizationId.eq(organization_id))
            .count(txn)
            .await?;
        if member == 0 {
            return Err(RoleError::UserNotFound(user_id));
        }

        let existing = user_roles::Entity::find_by_id((user_id, role_id))
            .one(txn)
            .await?;
        if existing.is_none() {
            user_roles::ActiveModel {
                user_id: Set(user_id),
                role_id: Set(role_id),
                organization_id: Set(organization_id),
                created_at: Set(chrono::Utc::now().into()),
            }
            .insert(txn)
            .await?;
        }
        rls.commit().await?;
        Ok(())
    }

    /// Removes a role from a user. Returns false if it was not assigned.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn unassign_from_user(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        role_id: Uuid,
    ) -> Result<bool, DbErr> {
        let rls = self.db.with_rls(organization_id).await?;
        let result = user_roles::Entity::delete_many()
            .filter(user_roles::Column::OrganizationId.eq(organization_id))
            .filter(user_roles::Column::UserId.eq(user_id))
            .filter(user_roles::Column::RoleId.eq(role_id))
            .exec(rls.transaction())
            .await?;
        rls.commit().await?;
        Ok(result.rows_affected > 0)
    }

    /// Resolves what a user may do inside an organization.
    ///
    /// Returns `None` for an unknown or inactive user, or a user of another
    /// organization who is not a platform admin.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn load_access_context(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AccessContext>, DbErr> {
        let Some(user) = users::Entity::find_by_id(user_id).one(&self.db).await? else {
            return Ok(None);
        };
        if !user.is_active || (user.organization_id != organization_id && !user.is_platform_admin)
        {
            return Ok(None);
        }
        let owner_id = organizations::Entity::find_by_id(organization_id)
            .one(&self.db)
            .await?
            .and_then(|org| org.owner_id);

        let rls = self.db.with_rls(organization_id).await?;
        let txn = rls.transaction();
        let role_ids: Vec<Uuid> = user_roles::Entity::find()
            .filter(user_roles::Column::UserId.eq(user_id))
            .filter(user_roles::Column::OrganizationId.eq(organization_id))
            .all(txn)
            .await?
            .into_iter()
            .map(|ur| ur.role_id)
            .collect();
        let (mut permissions, mut pharmacies) = load_scopes(txn, &role_ids).await?;
        rls.commit().await?;

        let mut context = AccessContext::new(user_id, organization_id);
        context.is_platform_admin = user.is_platform_admin;
        context.is_owner = owner_id == Some(user_id);
        context.roles = role_ids
            .into_iter()
            .map(|role_id| {
                RoleGrant::new(
                    role_id,
                    permissions.remove(&role_id).unwrap_or_default(),
                    pharmacies.remove(&role_id).unwrap_or_default(),
                )
            })
            .collect();
        Ok(Some(context))
    }
}

async fn find_role(
    txn: &DatabaseTransaction,
    organization_id: Uuid,
    role_id: Uuid,
) -> Result<roles::Model, RoleError> {
    roles::Entity::find_by_id(role_id)
        .filter(roles::Column::OrganizationId.eq(organization_id))
        .one(txn)
        .await?
        .ok_or(RoleError::NotFound(role_id))
}

async fn replace_pharmacies(
    txn: &DatabaseTransaction,
    organization_id: Uuid,
    role_id: Uuid,
    pharmacy_ids: &[Uuid],
) -> Result<Vec<Uuid>, RoleError> {
    let wanted: BTreeSet<Uuid> = pharmacy_ids.iter().copied().collect();

    if !wanted.is_empty() {
        let known: BTreeSet<Uuid> = pharmacies::Entity::find()
            .filter(pharmacies::Column::OrganizationId.eq(organization_id))
            .filter(pharmacies::Column::Id.is_in(wanted.iter().copied()))
            .all(txn)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        if let Some(foreign) = wanted.difference(&known).next() {
            return Err(RoleError::PharmacyNotInOrganization(*foreign));
        }
    }

    role_pharmacies::Entity::delete_many()
        .filter(role_pharmacies::Column::RoleId.eq(role_id))
        .exec(txn)
        .await?;

    let now = chrono::Utc::now().into();
    for pharmacy_id in &wanted {
        role_pharmacies::ActiveModel {
            role_id: Set(role_id),
            pharmacy_id: Set(*pharmacy_id),
            organization_id: Set(organization_id),
            created_at: Set(now),
        }
        .insert(txn)
        .await?;
    }

    Ok(wanted.into_iter().collect())
}

type Scopes = (
    HashMap<Uuid, BTreeSet<Permission>>,
    HashMap<Uuid, BTreeSet<Uuid>>,
);

async fn load_scopes(txn: &DatabaseTransaction, role_ids: &[Uuid]) -> Result<Scopes, DbErr> {
    let mut permissions: HashMap<Uuid, BTreeSet<Permission>> = HashMap::new();
    let mut pharmacies: HashMap<Uuid, BTreeSet<Uuid>> = HashMap::new();
    if role_ids.is_empty() {
        return Ok((permissions, pharmacies));
    }

    for row in role_permissions::Entity::find()
        .filter(role_permissions::Column::RoleId.is_in(role_ids.iter().copied()))
        .all(txn)
        .await?
    {
        // Rows written before a capability was retired are ignored.
        match Permission::parse(&row.permission) {
            Some(permission) => {
                permissions.entry(row.role_id).or_default().insert(permission);
            }
            None => {
                tracing::warn!(role_id = %row.role_id, permission = %row.permission, "Unknown permission ignored");
            }
        }
    }

    for row in role_pharmacies::Entity::find()
        .filter(role_pharmacies::Column::RoleId.is_in(role_ids.iter().copied()))
        .all(txn)
        .await?
    {
        pharmacies.entry(row.role_id).or_default().insert(row.pharmacy_id);
    }

    Ok((permissions, pharmacies))
}
