//! Authorization decisions.
//!
//! An [`AccessContext`] is the resolved authority of one user inside one
//! organization: the flags from the user and organization rows plus every
//! role the user holds, each with its permissions and pharmacy scope.
//!
//! A capability is granted only when a *single* role carries it and covers
//! the requested pharmacy. Role A's permission never combines with role B's
//! pharmacy scope.

use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;
use uuid::Uuid;

use crate::permission::Permission;

/// Errors returned by authorization checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// No role carries the permission.
    #[error("Missing permission {permission}")]
    MissingPermission {
        /// The permission that was checked.
        permission: Permission,
    },

    /// A role carries the permission, but none covers the pharmacy.
    #[error("Permission {permission} does not cover pharmacy {pharmacy_id}")]
    PharmacyOutOfScope {
        /// The permission that was checked.
        permission: Permission,
        /// The pharmacy that was requested.
        pharmacy_id: Uuid,
    },
}

impl AccessError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        403
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::MissingPermission { .. } => "MISSING_PERMISSION",
            Self::PharmacyOutOfScope { .. } => "PHARMACY_OUT_OF_SCOPE",
        }
    }
}

/// One role held by the user.
#[derive(Debug, Clone, Default)]
pub struct RoleGrant {
    /// The role.
    pub role_id: Uuid,
    /// Permissions the role carries.
    pub permissions: HashSet<Permission>,
    /// Pharmacies the role is restricted to. Empty means every pharmacy of
    /// the organization.
    pub pharmacy_ids: BTreeSet<Uuid>,
}

impl RoleGrant {
    /// Creates a grant.
    #[must_use]
    pub fn new(
        role_id: Uuid,
        permissions: impl IntoIterator<Item = Permission>,
        pharmacy_ids: impl IntoIterator<Item = Uuid>,
    ) -> Self {
        Self {
            role_id,
            permissions: permissions.into_iter().collect(),
            pharmacy_ids: pharmacy_ids.into_iter().collect(),
        }
    }

    /// Returns true if the role is not restricted to particular pharmacies.
    #[must_use]
    pub fn is_organization_wide(&self) -> bool {
        self.pharmacy_ids.is_empty()
    }

    /// Returns true if the role's scope includes the pharmacy.
    ///
    /// `None` is a pharmacy-independent check and is always covered.
    #[must_use]
    pub fn covers(&self, pharmacy_id: Option<Uuid>) -> bool {
        match pharmacy_id {
            None => true,
            Some(id) => self.is_organization_wide() || self.pharmacy_ids.contains(&id),
        }
    }

    /// Returns true if the role carries `super_admin`.
    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.permissions.contains(&Permission::SuperAdmin)
    }
}

/// Pharmacies a user may see for one permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "pharmacy_ids")]
pub enum PharmacyScope {
    /// Every pharmacy of the organization.
    All,
    /// Only the listed pharmacies.
    Only(BTreeSet<Uuid>),
}

impl PharmacyScope {
    /// Returns true if the pharmacy is inside the scope.
    #[must_use]
    pub fn contains(&self, pharmacy_id: Uuid) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.contains(&pharmacy_id),
        }
    }
}

/// Resolved authority of a user inside their organization.
#[derive(Debug, Clone)]
pub struct AccessContext {
    /// The user.
    pub user_id: Uuid,
    /// The organization the request runs in.
    pub organization_id: Uuid,
    /// Platform operators bypass every check.
    pub is_platform_admin: bool,
    /// The user owns the organization.
    pub is_owner: bool,
    /// Roles held inside the organization.
    pub roles: Vec<RoleGrant>,
}

impl AccessContext {
    /// Creates a context with no roles.
    #[must_use]
    pub fn new(user_id: Uuid, organization_id: Uuid) -> Self {
        Self {
            user_id,
            organization_id,
            is_platform_admin: false,
            is_owner: false,
            roles: Vec::new(),
        }
    }

    /// Returns true for the owner or a holder of a `super_admin` role.
    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.is_platform_admin || self.is_owner || self.roles.iter().any(RoleGrant::is_super_admin)
    }

    /// Checks a permission, optionally against a pharmacy.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::MissingPermission` when no role carries the
    /// permission, and `AccessError::PharmacyOutOfScope` when roles carry it
    /// but none of them covers the pharmacy.
    pub fn authorize(
        &self,
        permission: Permission,
        pharmacy_id: Option<Uuid>,
    ) -> Result<(), AccessError> {
        if self.is_granted(permission, pharmacy_id) {
            return Ok(());
        }

        let carried = self
            .roles
            .iter()
            .any(|r| r.permissions.contains(&permission));

        match pharmacy_id {
            Some(pharmacy_id) if carried => Err(AccessError::PharmacyOutOfScope {
                permission,
                pharmacy_id,
            }),
            _ => Err(AccessError::MissingPermission { permission }),
        }
    }

    /// Returns true if the permission is granted for the pharmacy.
    #[must_use]
    pub fn is_granted(&self, permission: Permission, pharmacy_id: Option<Uuid>) -> bool {
        match permission {
            Permission::Public | Permission::Authenticated => return true,
            Permission::PlatformSuperAdmin => return self.is_platform_admin,
            Permission::Owner => return self.is_platform_admin || self.is_owner,
            _ => {}
        }

        if self.is_super_admin() {
            return true;
        }

        self.roles
            .iter()
            .any(|r| r.permissions.contains(&permission) && r.covers(pharmacy_id))
    }

    /// Pharmacies for which the permission is granted.
    #[must_use]
    pub fn pharmacy_scope(&self, permission: Permission) -> PharmacyScope {
        if permission.is_structural() {
            return if self.is_granted(permission, None) {
                PharmacyScope::All
            } else {
                PharmacyScope::Only(BTreeSet::new())
            };
        }

        let carrying = || {
            self.roles
                .iter()
                .filter(move |r| r.permissions.contains(&permission))
        };

        if self.is_super_admin() || carrying().any(RoleGrant::is_organization_wide) {
            return PharmacyScope::All;
        }

        PharmacyScope::Only(
            carrying()
                .flat_map(|r| r.pharmacy_ids.iter().copied())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(roles: Vec<RoleGrant>) -> AccessContext {
        AccessContext {
            roles,
            ..AccessContext::new(Uuid::new_v4(), Uuid::new_v4())
        }
    }

    #[test]
    fn test_public_and_authenticated_always_pass() {
        let c = ctx(vec![]);
        assert!(c.authorize(Permission::Public, None).is_ok());
        assert!(c.authorize(Permission::Authenticated, Some(Uuid::new_v4())).is_ok());
    }

    #[test]
    fn test_missing_permission() {
        let c = ctx(vec![]);
        assert_eq!(
            c.authorize(Permission::DrugRead, None),
            Err(AccessError::MissingPermission {
                permission: Permission::DrugRead
            })
        );
    }

    #[test]
    fn test_organization_wide_role_covers_every_pharmacy() {
        let c = ctx(vec![RoleGrant::new(
            Uuid::new_v4(),
            [Permission::InventoryRead],
            [],
        )]);
        assert!(c.is_granted(Permission::InventoryRead, Some(Uuid::new_v4())));
        assert!(c.is_granted(Permission::InventoryRead, None));
        assert_eq!(c.pharmacy_scope(Permission::InventoryRead), PharmacyScope::All);
    }

    #[test]
    fn test_scoped_role() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = ctx(vec![RoleGrant::new(
            Uuid::new_v4(),
            [Permission::InventoryAdjust],
            [a],
        )]);

        assert!(c.authorize(Permission::InventoryAdjust, Some(a)).is_ok());
        assert_eq!(
            c.authorize(Permission::InventoryAdjust, Some(b)),
            Err(AccessError::PharmacyOutOfScope {
                permission: Permission::InventoryAdjust,
                pharmacy_id: b
            })
        );
        assert!(c.is_granted(Permission::InventoryAdjust, None));
        assert_eq!(
            c.pharmacy_scope(Permission::InventoryAdjust),
            PharmacyScope::Only([a].into_iter().collect())
        );
    }

    #[test]
    fn test_roles_do_not_mix() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        // Role 1 may adjust at A; role 2 may only read at B.
        let c = ctx(vec![
            RoleGrant::new(Uuid::new_v4(), [Permission::InventoryAdjust], [a]),
            RoleGrant::new(Uuid::new_v4(), [Permission::InventoryRead], [b]),
        ]);

        assert!(!c.is_granted(Permission::InventoryAdjust, Some(b)));
        assert!(!c.is_granted(Permission::InventoryRead, Some(a)));
        assert!(c.is_granted(Permission::InventoryRead, Some(b)));
    }

    #[test]
    fn test_owner_and_super_admin() {
        let mut owner = ctx(vec![]);
        owner.is_owner = true;
        assert!(owner.is_granted(Permission::PurchaseOrderCancel, Some(Uuid::new_v4())));
        assert!(owner.is_granted(Permission::Owner, None));
        assert!(!owner.is_granted(Permission::PlatformSuperAdmin, None));

        let scoped_admin = ctx(vec![RoleGrant::new(
            Uuid::new_v4(),
            [Permission::SuperAdmin],
            [Uuid::new_v4()],
        )]);
        assert!(scoped_admin.is_super_admin());
        assert!(scoped_admin.is_granted(Permission::InventoryTransfer, Some(Uuid::new_v4())));
        assert!(!scoped_admin.is_granted(Permission::Owner, None));
    }

    #[test]
    fn test_platform_admin() {
        let mut c = ctx(vec![]);
        c.is_platform_admin = true;
        assert!(c.is_granted(Permission::PlatformSuperAdmin, None));
        assert!(c.is_granted(Permission::Owner, None));
        assert!(c.is_granted(Permission::UserManageRoles, Some(Uuid::new_v4())));
    }

    #[test]
    fn test_error_codes() {
        let err = AccessError::MissingPermission {
            permission: Permission::DrugCreate,
        };
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.error_code(), "MISSING_PERMISSION");
        assert!(err.to_string().contains("drug:create"));
    }
}
