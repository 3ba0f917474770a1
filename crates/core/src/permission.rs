//! Permission enumeration.
//!
//! Every capability a role can carry is a variant of [`Permission`]. A
//! permission serializes as its capability string (`"inventory:adjust"`)
//! and parses back case-insensitively. The structural markers
//! (`authenticated`, `public`, `owner`, `super_admin`,
//! `platform_super_admin`) are not capabilities of a domain; they describe
//! who may pass a check regardless of role contents.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Functional area a permission belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDomain {
    /// Drug catalog.
    Drug,
    /// Prescriptions.
    Prescription,
    /// Stock on hand and stock movements.
    Inventory,
    /// Users and role assignment.
    User,
    /// Reports.
    Reports,
    /// Customer orders.
    Orders,
    /// Supplier master data.
    Suppliers,
    /// Customer master data.
    Customers,
    /// Purchase orders.
    PurchaseOrders,
    /// Goods receipts against purchase orders.
    PurchaseReceipts,
    /// Supplier invoices against purchase orders.
    PurchaseInvoices,
    /// Sales invoices (dispensing).
    SalesInvoices,
    /// Structural markers.
    System,
}

macro_rules! permissions {
    ($( $(#[$meta:meta])* $variant:ident => $name:literal, $domain:ident; )*) => {
        /// A capability that can be granted through a role.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "&'static str")]
        pub enum Permission {
            $( $(#[$meta])* $variant, )*
        }

        impl Permission {
            /// Every permission, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),*];

            /// Returns the capability string.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }

            /// Returns the domain this permission belongs to.
            #[must_use]
            pub const fn domain(self) -> PermissionDomain {
                match self {
                    $(Self::$variant => PermissionDomain::$domain,)*
                }
            }
        }
    };
}

permissions! {
    /// View the drug catalog.
    DrugRead => "drug:read", Drug;
    /// Add drugs to the catalog.
    DrugCreate => "drug:create", Drug;
    /// Edit catalog entries.
    DrugUpdate => "drug:update", Drug;
    /// Remove catalog entries.
    DrugDelete => "drug:delete", Drug;

    /// View prescriptions.
    PrescriptionRead => "prescription:read", Prescription;
    /// Record prescriptions.
    PrescriptionCreate => "prescription:create", Prescription;
    /// Verify a prescription before dispensing.
    PrescriptionVerify => "prescription:verify", Prescription;
    /// Dispense against a prescription.
    PrescriptionDispense => "prescription:dispense", Prescription;

    /// View stock levels and movements.
    InventoryRead => "inventory:read", Inventory;
    /// Post signed stock adjustments and returns.
    InventoryAdjust => "inventory:adjust", Inventory;
    /// Move stock between pharmacies.
    InventoryTransfer => "inventory:transfer", Inventory;
    /// Reserve and release stock.
    InventoryAllocate => "inventory:allocate", Inventory;
    /// Place or lift a quarantine on a batch.
    InventoryQuarantine => "inventory:quarantine", Inventory;
    /// Reconcile counted quantities.
    InventoryStockTake => "inventory:stock_take", Inventory;
    /// Write off expired, damaged or recalled stock.
    InventoryWriteOff => "inventory:write_off", Inventory;

    /// View users.
    UserRead => "user:read", User;
    /// Create users.
    UserCreate => "user:create", User;
    /// Edit users.
    UserUpdate => "user:update", User;
    /// Deactivate users.
    UserDelete => "user:delete", User;
    /// Create roles and assign them.
    UserManageRoles => "user:manage_roles", User;

    /// View reports.
    ReportsView => "reports:view", Reports;
    /// Export reports.
    ReportsExport => "reports:export", Reports;

    /// View customer orders.
    OrderRead => "order:read", Orders;
    /// Create customer orders.
    OrderCreate => "order:create", Orders;
    /// Edit customer orders.
    OrderUpdate => "order:update", Orders;
    /// Cancel customer orders.
    OrderCancel => "order:cancel", Orders;

    /// View suppliers.
    SupplierRead => "supplier:read", Suppliers;
    /// Create suppliers.
    SupplierCreate => "supplier:create", Suppliers;
    /// Edit suppliers.
    SupplierUpdate => "supplier:update", Suppliers;
    /// Delete suppliers.
    SupplierDelete => "supplier:delete", Suppliers;

    /// View customers.
    CustomerRead => "customer:read", Customers;
    /// Create customers.
    CustomerCreate => "customer:create", Customers;
    /// Edit customers.
    CustomerUpdate => "customer:update", Customers;
    /// Delete customers.
    CustomerDelete => "customer:delete", Customers;

    /// View purchase orders.
    PurchaseOrderRead => "purchase_order:read", PurchaseOrders;
    /// Create and amend purchase orders.
    PurchaseOrderCreate => "purchase_order:create", PurchaseOrders;
    /// Edit draft orders and close submitted ones.
    PurchaseOrderUpdate => "purchase_order:update", PurchaseOrders;
    /// Delete draft orders.
    PurchaseOrderDelete => "purchase_order:delete", PurchaseOrders;
    /// Submit draft orders.
    PurchaseOrderSubmit => "purchase_order:submit", PurchaseOrders;
    /// Cancel submitted orders.
    PurchaseOrderCancel => "purchase_order:cancel", PurchaseOrders;

    /// View goods receipts.
    PurchaseReceiptRead => "purchase_receipt:read", PurchaseReceipts;
    /// Receive goods into stock.
    PurchaseReceiptCreate => "purchase_receipt:create", PurchaseReceipts;

    /// View supplier invoices.
    PurchaseInvoiceRead => "purchase_invoice:read", PurchaseInvoices;
    /// Record supplier invoices.
    PurchaseInvoiceCreate => "purchase_invoice:create", PurchaseInvoices;

    /// View sales invoices.
    SalesInvoiceRead => "sales_invoice:read", SalesInvoices;
    /// Sell and dispense stock.
    SalesInvoiceCreate => "sales_invoice:create", SalesInvoices;
    /// Cancel sales invoices.
    SalesInvoiceCancel => "sales_invoice:cancel", SalesInvoices;

    /// Any signed-in principal.
    Authenticated => "authenticated", System;
    /// Anyone, signed in or not.
    Public => "public", System;
    /// The organization owner.
    Owner => "owner", System;
    /// Full authority inside one organization.
    SuperAdmin => "super_admin", System;
    /// Full authority across every organization.
    PlatformSuperAdmin => "platform_super_admin", System;
}

impl Permission {
    /// Parses a capability string, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
    }

    /// Returns true for the structural markers.
    #[must_use]
    pub const fn is_structural(self) -> bool {
        matches!(self.domain(), PermissionDomain::System)
    }

    /// Returns every permission of a domain.
    pub fn in_domain(domain: PermissionDomain) -> impl Iterator<Item = Self> {
        Self::ALL.iter().copied().filter(move |p| p.domain() == domain)
    }
}

/// Raised when a string names no permission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown permission: {0}")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

impl TryFrom<String> for Permission {
    type Error = UnknownPermission;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Permission> for &'static str {
    fn from(p: Permission) -> Self {
        p.as_str()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[rstest]
    #[case("inventory:adjust", Permission::InventoryAdjust)]
    #[case("INVENTORY:ADJUST", Permission::InventoryAdjust)]
    #[case("  purchase_receipt:create ", Permission::PurchaseReceiptCreate)]
    #[case("Super_Admin", Permission::SuperAdmin)]
    #[case("public", Permission::Public)]
    fn test_parse(#[case] input: &str, #[case] expected: Permission) {
        assert_eq!(Permission::parse(input), Some(expected));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(Permission::parse("inventory:teleport"), None);
        assert!("".parse::<Permission>().is_err());
    }

    #[test]
    fn test_capability_strings_are_unique_and_roundtrip() {
        let names: HashSet<&str> = Permission::ALL.iter().map(|p| p.as_str()).collect();
        assert_eq!(names.len(), Permission::ALL.len());

        for p in Permission::ALL {
            assert_eq!(Permission::parse(p.as_str()), Some(*p));
        }
    }

    #[test]
    fn test_domain_prefix_matches() {
        for p in Permission::ALL.iter().filter(|p| !p.is_structural()) {
            let prefix = p.as_str().split(':').next().unwrap_or_default();
            let expected = match p.domain() {
                PermissionDomain::Drug => "drug",
                PermissionDomain::Prescription => "prescription",
                PermissionDomain::Inventory => "inventory",
                PermissionDomain::User => "user",
                PermissionDomain::Reports => "reports",
                PermissionDomain::Orders => "order",
                PermissionDomain::Suppliers => "supplier",
                PermissionDomain::Customers => "customer",
                PermissionDomain::PurchaseOrders => "purchase_order",
                PermissionDomain::PurchaseReceipts => "purchase_receipt",
                PermissionDomain::PurchaseInvoices => "purchase_invoice",
                PermissionDomain::SalesInvoices => "sales_invoice",
                PermissionDomain::System => unreachable!(),
            };
            assert_eq!(prefix, expected, "{p}");
        }
    }

    #[test]
    fn test_structural_markers() {
        let markers: Vec<_> = Permission::in_domain(PermissionDomain::System).collect();
        assert_eq!(
            markers,
            vec![
                Permission::Authenticated,
                Permission::Public,
                Permission::Owner,
                Permission::SuperAdmin,
                Permission::PlatformSuperAdmin,
            ]
        );
        assert!(!Permission::DrugRead.is_structural());
    }

    #[test]
    fn test_serde_uses_capability_string() {
        let json = serde_json::to_string(&Permission::InventoryStockTake).unwrap();
        assert_eq!(json, "\"inventory:stock_take\"");

        let parsed: Permission = serde_json::from_str("\"Drug:Read\"").unwrap();
        assert_eq!(parsed, Permission::DrugRead);

        assert!(serde_json::from_str::<Permission>("\"drug:eat\"").is_err());
    }
}
