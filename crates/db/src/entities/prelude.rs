//! Entity aliases.

pub use super::customers::Entity as Customers;
pub use super::drugs::Entity as Drugs;
pub use super::organizations::Entity as Organizations;
pub use super::password_reset_tokens::Entity as PasswordResetTokens;
pub use super::pharmacies::Entity as Pharmacies;
pub use super::pharmacy_stock::Entity as PharmacyStock;
pub use super::purchase_order_items::Entity as PurchaseOrderItems;
pub use super::purchase_orders::Entity as PurchaseOrders;
pub use super::role_permissions::Entity as RolePermissions;
pub use super::role_pharmacies::Entity as RolePharmacies;
pub use super::roles::Entity as Roles;
pub use super::stock_movements::Entity as StockMovements;
pub use super::suppliers::Entity as Suppliers;
pub use super::user_roles::Entity as UserRoles;
pub use super::users::Entity as Users;
