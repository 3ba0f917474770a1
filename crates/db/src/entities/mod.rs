//! `SeaORM` entities, one module per table.

pub mod prelude;

pub mod customers;
pub mod drugs;
pub mod organizations;
pub mod password_reset_tokens;
pub mod pharmacies;
pub mod pharmacy_stock;
pub mod purchase_order_items;
pub mod purchase_orders;
pub mod role_permissions;
pub mod role_pharmacies;
pub mod roles;
pub mod sea_orm_active_enums;
pub mod stock_movements;
pub mod suppliers;
pub mod user_roles;
pub mod users;
