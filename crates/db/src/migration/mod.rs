//! Database migrations.
//!
//! Migrations are managed using sea-orm-migration and applied in name order.

pub use sea_orm_migration::prelude::*;

mod m20250110_000001_create_users_and_pharmacies;
mod m20250115_000002_create_organizations;
mod m20250120_000003_create_role_pharmacies;
mod m20250201_000004_create_drugs_and_parties;
mod m20250210_000005_create_stock_ledger;
mod m20250220_000006_create_purchase_orders;
mod m20250301_000007_create_password_reset_tokens;
mod m20250305_000008_enable_tenant_rls;

pub use m20250115_000002_create_organizations::DEFAULT_ORGANIZATION_ID;

/// Migrator for running database migrations.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250110_000001_create_users_and_pharmacies::Migration),
            Box::new(m20250115_000002_create_organizations::Migration),
            Box::new(m20250120_000003_create_role_pharmacies::Migration),
            Box::new(m20250201_000004_create_drugs_and_parties::Migration),
            Box::new(m20250210_000005_create_stock_ledger::Migration),
            Box::new(m20250220_000006_create_purchase_orders::Migration),
            Box::new(m20250301_000007_create_password_reset_tokens::Migration),
            Box::new(m20250305_000008_enable_tenant_rls::Migration),
        ]
    }
}
