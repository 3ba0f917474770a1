//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Repository abstractions for data access
//! - Database migrations
//! - Row-level security tenant context

pub mod entities;
pub mod migration;
pub mod repositories;
pub mod rls;

pub use migration::{DEFAULT_ORGANIZATION_ID, Migrator};
pub use repositories::{
    CustomerRepository, DrugRepository, OrganizationRepository, PasswordResetRepository,
    PharmacyRepository, PurchaseOrderRepository, RoleRepository, StockRepository,
    SupplierRepository, UserRepository,
};
pub use rls::{RlsConnection, RlsExt};

use std::time::Duration;

use apotik_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a pooled connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options).await
}
