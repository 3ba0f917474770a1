//! Pharmacy repository.

use apotik_core::access::PharmacyScope;
use apotik_core::party::{PartyError, normalize_code};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::pharmacies;
use crate::repositories::constraint::{Violation, violation};
use crate::rls::RlsExt;

/// Error types for pharmacy operations.
#[derive(Debug, thiserror::Error)]
pub enum PharmacyError {
    /// Code already used in the organization.
    #[error("Pharmacy code '{0}' already exists")]
    DuplicateCode(String),

    /// The organization already has a main warehouse.
    #[error("Organization already has a main warehouse")]
    MainWarehouseExists,

    /// Malformed code.
    #[error(transparent)]
    InvalidCode(#[from] PartyError),

    /// Pharmacy not found in the organization.
    #[error("Pharmacy not found: {0}")]
    NotFound(Uuid),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Input for creating a pharmacy.
#[derive(Debug, Clone)]
pub struct CreatePharmacyInput {
    /// Code, unique within the organization.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Street address.
    pub address: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Whether this is the organization's main warehouse.
    pub is_main_warehouse: bool,
}

/// Pharmacy repository.
#[derive(Debug, Clone)]
pub struct PharmacyRepository {
    db: DatabaseConnection,
}

impl PharmacyRepository {
    /// Creates a new pharmacy repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a pharmacy.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed or duplicate code, a second main
    /// warehouse, or a database failure.
    pub async fn create(
        &self,
        organization_id: Uuid,
        input: CreatePharmacyInput,
    ) -> Result<pharmacies::Model, PharmacyError> {
        let code = normalize_code(&input.code)?;
        let now = chrono::Utc::now().into();

        let rls = self.db.with_rls(organization_id).await?;
        let pharmacy = pharmacies::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            code: Set(code.clone()),
            name: Set(input.name.trim().to_string()),
            address: Set(input.address),
            phone: Set(input.phone),
            is_main_warehouse: Set(input.is_main_warehouse),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(rls.transaction())
        .await
        .map_err(|e| match violation(&e) {
            Some(Violation::Unique(msg)) if msg.contains("main_warehouse") => {
                PharmacyError::MainWarehouseExists
            }
            Some(Violation::Unique(_)) => PharmacyError::DuplicateCode(code.clone()),
            _ => PharmacyError::Database(e),
        })?;
        rls.commit().await?;

        tracing::info!(org_id = %organization_id, pharmacy_id = %pharmacy.id, code = %pharmacy.code, "Pharmacy created");
        Ok(pharmacy)
    }

    /// Lists the pharmacies of an organization within a scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(
        &self,
        organization_id: Uuid,
        scope: &PharmacyScope,
    ) -> Result<Vec<pharmacies::Model>, DbErr> {
        let mut query = pharmacies::Entity::find()
            .filter(pharmacies::Column::OrganizationId.eq(organization_id))
            .order_by_asc(pharmacies::Column::Code);

        if let PharmacyScope::Only(ids) = scope {
            query = query.filter(pharmacies::Column::Id.is_in(ids.iter().copied()));
        }

        let rls = self.db.with_rls(organization_id).await?;
        let rows = query.all(rls.transaction()).await?;
        rls.commit().await?;
        Ok(rows)
    }

    /// Finds a pharmacy of the organization.
    ///
    /// # Errors
    ///
    /// Returns `PharmacyError::NotFound` if it does not exist in the
    /// organization.
    pub async fn find(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<pharmacies::Model, PharmacyError> {
        let rls = self.db.with_rls(organization_id).await?;
        let pharmacy = pharmacies::Entity::find_by_id(id)
            .filter(pharmacies::Column::OrganizationId.eq(organization_id))
            .one(rls.transaction())
            .await?;
        rls.commit().await?;
        pharmacy.ok_or(PharmacyError::NotFound(id))
    }
}
