//! Supplier repository.

use apotik_core::party::{PartyError, apply_balance_delta, normalize_code};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::entities::suppliers;
use crate::repositories::constraint::is_unique_violation;
use crate::rls::RlsExt;

/// Error types for supplier operations.
#[derive(Debug, thiserror::Error)]
pub enum SupplierError {
    /// Code already used in the organization.
    #[error("Supplier code '{0}' already exists")]
    DuplicateCode(String),

    /// Malformed code or a balance out of range.
    #[error(transparent)]
    Invalid(#[from] PartyError),

    /// Supplier not found in the organization.
    #[error("Supplier not found: {0}")]
    NotFound(Uuid),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Input for creating a supplier.
#[derive(Debug, Clone, Default)]
pub struct CreateSupplierInput {
    /// Required code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Contact person.
    pub contact_person: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// E-mail address.
    pub email: Option<String>,
    /// Address.
    pub address: Option<String>,
}

/// Supplier repository.
#[derive(Debug, Clone)]
pub struct SupplierRepository {
    db: DatabaseConnection,
}

impl SupplierRepository {
    /// Creates a new supplier repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a supplier with a zero balance.
    ///
    /// # Errors
    ///
    /// Returns an error for a missing, malformed or duplicate code.
    pub async fn create(
        &self,
        organization_id: Uuid,
        input: CreateSupplierInput,
    ) -> Result<suppliers::Model, SupplierError> {
        let code = normalize_code(&input.code)?;
        let now = chrono::Utc::now().into();

        let rls = self.db.with_rls(organization_id).await?;
        let supplier = suppliers::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            code: Set(code.clone()),
            name: Set(input.name.trim().to_string()),
            contact_person: Set(input.contact_person),
            phone: Set(input.phone),
            email: Set(input.email),
            address: Set(input.address),
            current_balance: Set(Decimal::ZERO),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(rls.transaction())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                SupplierError::DuplicateCode(code.clone())
            } else {
                SupplierError::Database(e)
            }
        })?;
        rls.commit().await?;
        Ok(supplier)
    }

    /// Lists suppliers by code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self, organization_id: Uuid) -> Result<Vec<suppliers::Model>, DbErr> {
        let rls = self.db.with_rls(organization_id).await?;
        let rows = suppliers::Entity::find()
            .filter(suppliers::Column::OrganizationId.eq(organization_id))
            .order_by_asc(suppliers::Column::Code)
            .all(rls.transaction())
            .await?;
        rls.commit().await?;
        Ok(rows)
    }

    /// Finds a supplier of the organization.
    ///
    /// # Errors
    ///
    /// Returns `SupplierError::NotFound` if it does not exist.
    pub async fn find(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<suppliers::Model, SupplierError> {
        let rls = self.db.with_rls(organization_id).await?;
        let supplier = suppliers::Entity::find_by_id(id)
            .filter(suppliers::Column::OrganizationId.eq(organization_id))
            .one(rls.transaction())
            .await?;
        rls.commit().await?;
        supplier.ok_or(SupplierError::NotFound(id))
    }

    /// Adds a signed delta to the supplier's payable.
    ///
    /// # Errors
    ///
    /// Returns `SupplierError::NotFound` if it does not exist.
    pub async fn adjust_balance(
        &self,
        organization_id: Uuid,
        id: Uuid,
        delta: Decimal,
    ) -> Result<suppliers::Model, SupplierError> {
        let rls = self.db.with_rls(organization_id).await?;
        let supplier = adjust_balance_in(rls.transaction(), organization_id, id, delta).await?;
        rls.commit().await?;
        Ok(supplier)
    }
}

/// Locks the supplier row and applies a balance delta inside an open
/// transaction.
pub(crate) async fn adjust_balance_in<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
    id: Uuid,
    delta: Decimal,
) -> Result<suppliers::Model, SupplierError> {
    let supplier = suppliers::Entity::find_by_id(id)
        .filter(suppliers::Column::OrganizationId.eq(organization_id))
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or(SupplierError::NotFound(id))?;

    let balance = apply_balance_delta(supplier.current_balance, delta)?;
    let mut active: suppliers::ActiveModel = supplier.into();
    active.current_balance = Set(balance);
    active.updated_at = Set(chrono::Utc::now().into());
    Ok(active.update(conn).await?)
}
