//! Customer repository.
//!
//! Codes are optional; a blank code is stored as NULL.

use apotik_core::party::{PartyError, apply_balance_delta, normalize_optional_code};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::entities::customers;
use crate::repositories::constraint::is_unique_violation;
use crate::rls::RlsExt;

/// Error types for customer operations.
#[derive(Debug, thiserror::Error)]
pub enum CustomerError {
    /// Code already used in the organization.
    #[error("Customer code '{0}' already exists")]
    DuplicateCode(String),

    /// Malformed code or a balance out of range.
    #[error(transparent)]
    Invalid(#[from] PartyError),

    /// Customer not found in the organization.
    #[error("Customer not found: {0}")]
    NotFound(Uuid),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Input for creating a customer.
#[derive(Debug, Clone, Default)]
pub struct CreateCustomerInput {
    /// Optional code.
    pub code: Option<String>,
    /// Display name.
    pub name: String,
    /// Phone number.
    pub phone: Option<String>,
    /// E-mail address.
    pub email: Option<String>,
    /// Address.
    pub address: Option<String>,
}

/// Customer repository.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    db: DatabaseConnection,
}

impl CustomerRepository {
    /// Creates a new customer repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a customer with a zero balance.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed or duplicate code.
    pub async fn create(
        &self,
        organization_id: Uuid,
        input: CreateCustomerInput,
    ) -> Result<customers::Model, CustomerError> {
        let code = normalize_optional_code(input.code.as_deref())?;
        let now = chrono::Utc::now().into();

        let rls = self.db.with_rls(organization_id).await?;
        let customer = customers::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            code: Set(code.clone()),
            name: Set(input.name.trim().to_string()),
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
                CustomerError::DuplicateCode(code.clone().unwrap_or_default())
            } else {
                CustomerError::Database(e)
            }
        })?;
        rls.commit().await?;
        Ok(customer)
    }

    /// Lists customers by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self, organization_id: Uuid) -> Result<Vec<customers::Model>, DbErr> {
        let rls = self.db.with_rls(organization_id).await?;
        let rows = customers::Entity::find()
            .filter(customers::Column::OrganizationId.eq(organization_id))
            .order_by_asc(customers::Column::Name)
            .all(rls.transaction())
            .await?;
        rls.commit().await?;
        Ok(rows)
    }

    /// Finds a customer of the organization.
    ///
    /// # Errors
    ///
    /// Returns `CustomerError::NotFound` if it does not exist.
    pub async fn find(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<customers::Model, CustomerError> {
        let rls = self.db.with_rls(organization_id).await?;
        let customer = customers::Entity::find_by_id(id)
            .filter(customers::Column::OrganizationId.eq(organization_id))
            .one(rls.transaction())
            .await?;
        rls.commit().await?;
        customer.ok_or(CustomerError::NotFound(id))
    }

    /// Adds a signed delta to the customer's receivable.
    ///
    /// # Errors
    ///
    /// Returns `CustomerError::NotFound` if it does not exist.
    pub async fn adjust_balance(
        &self,
        organization_id: Uuid,
        id: Uuid,
        delta: Decimal,
    ) -> Result<customers::Model, CustomerError> {
        let rls = self.db.with_rls(organization_id).await?;
        let customer = customers::Entity::find_by_id(id)
            .filter(customers::Column::OrganizationId.eq(organization_id))
            .lock_exclusive()
            .one(rls.transaction())
            .await?
            .ok_or(CustomerError::NotFound(id))?;

        let balance = apply_balance_delta(customer.current_balance, delta)?;
        let mut active: customers::ActiveModel = customer.into();
        active.current_balance = Set(balance);
        active.updated_at = Set(chrono::Utc::now().into());
        let customer = active.update(rls.transaction()).await?;
        rls.commit().await?;
        Ok(customer)
    }
}
