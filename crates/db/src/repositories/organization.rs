//! Organization repository.
//!
//! Organizations are the tenant root and are not themselves row-level
//! secured; there is no HTTP endpoint creating them.

use apotik_core::auth::generate_token;
use apotik_core::fiscal::{FiscalCalendar, FiscalError};
use apotik_core::party::{PartyError, normalize_code};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set,
};
use uuid::Uuid;

use crate::entities::organizations;
use crate::repositories::constraint::is_unique_violation;

/// Error types for organization operations.
#[derive(Debug, thiserror::Error)]
pub enum OrganizationError {
    /// Organization code already exists.
    #[error("Organization code '{0}' already exists")]
    DuplicateCode(String),

    /// Malformed code.
    #[error(transparent)]
    InvalidCode(#[from] PartyError),

    /// Unknown time zone or fiscal start month.
    #[error(transparent)]
    Fiscal(#[from] FiscalError),

    /// Organization not found.
    #[error("Organization not found: {0}")]
    NotFound(Uuid),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Input for creating an organization.
#[derive(Debug, Clone)]
pub struct CreateOrganizationInput {
    /// Display name.
    pub name: String,
    /// Unique code.
    pub code: String,
    /// IANA time zone used for fiscal periods.
    pub timezone: String,
    /// First month of the fiscal year (1-12).
    pub fiscal_year_start_month: i16,
}

/// Organization repository.
#[derive(Debug, Clone)]
pub struct OrganizationRepository {
    db: DatabaseConnection,
}

impl OrganizationRepository {
    /// Creates a new organization repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds an organization by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<organizations::Model>, DbErr> {
        organizations::Entity::find_by_id(id).one(&self.db).await
    }

    /// Finds an active organization by its registration token.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_token(&self, token: &str) -> Result<Option<organizations::Model>, DbErr> {
        organizations::Entity::find()
            .filter(organizations::Column::Token.eq(token.trim()))
            .filter(organizations::Column::IsActive.eq(true))
            .one(&self.db)
            .await
    }

    /// Creates an organization with a fresh registration token.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed or duplicate code, an unknown time
    /// zone or start month, or a database failure.
    pub async fn create(
        &self,
        input: CreateOrganizationInput,
    ) -> Result<organizations::Model, OrganizationError> {
        let code = normalize_code(&input.code)?;
        FiscalCalendar::new(&input.timezone, i32::from(input.fiscal_year_start_month))?;

        let now = chrono::Utc::now().into();
        let org = organizations::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            code: Set(code.clone()),
            token: Set(generate_token().raw),
            is_active: Set(true),
            owner_id: Set(None),
            timezone: Set(input.timezone),
            fiscal_year_start_month: Set(input.fiscal_year_start_month),
            created_at: Set(now),
            updated_at: Set(now),
        };

        org.insert(&self.db).await.map_err(|e| {
            if is_unique_violation(&e) {
                OrganizationError::DuplicateCode(code)
            } else {
                OrganizationError::Database(e)
            }
        })
    }

    /// Makes a user the owner of an organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the organization does not exist or the update fails.
    pub async fn set_owner(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<organizations::Model, OrganizationError> {
        let org = self
            .find_by_id(organization_id)
            .await?
            .ok_or(OrganizationError::NotFound(organization_id))?;

        let mut active: organizations::ActiveModel = org.into();
        active.owner_id = Set(Some(user_id));
        active.updated_at = Set(chrono::Utc::now().into());
        Ok(active.update(&self.db).await?)
    }

    /// Fiscal calendar of an organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the organization does not exist or its settings
    /// are invalid.
    pub async fn fiscal_calendar(
        &self,
        organization_id: Uuid,
    ) -> Result<FiscalCalendar, OrganizationError> {
        fiscal_calendar(&self.db, organization_id).await
    }
}

/// Loads the fiscal calendar of an organization on any connection.
pub(crate) async fn fiscal_calendar<C: ConnectionTrait>(
    conn: &C,
    organization_id: Uuid,
) -> Result<FiscalCalendar, OrganizationError> {
    let org = organizations::Entity::find_by_id(organization_id)
        .one(conn)
        .await?
        .ok_or(OrganizationError::NotFound(organization_id))?;
    Ok(FiscalCalendar::new(
        &org.timezone,
        i32::from(org.fiscal_year_start_month),
    )?)
}
