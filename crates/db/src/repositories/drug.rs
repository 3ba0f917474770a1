//! Drug catalog repository.

use apotik_core::party::{PartyError, normalize_code};
use apotik_shared::types::PageRequest;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::{Expr, extension::postgres::PgExpr},
};
use uuid::Uuid;

use crate::entities::drugs;
use crate::repositories::constraint::is_unique_violation;
use crate::rls::RlsExt;

/// Default stock unit.
pub const DEFAULT_UNIT: &str = "PCS";

/// Error types for drug operations.
#[derive(Debug, thiserror::Error)]
pub enum DrugError {
    /// Code already used in the organization.
    #[error("Drug code '{0}' already exists")]
    DuplicateCode(String),

    /// Malformed code.
    #[error(transparent)]
    InvalidCode(#[from] PartyError),

    /// Drug not found in the organization.
    #[error("Drug not found: {0}")]
    NotFound(Uuid),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Input for creating a drug.
#[derive(Debug, Clone)]
pub struct CreateDrugInput {
    /// Code, unique within the organization.
    pub code: String,
    /// Brand or trade name.
    pub name: String,
    /// Generic (INN) name.
    pub generic_name: Option<String>,
    /// Stock unit of measure; defaults to `PCS`.
    pub unit: Option<String>,
}

/// Drug repository.
#[derive(Debug, Clone)]
pub struct DrugRepository {
    db: DatabaseConnection,
}

impl DrugRepository {
    /// Creates a new drug repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a drug.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed or duplicate code or a database failure.
    pub async fn create(
        &self,
        organization_id: Uuid,
        input: CreateDrugInput,
    ) -> Result<drugs::Model, DrugError> {
        let code = normalize_code(&input.code)?;
        let unit = input
            .unit
            .map(|u| u.trim().to_uppercase())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_UNIT.to_string());
        let now = chrono::Utc::now().into();

        let rls = self.db.with_rls(organization_id).await?;
        let drug = drugs::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            code: Set(code.clone()),
            name: Set(input.name.trim().to_string()),
            generic_name: Set(input.generic_name),
            unit: Set(unit),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(rls.transaction())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DrugError::DuplicateCode(code.clone())
            } else {
                DrugError::Database(e)
            }
        })?;
        rls.commit().await?;
        Ok(drug)
    }

    /// Lists drugs, optionally filtered by a name or code fragment.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(
        &self,
        organization_id: Uuid,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<(Vec<drugs::Model>, u64), DbErr> {
        let page = page.normalized();
        let mut query = drugs::Entity::find()
            .filter(drugs::Column::OrganizationId.eq(organization_id))
            .order_by_asc(drugs::Column::Name);

        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{term}%");
            query = query.filter(
                Condition::any()
                    .add(Expr::col(drugs::Column::Name).ilike(pattern.as_str()))
                    .add(Expr::col(drugs::Column::GenericName).ilike(pattern.as_str()))
                    .add(Expr::col(drugs::Column::Code).ilike(pattern.as_str())),
            );
        }

        let rls = self.db.with_rls(organization_id).await?;
        let total = query.clone().count(rls.transaction()).await?;
        let rows = query
            .offset(page.offset())
            .limit(page.limit())
            .all(rls.transaction())
            .await?;
        rls.commit().await?;
        Ok((rows, total))
    }

    /// Finds a drug of the organization.
    ///
    /// # Errors
    ///
    /// Returns `DrugError::NotFound` if it does not exist in the organization.
    pub async fn find(&self, organization_id: Uuid, id: Uuid) -> Result<drugs::Model, DrugError> {
        let rls = self.db.with_rls(organization_id).await?;
        let drug = drugs::Entity::find_by_id(id)
            .filter(drugs::Column::OrganizationId.eq(organization_id))
            .one(rls.transaction())
            .await?;
        rls.commit().await?;
        drug.ok_or(DrugError::NotFound(id))
    }
}
