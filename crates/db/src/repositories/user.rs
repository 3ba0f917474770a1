//! User repository for database operations.
//!
//! `users` is not row-level secured: login and password reset look users up
//! by e-mail before the tenant is known. Listing is filtered explicitly.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::{organizations, users};
use crate::repositories::constraint::is_unique_violation;

/// Error types for user operations.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    /// E-mail already registered.
    #[error("Email '{0}' is already registered")]
    DuplicateEmail(String),

    /// User not found.
    #[error("User not found: {0}")]
    NotFound(Uuid),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    /// Home organization.
    pub organization_id: Uuid,
    /// Login e-mail; stored lower-cased.
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Display name.
    pub full_name: String,
    /// Platform-wide administrator.
    pub is_platform_admin: bool,
}

/// Normalizes an e-mail for storage and lookup.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// User repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    /// Creates a new user repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a user by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::Email.eq(normalize_email(email)))
            .one(&self.db)
            .await
    }

    /// Finds a user together with their organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_with_organization(
        &self,
        email: &str,
    ) -> Result<Option<(users::Model, organizations::Model)>, DbErr> {
        let found = users::Entity::find()
            .filter(users::Column::Email.eq(normalize_email(email)))
            .find_also_related(organizations::Entity)
            .one(&self.db)
            .await?;
        Ok(found.and_then(|(user, org)| org.map(|org| (user, org))))
    }

    /// Finds a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find_by_id(id).one(&self.db).await
    }

    /// Lists the users of an organization by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::OrganizationId.eq(organization_id))
            .order_by_asc(users::Column::FullName)
            .all(&self.db)
            .await
    }

    /// Creates a new user.
    ///
    /// # Errors
    ///
    /// Returns `UserError::DuplicateEmail` if the e-mail is taken.
    pub async fn create(&self, input: CreateUserInput) -> Result<users::Model, UserError> {
        let email = normalize_email(&input.email);
        let now = chrono::Utc::now().into();
        let user = users::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(input.organization_id),
            email: Set(email.clone()),
            password_hash: Set(input.password_hash),
            full_name: Set(input.full_name.trim().to_string()),
            is_active: Set(true),
            is_platform_admin: Set(input.is_platform_admin),
            created_at: Set(now),
            updated_at: Set(now),
        };

        user.insert(&self.db).await.map_err(|e| {
            if is_unique_violation(&e) {
                UserError::DuplicateEmail(email)
            } else {
                UserError::Database(e)
            }
        })
    }

    /// Replaces a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `UserError::NotFound` if the user does not exist.
    pub async fn update_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), UserError> {
        let user = self
            .find_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound(user_id))?;

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(password_hash.to_string());
        active.updated_at = Set(chrono::Utc::now().into());
        active.update(&self.db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Admin@Apotik.ID "), "admin@apotik.id");
    }
}
