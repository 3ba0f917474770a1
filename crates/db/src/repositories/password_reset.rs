//! Password reset tokens.
//!
//! Only the SHA-256 of a token is stored. Issuing a token marks every
//! older unused token of the user as used, so at most one is live.

use apotik_core::auth::{OpaqueToken, generate_token, hash_token};
use apotik_shared::email::PASSWORD_RESET_TTL_MINUTES;
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    TransactionTrait, sea_query::Expr,
};
use uuid::Uuid;

use crate::entities::{password_reset_tokens, users};

/// Error types for password reset.
#[derive(Debug, thiserror::Error)]
pub enum PasswordResetError {
    /// Unknown token.
    #[error("Invalid or expired reset token")]
    InvalidToken,

    /// Token past its lifetime.
    #[error("Reset token has expired")]
    Expired,

    /// Token already consumed or superseded.
    #[error("Reset token has already been used")]
    AlreadyUsed,

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Password reset repository.
#[derive(Debug, Clone)]
pub struct PasswordResetRepository {
    db: DatabaseConnection,
}

impl PasswordResetRepository {
    /// Creates a new password reset repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Issues a token for a user, superseding older ones.
    ///
    /// Returns the raw token; only its hash is persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub async fn issue(&self, user_id: Uuid) -> Result<OpaqueToken, DbErr> {
        let token = generate_token();
        let now = Utc::now();
        let txn = self.db.begin().await?;

        password_reset_tokens::Entity::update_many()
            .col_expr(password_reset_tokens::Column::UsedAt, Expr::value(now))
            .filter(password_reset_tokens::Column::UserId.eq(user_id))
            .filter(password_reset_tokens::Column::UsedAt.is_null())
            .exec(&txn)
            .await?;

        password_reset_tokens::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            token_hash: Set(token.hash.clone()),
            expires_at: Set((now + Duration::minutes(PASSWORD_RESET_TTL_MINUTES)).into()),
            used_at: Set(None),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(token)
    }

    /// Consumes a token and stores the new password hash.
    ///
    /// Returns the user whose password changed.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown, expired or used token.
    pub async fn reset_password(
        &self,
        raw_token: &str,
        password_hash: &str,
    ) -> Result<Uuid, PasswordResetError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let token = password_reset_tokens::Entity::find()
            .filter(password_reset_tokens::Column::TokenHash.eq(hash_token(raw_token)))
            .one(&txn)
            .await?
            .ok_or(PasswordResetError::InvalidToken)?;

        if token.used_at.is_some() {
            return Err(PasswordResetError::AlreadyUsed);
        }
        if token.expires_at.with_timezone(&Utc) <= now {
            return Err(PasswordResetError::Expired);
        }

        // Conditional update so two concurrent resets cannot both succeed.
        let consumed = password_reset_tokens::Entity::update_many()
            .col_expr(password_reset_tokens::Column::UsedAt, Expr::value(now))
            .filter(password_reset_tokens::Column::Id.eq(token.id))
            .filter(password_reset_tokens::Column::UsedAt.is_null())
            .exec(&txn)
            .await?;
        if consumed.rows_affected == 0 {
            return Err(PasswordResetError::AlreadyUsed);
        }

        let user = users::Entity::find_by_id(token.user_id)
            .one(&txn)
            .await?
            .ok_or(PasswordResetError::InvalidToken)?;
        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(password_hash.to_string());
        active.updated_at = Set(now.into());
        active.update(&txn).await?;

        txn.commit().await?;
        Ok(token.user_id)
    }
}
