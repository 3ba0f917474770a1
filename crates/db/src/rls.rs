//! Row-Level Security (RLS) tenant context.
//!
//! Every tenant table carries an `organization_id` and a policy comparing it
//! with the `app.current_organization_id` setting. Repositories open an
//! [`RlsConnection`] for the organization they act on; the setting lives
//! for one transaction only (`SET LOCAL`).
//!
//! # Usage
//!
//! ```ignore
//! use apotik_db::rls::RlsExt;
//!
//! let rls = db.with_rls(organization_id).await?;
//! let drugs = drugs::Entity::find().all(rls.transaction()).await?;
//! rls.commit().await?;
//! ```

use sea_orm::{ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait};
use uuid::Uuid;

/// A transaction scoped to one organization.
pub struct RlsConnection {
    txn: DatabaseTransaction,
    organization_id: Uuid,
}

impl RlsConnection {
    /// Begins a transaction and sets the tenant context.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started or the setting
    /// cannot be applied.
    pub async fn new(db: &DatabaseConnection, organization_id: Uuid) -> Result<Self, DbErr> {
        let txn = db.begin().await?;
        set_rls_context(&txn, organization_id).await?;
        Ok(Self {
            txn,
            organization_id,
        })
    }

    /// The transaction all tenant queries must run on.
    #[must_use]
    pub fn transaction(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Organization this connection is scoped to.
    #[must_use]
    pub const fn organization_id(&self) -> Uuid {
        self.organization_id
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub async fn commit(self) -> Result<(), DbErr> {
        self.txn.commit().await
    }

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub async fn rollback(self) -> Result<(), DbErr> {
        self.txn.rollback().await
    }
}

/// Extension trait for opening tenant-scoped transactions.
#[async_trait::async_trait]
pub trait RlsExt {
    /// Opens an [`RlsConnection`] for `organization_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be created.
    async fn with_rls(&self, organization_id: Uuid) -> Result<RlsConnection, DbErr>;
}

#[async_trait::async_trait]
impl RlsExt for DatabaseConnection {
    async fn with_rls(&self, organization_id: Uuid) -> Result<RlsConnection, DbErr> {
        RlsConnection::new(self, organization_id).await
    }
}

fn context_sql(organization_id: Uuid) -> String {
    // A Uuid renders as hex and dashes only, so inlining it is safe.
    format!("SET LOCAL app.current_organization_id = '{organization_id}'")
}

/// Sets the tenant context on an existing transaction.
///
/// # Errors
///
/// Returns an error if the setting cannot be applied.
pub async fn set_rls_context(
    txn: &DatabaseTransaction,
    organization_id: Uuid,
) -> Result<(), DbErr> {
    txn.execute_unprepared(&context_sql(organization_id)).await?;
    Ok(())
}
