//! Role to pharmacy scoping.
//!
//! A role without rows here applies to every pharmacy of its organization.
//! The composite foreign keys pin both sides to the same organization.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(ROLE_PHARMACIES_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS role_pharmacies;")
            .await?;
        Ok(())
    }
}

const ROLE_PHARMACIES_SQL: &str = r"
CREATE TABLE role_pharmacies (
    role_id             UUID NOT NULL,
    pharmacy_id         UUID NOT NULL,
    organization_id     UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    PRIMARY KEY (role_id, pharmacy_id),
    CONSTRAINT fk_role_pharmacies_role
        FOREIGN KEY (role_id, organization_id)
        REFERENCES roles(id, organization_id) ON DELETE CASCADE,
    CONSTRAINT fk_role_pharmacies_pharmacy
        FOREIGN KEY (pharmacy_id, organization_id)
        REFERENCES pharmacies(id, organization_id) ON DELETE CASCADE
);

CREATE INDEX idx_role_pharmacies_pharmacy ON role_pharmacies(pharmacy_id);
";
