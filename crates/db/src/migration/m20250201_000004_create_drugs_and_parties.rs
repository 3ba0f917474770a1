//! Drug catalog, suppliers and customers.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(DRUGS_SQL).await?;
        db.execute_unprepared(SUPPLIERS_SQL).await?;
        db.execute_unprepared(CUSTOMERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const DRUGS_SQL: &str = r"
CREATE TABLE drugs (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id     UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    code                VARCHAR(50) NOT NULL,
    name                VARCHAR(255) NOT NULL,
    generic_name        VARCHAR(255),
    unit                VARCHAR(20) NOT NULL DEFAULT 'PCS',
    is_active           BOOLEAN NOT NULL DEFAULT true,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_drugs_org_code UNIQUE (organization_id, code)
);

CREATE INDEX idx_drugs_name ON drugs(organization_id, name);
";

const SUPPLIERS_SQL: &str = r"
CREATE TABLE suppliers (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id     UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    code                VARCHAR(50) NOT NULL,
    name                VARCHAR(255) NOT NULL,
    contact_person      VARCHAR(255),
    phone               VARCHAR(50),
    email               VARCHAR(255),
    address             TEXT,
    current_balance     NUMERIC(19, 4) NOT NULL DEFAULT 0,
    is_active           BOOLEAN NOT NULL DEFAULT true,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_suppliers_org_code UNIQUE (organization_id, code)
);
";

// Customer codes are optional; the partial index only constrains non-null codes.
const CUSTOMERS_SQL: &str = r"
CREATE TABLE customers (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id     UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    code                VARCHAR(50),
    name                VARCHAR(255) NOT NULL,
    phone               VARCHAR(50),
    email               VARCHAR(255),
    address             TEXT,
    current_balance     NUMERIC(19, 4) NOT NULL DEFAULT 0,
    is_active           BOOLEAN NOT NULL DEFAULT true,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE UNIQUE INDEX uq_customers_org_code
    ON customers(organization_id, code) WHERE code IS NOT NULL;
CREATE INDEX idx_customers_name ON customers(organization_id, name);
";

const DROP_SQL: &str = r"
DROP TABLE IF EXISTS customers;
DROP TABLE IF EXISTS suppliers;
DROP TABLE IF EXISTS drugs;
";
