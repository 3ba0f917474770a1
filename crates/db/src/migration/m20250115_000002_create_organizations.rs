//! Multi-tenancy retrofit.
//!
//! Creates `organizations`, moves every pre-existing user, pharmacy and role
//! into a default organization and replaces global uniqueness with
//! per-organization uniqueness.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// ID of the organization that owns rows created before multi-tenancy.
pub const DEFAULT_ORGANIZATION_ID: &str = "00000000-0000-0000-0000-000000000001";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(ORGANIZATIONS_SQL).await?;
        db.execute_unprepared(&default_organization_sql()).await?;
        db.execute_unprepared(&backfill_sql()).await?;
        db.execute_unprepared(TENANT_CONSTRAINTS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DOWN_SQL).await?;
        Ok(())
    }
}

const ORGANIZATIONS_SQL: &str = r"
CREATE TABLE organizations (
    id                          UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name                        VARCHAR(255) NOT NULL,
    code                        VARCHAR(50) NOT NULL,
    token                       VARCHAR(64) NOT NULL,
    is_active                   BOOLEAN NOT NULL DEFAULT true,
    owner_id                    UUID REFERENCES users(id) ON DELETE SET NULL,
    timezone                    VARCHAR(50) NOT NULL DEFAULT 'UTC',
    fiscal_year_start_month     SMALLINT NOT NULL DEFAULT 1,
    created_at                  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at                  TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_organizations_code UNIQUE (code),
    CONSTRAINT uq_organizations_token UNIQUE (token),
    CONSTRAINT chk_organizations_fiscal_start
        CHECK (fiscal_year_start_month BETWEEN 1 AND 12)
);
";

fn default_organization_sql() -> String {
    format!(
        r"
INSERT INTO organizations (id, name, code, token)
VALUES (
    '{DEFAULT_ORGANIZATION_ID}',
    'Default Organization',
    'DEFAULT',
    replace(gen_random_uuid()::text, '-', '')
)
ON CONFLICT (id) DO NOTHING;
"
    )
}

fn backfill_sql() -> String {
    format!(
        r"
ALTER TABLE users ADD COLUMN organization_id UUID;
ALTER TABLE pharmacies ADD COLUMN organization_id UUID;
ALTER TABLE roles ADD COLUMN organization_id UUID;
ALTER TABLE user_roles ADD COLUMN organization_id UUID;

UPDATE users SET organization_id = '{DEFAULT_ORGANIZATION_ID}' WHERE organization_id IS NULL;
UPDATE pharmacies SET organization_id = '{DEFAULT_ORGANIZATION_ID}' WHERE organization_id IS NULL;
UPDATE roles SET organization_id = '{DEFAULT_ORGANIZATION_ID}' WHERE organization_id IS NULL;
UPDATE user_roles ur SET organization_id = r.organization_id
    FROM roles r WHERE r.id = ur.role_id AND ur.organization_id IS NULL;

ALTER TABLE users ALTER COLUMN organization_id SET NOT NULL;
ALTER TABLE pharmacies ALTER COLUMN organization_id SET NOT NULL;
ALTER TABLE roles ALTER COLUMN organization_id SET NOT NULL;
ALTER TABLE user_roles ALTER COLUMN organization_id SET NOT NULL;
"
    )
}

const TENANT_CONSTRAINTS_SQL: &str = r"
ALTER TABLE users
    ADD CONSTRAINT fk_users_organization
        FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE,
    ADD CONSTRAINT uq_users_id_organization UNIQUE (id, organization_id);

ALTER TABLE pharmacies
    DROP CONSTRAINT IF EXISTS uq_pharmacies_code,
    ADD CONSTRAINT fk_pharmacies_organization
        FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE,
    ADD CONSTRAINT uq_pharmacies_org_code UNIQUE (organization_id, code),
    ADD CONSTRAINT uq_pharmacies_id_organization UNIQUE (id, organization_id);

CREATE UNIQUE INDEX uq_pharmacies_main_warehouse
    ON pharmacies(organization_id) WHERE is_main_warehouse;

ALTER TABLE roles
    DROP CONSTRAINT IF EXISTS uq_roles_name,
    ADD CONSTRAINT fk_roles_organization
        FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE,
    ADD CONSTRAINT uq_roles_org_name UNIQUE (organization_id, name),
    ADD CONSTRAINT uq_roles_id_organization UNIQUE (id, organization_id);

-- A user can only hold roles of their own organization.
ALTER TABLE user_roles
    ADD CONSTRAINT fk_user_roles_user_org
        FOREIGN KEY (user_id, organization_id)
        REFERENCES users(id, organization_id) ON DELETE CASCADE,
    ADD CONSTRAINT fk_user_roles_role_org
        FOREIGN KEY (role_id, organization_id)
        REFERENCES roles(id, organization_id) ON DELETE CASCADE;

CREATE INDEX idx_users_organization ON users(organization_id);
CREATE INDEX idx_pharmacies_organization ON pharmacies(organization_id);
CREATE INDEX idx_roles_organization ON roles(organization_id);
";

const DOWN_SQL: &str = r"
ALTER TABLE user_roles
    DROP CONSTRAINT IF EXISTS fk_user_roles_user_org,
    DROP CONSTRAINT IF EXISTS fk_user_roles_role_org,
    DROP COLUMN IF EXISTS organization_id;

DROP INDEX IF EXISTS idx_roles_organization;
ALTER TABLE roles
    DROP CONSTRAINT IF EXISTS uq_roles_id_organization,
    DROP CONSTRAINT IF EXISTS uq_roles_org_name,
    DROP CONSTRAINT IF EXISTS fk_roles_organization,
    DROP COLUMN IF EXISTS organization_id,
    ADD CONSTRAINT uq_roles_name UNIQUE (name);

DROP INDEX IF EXISTS uq_pharmacies_main_warehouse;
DROP INDEX IF EXISTS idx_pharmacies_organization;
ALTER TABLE pharmacies
    DROP CONSTRAINT IF EXISTS uq_pharmacies_id_organization,
    DROP CONSTRAINT IF EXISTS uq_pharmacies_org_code,
    DROP CONSTRAINT IF EXISTS fk_pharmacies_organization,
    DROP COLUMN IF EXISTS organization_id,
    ADD CONSTRAINT uq_pharmacies_code UNIQUE (code);

DROP INDEX IF EXISTS idx_users_organization;
ALTER TABLE users
    DROP CONSTRAINT IF EXISTS uq_users_id_organization,
    DROP CONSTRAINT IF EXISTS fk_users_organization,
    DROP COLUMN IF EXISTS organization_id;

DROP TABLE IF EXISTS organizations;
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backfill_targets_default_organization() {
        let sql = backfill_sql();
        assert_eq!(sql.matches(DEFAULT_ORGANIZATION_ID).count(), 3);
        assert!(default_organization_sql().contains("ON CONFLICT (id) DO NOTHING"));
    }
}
