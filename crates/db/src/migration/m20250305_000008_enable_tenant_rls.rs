//! Row-level security on every tenant table.
//!
//! RLS is forced so the policies also bind the table owner. `users`,
//! `organizations` and `password_reset_tokens` stay unrestricted: login,
//! registration and password reset resolve the tenant from them.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Tables holding an `organization_id` column.
const DIRECT_TABLES: [&str; 11] = [
    "pharmacies",
    "roles",
    "user_roles",
    "role_pharmacies",
    "drugs",
    "suppliers",
    "customers",
    "pharmacy_stock",
    "stock_movements",
    "purchase_orders",
    "purchase_order_items",
];

const TENANT_PREDICATE: &str =
    "NULLIF(current_setting('app.current_organization_id', true), '')::UUID";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(&enable_sql()).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(&disable_sql()).await?;
        Ok(())
    }
}

fn enable_sql() -> String {
    let mut sql = String::new();
    for table in DIRECT_TABLES {
        sql.push_str(&format!(
            "ALTER TABLE {table} ENABLE ROW LEVEL SECURITY;\n\
             ALTER TABLE {table} FORCE ROW LEVEL SECURITY;\n\
             CREATE POLICY tenant_isolation ON {table}\n    \
             USING (organization_id = {TENANT_PREDICATE});\n"
        ));
    }

    // role_permissions has no organization_id; it follows its role.
    sql.push_str(&format!(
        "ALTER TABLE role_permissions ENABLE ROW LEVEL SECURITY;\n\
         ALTER TABLE role_permissions FORCE ROW LEVEL SECURITY;\n\
         CREATE POLICY tenant_isolation ON role_permissions\n    \
         USING (role_id IN (SELECT id FROM roles WHERE organization_id = {TENANT_PREDICATE}));\n"
    ));
    sql
}

fn disable_sql() -> String {
    let mut sql = String::new();
    for table in DIRECT_TABLES.iter().chain(std::iter::once(&"role_permissions")) {
        sql.push_str(&format!(
            "DROP POLICY IF EXISTS tenant_isolation ON {table};\n\
             ALTER TABLE {table} NO FORCE ROW LEVEL SECURITY;\n\
             ALTER TABLE {table} DISABLE ROW LEVEL SECURITY;\n"
        ));
    }
    sql
}
