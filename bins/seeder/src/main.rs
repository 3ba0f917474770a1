//! Database seeder for Apotik development and testing.
//!
//! Seeds the default organization created by the migrations with an owner
//! account, two pharmacies, a pharmacist role, a supplier and a few drugs
//! with opening stock. Running it twice leaves the data unchanged.
//!
//! Usage: cargo run --bin seeder

use std::str::FromStr;

use anyhow::Context;
use chrono::{Months, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use apotik_core::access::PharmacyScope;
use apotik_core::auth::hash_password;
use apotik_core::permission::Permission;
use apotik_core::stock::MovementKind;
use apotik_db::{
    DEFAULT_ORGANIZATION_ID, DrugRepository, OrganizationRepository, PharmacyRepository,
    RoleRepository, StockRepository, SupplierRepository, UserRepository,
    repositories::{
        CreateDrugInput, CreatePharmacyInput, CreateRoleInput, CreateSupplierInput,
        CreateUserInput, DrugError, PharmacyError, PostMovementInput, RoleError, SupplierError,
    },
};
use apotik_shared::config::DatabaseConfig;

const ADMIN_EMAIL: &str = "admin@apotik.local";
const MAIN_WAREHOUSE_CODE: &str = "MAIN";

/// (code, name, generic name, unit, cost, selling price, opening quantity)
const DRUGS: [(&str, &str, &str, &str, &str, &str, i64); 4] = [
    ("PCT500", "Paracetamol 500 mg", "Paracetamol", "TAB", "250", "400", 1000),
    ("AMX500", "Amoxicillin 500 mg", "Amoxicillin", "CAP", "900", "1500", 500),
    ("OBH100", "OBH Syrup 100 ml", "Guaifenesin", "BTL", "12000", "18500", 60),
    ("VITC50", "Vitamin C 50 mg", "Ascorbic acid", "TAB", "100", "200", 2000),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set in environment")?;

    println!("Connecting to database...");
    let db = apotik_db::connect(&DatabaseConfig {
        url: database_url,
        max_connections: 2,
        min_connections: 1,
    })
    .await
    .context("Failed to connect to database")?;

    let org_id = Uuid::parse_str(DEFAULT_ORGANIZATION_ID)?;

    println!("Seeding owner account...");
    let owner_id = seed_owner(&db, org_id).await?;

    println!("Seeding pharmacies...");
    let main_id = seed_pharmacies(&db, org_id).await?;

    println!("Seeding pharmacist role...");
    seed_role(&db, org_id).await?;

    println!("Seeding supplier...");
    seed_supplier(&db, org_id).await?;

    println!("Seeding drugs and opening stock...");
    seed_drugs(&db, org_id, main_id, owner_id).await?;

    println!("Seeding complete!");
    Ok(())
}

/// Creates the owner account unless it exists and returns its id.
async fn seed_owner(db: &DatabaseConnection, org_id: Uuid) -> anyhow::Result<Uuid> {
    let users = UserRepository::new(db.clone());
    if let Some(user) = users.find_by_email(ADMIN_EMAIL).await? {
        println!("  Owner already exists, skipping...");
        return Ok(user.id);
    }

    let password =
        std::env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "apotik-admin".to_string());
    let user = users
        .create(CreateUserInput {
            organization_id: org_id,
            email: ADMIN_EMAIL.to_string(),
            password_hash: hash_password(&password)?,
            full_name: "Apotik Admin".to_string(),
            is_platform_admin: false,
        })
        .await?;
    OrganizationRepository::new(db.clone())
        .set_owner(org_id, user.id)
        .await?;

    println!("  Created owner: {ADMIN_EMAIL}");
    Ok(user.id)
}

/// Creates the main warehouse and one branch; returns the warehouse id.
async fn seed_pharmacies(db: &DatabaseConnection, org_id: Uuid) -> anyhow::Result<Uuid> {
    let repo = PharmacyRepository::new(db.clone());
    let pharmacies = [
        (MAIN_WAREHOUSE_CODE, "Main Warehouse", true),
        ("BR01", "Branch 01", false),
    ];

    for (code, name, is_main_warehouse) in pharmacies {
        let input = CreatePharmacyInput {
            code: code.to_string(),
            name: name.to_string(),
            address: None,
            phone: None,
            is_main_warehouse,
        };
        match repo.create(org_id, input).await {
            Ok(_) => println!("  Created pharmacy {code}"),
            Err(PharmacyError::DuplicateCode(_) | PharmacyError::MainWarehouseExists) => {
                println!("  Pharmacy {code} already exists, skipping...");
            }
            Err(e) => return Err(e.into()),
        }
    }

    repo.list(org_id, &PharmacyScope::All)
        .await?
        .into_iter()
        .find(|p| p.code == MAIN_WAREHOUSE_CODE)
        .map(|p| p.id)
        .context("Main warehouse is missing")
}

async fn seed_role(db: &DatabaseConnection, org_id: Uuid) -> anyhow::Result<()> {
    let input = CreateRoleInput {
        name: "Pharmacist".to_string(),
        description: Some("Dispensing and stock handling".to_string()),
        permissions: vec![
            Permission::DrugRead,
            Permission::InventoryRead,
            Permission::InventoryAdjust,
            Permission::InventoryTransfer,
            Permission::SalesInvoiceCreate,
            Permission::PurchaseOrderRead,
            Permission::PurchaseReceiptCreate,
        ],
        pharmacy_ids: Vec::new(),
    };
    match RoleRepository::new(db.clone()).create(org_id, input).await {
        Ok(_) => println!("  Created role Pharmacist"),
        Err(RoleError::DuplicateName(_)) => println!("  Role already exists, skipping..."),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn seed_supplier(db: &DatabaseConnection, org_id: Uuid) -> anyhow::Result<()> {
    let input = CreateSupplierInput {
        code: "PBF-001".to_string(),
        name: "PT Sumber Farma".to_string(),
        contact_person: Some("Budi".to_string()),
        phone: None,
        email: Some("orders@sumberfarma.example".to_string()),
        address: None,
    };
    match SupplierRepository::new(db.clone()).create(org_id, input).await {
        Ok(_) => println!("  Created supplier PBF-001"),
        Err(SupplierError::DuplicateCode(_)) => println!("  Supplier already exists, skipping..."),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Creates the sample drugs; a newly created drug gets one opening batch
/// in the main warehouse.
async fn seed_drugs(
    db: &DatabaseConnection,
    org_id: Uuid,
    main_id: Uuid,
    owner_id: Uuid,
) -> anyhow::Result<()> {
    let drugs = DrugRepository::new(db.clone());
    let stock = StockRepository::new(db.clone());
    let expiry = Utc::now()
        .date_naive()
        .checked_add_months(Months::new(18))
        .context("Expiry date out of range")?;

    let mut created = 0;
    for (code, name, generic, unit, cost, price, quantity) in DRUGS {
        let input = CreateDrugInput {
            code: code.to_string(),
            name: name.to_string(),
            generic_name: Some(generic.to_string()),
            unit: Some(unit.to_string()),
        };
        let drug = match drugs.create(org_id, input).await {
            Ok(drug) => drug,
            Err(DrugError::DuplicateCode(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let opening = PostMovementInput {
            incoming_rate: Some(Decimal::from_str(cost)?),
            selling_price: Some(Decimal::from_str(price)?),
            expiry_date: Some(expiry),
            remarks: Some("Opening stock".to_string()),
            created_by: Some(owner_id),
            ..PostMovementInput::new(
                main_id,
                drug.id,
                format!("{code}-OPEN"),
                MovementKind::Purchase,
                Decimal::from(quantity),
            )
        };
        stock.post_movement(org_id, opening).await?;
        created += 1;
    }

    println!("  Inserted {created} drugs with opening stock");
    Ok(())
}
