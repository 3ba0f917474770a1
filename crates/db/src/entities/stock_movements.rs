//! `SeaORM` Entity for stock_movements table (append-only).

use super::sea_orm_active_enums::StockMovementType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub stock_id: Uuid,
    pub pharmacy_id: Uuid,
    pub drug_id: Uuid,
    pub batch_number: String,
    pub movement_type: StockMovementType,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub balance_after: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub allocated_after: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub valuation_rate: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub stock_value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub stock_value_difference: Decimal,
    pub posting_datetime: DateTimeWithTimeZone,
    pub fiscal_year: i32,
    pub fiscal_period: i16,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub remarks: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pharmacy_stock::Entity",
        from = "Column::StockId",
        to = "super::pharmacy_stock::Column::Id",
        on_delete = "Cascade"
    )]
    PharmacyStock,
}

impl Related<super::pharmacy_stock::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PharmacyStock.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
