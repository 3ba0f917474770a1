//! Postgres enum types.

use apotik_core::procurement::PurchaseOrderStatus as CoreOrderStatus;
use apotik_core::stock::MovementKind;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// `stock_movement_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "stock_movement_type")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockMovementType {
    #[sea_orm(string_value = "PURCHASE")]
    Purchase,
    #[sea_orm(string_value = "SALE")]
    Sale,
    #[sea_orm(string_value = "ADJUSTMENT")]
    Adjustment,
    #[sea_orm(string_value = "RETURN_INWARD")]
    ReturnInward,
    #[sea_orm(string_value = "RETURN_OUTWARD")]
    ReturnOutward,
    #[sea_orm(string_value = "EXPIRY")]
    Expiry,
    #[sea_orm(string_value = "DAMAGE")]
    Damage,
    #[sea_orm(string_value = "RECALL")]
    Recall,
    #[sea_orm(string_value = "TRANSFER_IN")]
    TransferIn,
    #[sea_orm(string_value = "TRANSFER_OUT")]
    TransferOut,
    #[sea_orm(string_value = "ALLOCATION")]
    Allocation,
    #[sea_orm(string_value = "RELEASE")]
    Release,
    #[sea_orm(string_value = "STOCK_TAKE")]
    StockTake,
}

impl From<MovementKind> for StockMovementType {
    fn from(kind: MovementKind) -> Self {
        match kind {
            MovementKind::Purchase => Self::Purchase,
            MovementKind::Sale => Self::Sale,
            MovementKind::Adjustment => Self::Adjustment,
            MovementKind::ReturnInward => Self::ReturnInward,
            MovementKind::ReturnOutward => Self::ReturnOutward,
            MovementKind::Expiry => Self::Expiry,
            MovementKind::Damage => Self::Damage,
            MovementKind::Recall => Self::Recall,
            MovementKind::TransferIn => Self::TransferIn,
            MovementKind::TransferOut => Self::TransferOut,
            MovementKind::Allocation => Self::Allocation,
            MovementKind::Release => Self::Release,
            MovementKind::StockTake => Self::StockTake,
        }
    }
}

impl From<StockMovementType> for MovementKind {
    fn from(kind: StockMovementType) -> Self {
        match kind {
            StockMovementType::Purchase => Self::Purchase,
            StockMovementType::Sale => Self::Sale,
            StockMovementType::Adjustment => Self::Adjustment,
            StockMovementType::ReturnInward => Self::ReturnInward,
            StockMovementType::ReturnOutward => Self::ReturnOutward,
            StockMovementType::Expiry => Self::Expiry,
            StockMovementType::Damage => Self::Damage,
            StockMovementType::Recall => Self::Recall,
            StockMovementType::TransferIn => Self::TransferIn,
            StockMovementType::TransferOut => Self::TransferOut,
            StockMovementType::Allocation => Self::Allocation,
            StockMovementType::Release => Self::Release,
            StockMovementType::StockTake => Self::StockTake,
        }
    }
}

/// `purchase_order_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "purchase_order_status")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "SUBMITTED")]
    Submitted,
    #[sea_orm(string_value = "PARTIALLY_RECEIVED")]
    PartiallyReceived,
    #[sea_orm(string_value = "RECEIVED")]
    Received,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
    #[sea_orm(string_value = "CLOSED")]
    Closed,
}

impl From<CoreOrderStatus> for PurchaseOrderStatus {
    fn from(status: CoreOrderStatus) -> Self {
        match status {
            CoreOrderStatus::Draft => Self::Draft,
            CoreOrderStatus::Submitted => Self::Submitted,
            CoreOrderStatus::PartiallyReceived => Self::PartiallyReceived,
            CoreOrderStatus::Received => Self::Received,
            CoreOrderStatus::Completed => Self::Completed,
            CoreOrderStatus::Cancelled => Self::Cancelled,
            CoreOrderStatus::Closed => Self::Closed,
        }
    }
}

impl From<PurchaseOrderStatus> for CoreOrderStatus {
    fn from(status: PurchaseOrderStatus) -> Self {
        match status {
            PurchaseOrderStatus::Draft => Self::Draft,
            PurchaseOrderStatus::Submitted => Self::Submitted,
            PurchaseOrderStatus::PartiallyReceived => Self::PartiallyReceived,
            PurchaseOrderStatus::Received => Self::Received,
            PurchaseOrderStatus::Completed => Self::Completed,
            PurchaseOrderStatus::Cancelled => Self::Cancelled,
            PurchaseOrderStatus::Closed => Self::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn test_movement_type_matches_core_names() {
        for kind in MovementKind::ALL {
            let db: StockMovementType = kind.into();
            assert_eq!(db.to_value(), kind.as_str());
            assert_eq!(MovementKind::from(db), kind);
        }
    }

    #[test]
    fn test_order_status_matches_core_names() {
        for status in PurchaseOrderStatus::iter() {
            let core: CoreOrderStatus = status.into();
            assert_eq!(status.to_value(), core.as_str());
            assert_eq!(PurchaseOrderStatus::from(core), status);
        }
    }
}
