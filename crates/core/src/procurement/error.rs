//! Procurement error types.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::procurement::types::PurchaseOrderStatus;

/// Errors that can occur in the purchase order lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcurementError {
    /// Attempted an invalid status transition.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// The current status.
        from: PurchaseOrderStatus,
        /// The attempted target status.
        to: PurchaseOrderStatus,
    },

    /// Attempted to edit a non-draft order.
    #[error("Cannot modify a {0} purchase order; create an amendment instead")]
    CannotModify(PurchaseOrderStatus),

    /// Submitting an order without items.
    #[error("Purchase order has no items")]
    EmptyOrder,

    /// Item quantity not positive.
    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),

    /// Negative unit price.
    #[error("Unit price must not be negative, got {0}")]
    InvalidPrice(Decimal),

    /// Conversion factor not positive.
    #[error("Conversion factor must be positive, got {0}")]
    InvalidConversionFactor(Decimal),

    /// Receipt or invoice without lines.
    #[error("At least one line is required")]
    NoLines,

    /// Line refers to an item of another order.
    #[error("Item {0} does not belong to this purchase order")]
    UnknownItem(Uuid),

    /// The same item appears twice in one receipt or invoice.
    #[error("Item {0} appears more than once")]
    DuplicateLine(Uuid),

    /// Receiving more than remains on the line.
    #[error("Cannot receive {requested} of item {item_id}; {remaining} remaining")]
    OverReceipt {
        /// The item.
        item_id: Uuid,
        /// Quantity requested.
        requested: Decimal,
        /// Quantity still open.
        remaining: Decimal,
    },

    /// Invoicing more than was ordered.
    #[error("Cannot invoice {requested} of item {item_id}; {remaining} remaining")]
    OverInvoice {
        /// The item.
        item_id: Uuid,
        /// Quantity requested.
        requested: Decimal,
        /// Quantity still uninvoiced.
        remaining: Decimal,
    },

    /// Cancelling or amending an order that already received goods.
    #[error("Purchase order already has receipts")]
    HasReceipts,

    /// A quantity, price or amount does not fit the order columns.
    #[error("Amount is outside the supported range")]
    OutOfRange,
}

impl ProcurementError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::EmptyOrder
            | Self::InvalidQuantity(_)
            | Self::InvalidPrice(_)
            | Self::InvalidConversionFactor(_)
            | Self::NoLines
            | Self::UnknownItem(_)
            | Self::DuplicateLine(_)
            | Self::OutOfRange => 400,

            Self::InvalidTransition { .. } | Self::CannotModify(_) | Self::HasReceipts => 409,

            Self::OverReceipt { .. } | Self::OverInvoice { .. } => 422,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::CannotModify(_) => "CANNOT_MODIFY",
            Self::EmptyOrder => "EMPTY_ORDER",
            Self::InvalidQuantity(_) => "INVALID_QUANTITY",
            Self::InvalidPrice(_) => "INVALID_PRICE",
            Self::InvalidConversionFactor(_) => "INVALID_CONVERSION_FACTOR",
            Self::NoLines => "NO_LINES",
            Self::UnknownItem(_) => "UNKNOWN_ITEM",
            Self::DuplicateLine(_) => "DUPLICATE_LINE",
            Self::OverReceipt { .. } => "OVER_RECEIPT",
            Self::OverInvoice { .. } => "OVER_INVOICE",
            Self::HasReceipts => "HAS_RECEIPTS",
            Self::OutOfRange => "AMOUNT_OUT_OF_RANGE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_error() {
        let err = ProcurementError::InvalidTransition {
            from: PurchaseOrderStatus::Draft,
            to: PurchaseOrderStatus::Received,
        };
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
        assert!(err.to_string().contains("DRAFT"));
        assert!(err.to_string().contains("RECEIVED"));
    }

    #[test]
    fn test_cannot_modify_error() {
        let err = ProcurementError::CannotModify(PurchaseOrderStatus::Submitted);
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.error_code(), "CANNOT_MODIFY");
        assert!(err.to_string().contains("amendment"));
    }

    #[test]
    fn test_over_receipt_error() {
        let err = ProcurementError::OverReceipt {
            item_id: Uuid::nil(),
            requested: Decimal::new(5, 0),
            remaining: Decimal::new(2, 0),
        };
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.error_code(), "OVER_RECEIPT");
    }

    #[test]
    fn test_empty_order_error() {
        assert_eq!(ProcurementError::EmptyOrder.status_code(), 400);
        assert_eq!(ProcurementError::EmptyOrder.error_code(), "EMPTY_ORDER");
        assert_eq!(ProcurementError::OutOfRange.status_code(), 400);
    }
}
