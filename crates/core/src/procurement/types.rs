//! Purchase order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::procurement::error::ProcurementError;
use crate::stock::{VALUATION_SCALE, fits_amount};

/// Decimal places of receipt and invoice percentages.
pub const PERCENTAGE_SCALE: u32 = 2;

/// Largest conversion factor a `NUMERIC(19,6)` column holds.
pub const MAX_CONVERSION_FACTOR: Decimal =
    Decimal::from_parts(0x89E7_FFFF, 0x8AC7_2304, 0, false, 6);

/// Purchase order status.
///
/// - Draft → Submitted (submit)
/// - Submitted → PartiallyReceived | Received (receive)
/// - PartiallyReceived → PartiallyReceived | Received (receive)
/// - Received → Completed (fully invoiced)
/// - Submitted → Cancelled (cancel, nothing received)
/// - Submitted | PartiallyReceived | Received → Closed (close)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    /// Being prepared; the only editable state.
    Draft,
    /// Sent to the supplier.
    Submitted,
    /// Some goods received.
    PartiallyReceived,
    /// All goods received.
    Received,
    /// All goods received and invoiced.
    Completed,
    /// Withdrawn before any receipt.
    Cancelled,
    /// Stopped; no further receipts.
    Closed,
}

impl PurchaseOrderStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::PartiallyReceived => "PARTIALLY_RECEIVED",
            Self::Received => "RECEIVED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Closed => "CLOSED",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "DRAFT" => Some(Self::Draft),
            "SUBMITTED" => Some(Self::Submitted),
            "PARTIALLY_RECEIVED" => Some(Self::PartiallyReceived),
            "RECEIVED" => Some(Self::Received),
            "COMPLETED" => Some(Self::Completed),
            "CANCELLED" => Some(Self::Cancelled),
            "CLOSED" => Some(Self::Closed),
            _ => None,
        }
    }

    /// Returns the document status paired with this status.
    #[must_use]
    pub const fn doc_status(&self) -> DocStatus {
        match self {
            Self::Draft => DocStatus::Draft,
            Self::Cancelled => DocStatus::Cancelled,
            Self::Submitted
            | Self::PartiallyReceived
            | Self::Received
            | Self::Completed
            | Self::Closed => DocStatus::Submitted,
        }
    }

    /// Returns true if header and items can be changed.
    #[must_use]
    pub const fn is_editable(&self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Returns true if goods can be received.
    #[must_use]
    pub const fn accepts_receipts(&self) -> bool {
        matches!(self, Self::Submitted | Self::PartiallyReceived)
    }

    /// Returns true if supplier invoices can be recorded.
    #[must_use]
    pub const fn accepts_invoices(&self) -> bool {
        matches!(
            self,
            Self::Submitted | Self::PartiallyReceived | Self::Received
        )
    }
}

impl fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document status: 0 draft, 1 submitted, 2 cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocStatus {
    /// Editable.
    Draft,
    /// Submitted; changes need an amendment.
    Submitted,
    /// Cancelled.
    Cancelled,
}

impl DocStatus {
    /// Numeric code stored in `purchase_orders.doc_status`.
    #[must_use]
    pub const fn code(self) -> i16 {
        match self {
            Self::Draft => 0,
            Self::Submitted => 1,
            Self::Cancelled => 2,
        }
    }

    /// Parses a stored code.
    #[must_use]
    pub const fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Draft),
            1 => Some(Self::Submitted),
            2 => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Quantities of one purchase order line, as the service needs them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Item ID.
    pub item_id: Uuid,
    /// Ordered quantity in order units.
    pub quantity: Decimal,
    /// Price per order unit.
    pub unit_price: Decimal,
    /// Stock units per order unit.
    pub conversion_factor: Decimal,
    /// Quantity received so far.
    pub received_quantity: Decimal,
    /// Quantity invoiced so far.
    pub invoiced_quantity: Decimal,
}

impl OrderLine {
    /// Line amount.
    ///
    /// # Errors
    ///
    /// Returns `ProcurementError::OutOfRange` when the amount overflows.
    pub fn amount(&self) -> Result<Decimal, ProcurementError> {
        line_amount(self.quantity, self.unit_price)
    }

    /// Quantity still to be received.
    #[must_use]
    pub fn remaining(&self) -> Decimal {
        (self.quantity - self.received_quantity).max(Decimal::ZERO)
    }
}

/// `quantity × unit_price`, rounded like stock values.
///
/// # Errors
///
/// Returns `ProcurementError::OutOfRange` when the product does not fit an
/// amount column.
pub fn line_amount(quantity: Decimal, unit_price: Decimal) -> Result<Decimal, ProcurementError> {
    quantity
        .checked_mul(unit_price)
        .map(|amount| amount.round_dp(VALUATION_SCALE))
        .filter(|amount| fits_amount(*amount))
        .ok_or(ProcurementError::OutOfRange)
}

/// Sum of line amounts.
///
/// # Errors
///
/// Returns `ProcurementError::OutOfRange` when the total does not fit an
/// amount column.
pub fn order_total(amounts: impl IntoIterator<Item = Decimal>) -> Result<Decimal, ProcurementError> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
        .filter(|total| fits_amount(*total))
        .ok_or(ProcurementError::OutOfRange)
}

/// Quantity of one line in a receipt or invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineQuantity {
    /// Item ID.
    pub item_id: Uuid,
    /// Quantity in order units.
    pub quantity: Decimal,
}

/// One received line, converted to stock terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivedLine {
    /// Item ID.
    pub item_id: Uuid,
    /// Quantity received in order units.
    pub quantity: Decimal,
    /// Quantity posted to stock (`quantity × conversion_factor`).
    pub stock_quantity: Decimal,
    /// Cost per stock unit (`unit_price / conversion_factor`).
    pub incoming_rate: Decimal,
    /// Payable amount (`quantity × unit_price`).
    pub amount: Decimal,
    /// Received quantity of the item after this receipt.
    pub received_after: Decimal,
}

/// Result of planning a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptPlan {
    /// Lines to post.
    pub lines: Vec<ReceivedLine>,
    /// Order status after the receipt.
    pub new_status: PurchaseOrderStatus,
    /// Receipt progress after the receipt.
    pub received_percentage: Decimal,
    /// Amount to add to the supplier balance.
    pub payable: Decimal,
}

/// Result of planning an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoicePlan {
    /// New invoiced quantity per item.
    pub invoiced: Vec<LineQuantity>,
    /// Order status after the invoice.
    pub new_status: PurchaseOrderStatus,
    /// Invoice progress after the invoice.
    pub invoiced_percentage: Decimal,
}

/// Purchase order state transition with audit data.
#[derive(Debug, Clone)]
pub enum ProcurementAction {
    /// Draft submitted.
    Submit {
        /// The new status.
        new_status: PurchaseOrderStatus,
        /// Who submitted.
        submitted_by: Uuid,
        /// When.
        submitted_at: DateTime<Utc>,
    },
    /// Order cancelled.
    Cancel {
        /// The new status.
        new_status: PurchaseOrderStatus,
        /// Who cancelled.
        cancelled_by: Uuid,
        /// When.
        cancelled_at: DateTime<Utc>,
    },
    /// Order closed.
    Close {
        /// The new status.
        new_status: PurchaseOrderStatus,
        /// Who closed.
        closed_by: Uuid,
        /// When.
        closed_at: DateTime<Utc>,
    },
}

impl ProcurementAction {
    /// Returns the new status resulting from this action.
    #[must_use]
    pub fn new_status(&self) -> PurchaseOrderStatus {
        match self {
            Self::Submit { new_status, .. }
            | Self::Cancel { new_status, .. }
            | Self::Close { new_status, .. } => *new_status,
        }
    }
}

/// What an amendment does to its original.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmendPlan {
    /// The original is still SUBMITTED and must be cancelled first.
    pub cancel_original: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            PurchaseOrderStatus::Draft,
            PurchaseOrderStatus::Submitted,
            PurchaseOrderStatus::PartiallyReceived,
            PurchaseOrderStatus::Received,
            PurchaseOrderStatus::Completed,
            PurchaseOrderStatus::Cancelled,
            PurchaseOrderStatus::Closed,
        ] {
            assert_eq!(PurchaseOrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(
            PurchaseOrderStatus::parse("partially_received"),
            Some(PurchaseOrderStatus::PartiallyReceived)
        );
        assert_eq!(PurchaseOrderStatus::parse("approved"), None);
    }

    #[test]
    fn test_doc_status_mapping() {
        assert_eq!(PurchaseOrderStatus::Draft.doc_status().code(), 0);
        assert_eq!(PurchaseOrderStatus::Submitted.doc_status().code(), 1);
        assert_eq!(PurchaseOrderStatus::Received.doc_status().code(), 1);
        assert_eq!(PurchaseOrderStatus::Completed.doc_status().code(), 1);
        assert_eq!(PurchaseOrderStatus::Closed.doc_status().code(), 1);
        assert_eq!(PurchaseOrderStatus::Cancelled.doc_status().code(), 2);
        assert_eq!(DocStatus::from_code(2), Some(DocStatus::Cancelled));
        assert_eq!(DocStatus::from_code(3), None);
    }

    #[test]
    fn test_only_draft_is_editable() {
        assert!(PurchaseOrderStatus::Draft.is_editable());
        assert!(!PurchaseOrderStatus::Submitted.is_editable());
        assert!(!PurchaseOrderStatus::Cancelled.is_editable());
    }

    #[test]
    fn test_line_helpers() {
        let line = OrderLine {
            item_id: Uuid::nil(),
            quantity: dec!(10),
            unit_price: dec!(12.345),
            conversion_factor: dec!(10),
            received_quantity: dec!(4),
            invoiced_quantity: dec!(0),
        };
        assert_eq!(line.amount(), Ok(dec!(123.45)));
        assert_eq!(line.remaining(), dec!(6));
    }

    #[test]
    fn test_amounts_out_of_range() {
        assert_eq!(
            line_amount(Decimal::MAX, dec!(2)),
            Err(ProcurementError::OutOfRange)
        );
        assert_eq!(
            line_amount(dec!(100000000000), dec!(100000)),
            Err(ProcurementError::OutOfRange)
        );
        assert_eq!(order_total([dec!(1.5), dec!(2.25)]), Ok(dec!(3.75)));
        assert_eq!(
            order_total([crate::stock::MAX_AMOUNT, dec!(1)]),
            Err(ProcurementError::OutOfRange)
        );
        assert_eq!(MAX_CONVERSION_FACTOR, dec!(9999999999999.999999));
    }
}
