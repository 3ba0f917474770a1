//! Stock ledger domain types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::permission::Permission;

/// Decimal places kept for valuation rates and stock values.
pub const VALUATION_SCALE: u32 = 4;

/// Largest magnitude a `NUMERIC(19,4)` column holds: 999 999 999 999 999.9999.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0x89E7_FFFF, 0x8AC7_2304, 0, false, 4);

/// Returns true if `value` can be stored in a `NUMERIC(19,4)` column.
#[must_use]
pub fn fits_amount(value: Decimal) -> bool {
    value.abs() <= MAX_AMOUNT
}

/// Cause of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    /// Goods received from a supplier.
    Purchase,
    /// Stock sold or dispensed.
    Sale,
    /// Signed correction.
    Adjustment,
    /// Customer returned goods.
    ReturnInward,
    /// Goods returned to a supplier.
    ReturnOutward,
    /// Write-off of expired stock.
    Expiry,
    /// Write-off of damaged stock.
    Damage,
    /// Write-off of recalled stock.
    Recall,
    /// Incoming leg of a transfer.
    TransferIn,
    /// Outgoing leg of a transfer.
    TransferOut,
    /// Reservation of available stock.
    Allocation,
    /// Release of a reservation.
    Release,
    /// Reconciliation to a counted quantity.
    StockTake,
}

/// How a movement kind changes a stock line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementEffect {
    /// Adds to quantity.
    Inbound,
    /// Removes available quantity.
    Outbound,
    /// Removes available quantity, allowed on quarantined stock.
    WriteOff,
    /// Signed change to quantity.
    Adjust,
    /// Sets quantity to a counted value.
    Count,
    /// Adds to the allocated quantity.
    Allocate,
    /// Removes from the allocated quantity.
    Release,
}

impl MovementKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::Purchase,
        Self::Sale,
        Self::Adjustment,
        Self::ReturnInward,
        Self::ReturnOutward,
        Self::Expiry,
        Self::Damage,
        Self::Recall,
        Self::TransferIn,
        Self::TransferOut,
        Self::Allocation,
        Self::Release,
        Self::StockTake,
    ];

    /// Returns the string representation of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "PURCHASE",
            Self::Sale => "SALE",
            Self::Adjustment => "ADJUSTMENT",
            Self::ReturnInward => "RETURN_INWARD",
            Self::ReturnOutward => "RETURN_OUTWARD",
            Self::Expiry => "EXPIRY",
            Self::Damage => "DAMAGE",
            Self::Recall => "RECALL",
            Self::TransferIn => "TRANSFER_IN",
            Self::TransferOut => "TRANSFER_OUT",
            Self::Allocation => "ALLOCATION",
            Self::Release => "RELEASE",
            Self::StockTake => "STOCK_TAKE",
        }
    }

    /// Parses a kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
    }

    /// Returns the effect of this kind on a stock line.
    #[must_use]
    pub const fn effect(&self) -> MovementEffect {
        match self {
            Self::Purchase | Self::ReturnInward | Self::TransferIn => MovementEffect::Inbound,
            Self::Sale | Self::ReturnOutward | Self::TransferOut => MovementEffect::Outbound,
            Self::Expiry | Self::Damage | Self::Recall => MovementEffect::WriteOff,
            Self::Adjustment => MovementEffect::Adjust,
            Self::StockTake => MovementEffect::Count,
            Self::Allocation => MovementEffect::Allocate,
            Self::Release => MovementEffect::Release,
        }
    }

    /// Returns true if the kind accepts an incoming valuation rate.
    #[must_use]
    pub const fn accepts_rate(&self) -> bool {
        matches!(self.effect(), MovementEffect::Inbound)
    }

    /// Returns true if the kind is refused on quarantined stock.
    #[must_use]
    pub const fn blocked_by_quarantine(&self) -> bool {
        matches!(self, Self::Sale | Self::TransferOut | Self::Allocation)
    }

    /// Returns true if the kind is refused on expired stock.
    #[must_use]
    pub const fn blocked_by_expiry(&self) -> bool {
        matches!(self, Self::Sale | Self::Allocation)
    }

    /// Returns true if the kind is one leg of a transfer.
    #[must_use]
    pub const fn is_transfer(&self) -> bool {
        matches!(self, Self::TransferIn | Self::TransferOut)
    }

    /// Permission needed to post this kind directly.
    #[must_use]
    pub const fn required_permission(&self) -> Permission {
        match self {
            Self::Purchase => Permission::PurchaseReceiptCreate,
            Self::Sale => Permission::SalesInvoiceCreate,
            Self::Adjustment | Self::ReturnInward | Self::ReturnOutward => {
                Permission::InventoryAdjust
            }
            Self::Expiry | Self::Damage | Self::Recall => Permission::InventoryWriteOff,
            Self::TransferIn | Self::TransferOut => Permission::InventoryTransfer,
            Self::Allocation | Self::Release => Permission::InventoryAllocate,
            Self::StockTake => Permission::InventoryStockTake,
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state of one stock line (pharmacy, drug, batch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPosition {
    /// Quantity on hand in stock units.
    pub quantity: Decimal,
    /// Quantity reserved.
    pub allocated_quantity: Decimal,
    /// Moving-average cost per stock unit.
    pub valuation_rate: Decimal,
    /// Batch expiry.
    pub expiry_date: Option<NaiveDate>,
    /// Quarantined stock cannot be sold, allocated or transferred.
    pub is_quarantined: bool,
}

impl StockPosition {
    /// An empty line for a batch that has not been received yet.
    #[must_use]
    pub const fn empty(expiry_date: Option<NaiveDate>) -> Self {
        Self {
            quantity: Decimal::ZERO,
            allocated_quantity: Decimal::ZERO,
            valuation_rate: Decimal::ZERO,
            expiry_date,
            is_quarantined: false,
        }
    }

    /// Quantity that can still be sold or reserved.
    #[must_use]
    pub fn available(&self) -> Decimal {
        self.quantity - self.allocated_quantity
    }

    /// Value of the line at its valuation rate, `None` on overflow.
    #[must_use]
    pub fn stock_value(&self) -> Option<Decimal> {
        self.quantity
            .checked_mul(self.valuation_rate)
            .map(|value| value.round_dp(VALUATION_SCALE))
    }

    /// Returns true if the batch is expired as of `date`.
    ///
    /// A batch is no longer sellable on its expiry date.
    #[must_use]
    pub fn is_expired_on(&self, date: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry <= date)
    }
}

/// A requested change to a stock line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementRequest {
    /// Cause of the movement.
    pub kind: MovementKind,
    /// Positive quantity, the signed delta for ADJUSTMENT, or the counted
    /// quantity for STOCK_TAKE.
    pub quantity: Decimal,
    /// Cost per stock unit of incoming goods.
    pub incoming_rate: Option<Decimal>,
    /// Business date of the movement.
    pub posting_date: NaiveDate,
}

impl MovementRequest {
    /// Creates a request without an incoming rate.
    #[must_use]
    pub const fn new(kind: MovementKind, quantity: Decimal, posting_date: NaiveDate) -> Self {
        Self {
            kind,
            quantity,
            incoming_rate: None,
            posting_date,
        }
    }

    /// Sets the incoming rate.
    #[must_use]
    pub const fn with_rate(mut self, rate: Decimal) -> Self {
        self.incoming_rate = Some(rate);
        self
    }
}

/// Values recorded on the movement row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovementSnapshot {
    /// Cause of the movement.
    pub kind: MovementKind,
    /// Signed change of quantity, or of the allocated quantity for
    /// ALLOCATION and RELEASE.
    pub quantity: Decimal,
    /// Quantity on hand after the movement.
    pub balance_after: Decimal,
    /// Allocated quantity after the movement.
    pub allocated_after: Decimal,
    /// Valuation rate after the movement.
    pub valuation_rate: Decimal,
    /// `balance_after × valuation_rate`.
    pub stock_value: Decimal,
    /// Change of stock value caused by the movement.
    pub stock_value_difference: Decimal,
}

/// Result of applying a movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementOutcome {
    /// The line after the movement.
    pub position: StockPosition,
    /// The movement row to append.
    pub movement: MovementSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kind_roundtrip() {
        for kind in MovementKind::ALL {
            assert_eq!(MovementKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(
            MovementKind::parse("return_inward"),
            Some(MovementKind::ReturnInward)
        );
        assert_eq!(MovementKind::parse("GIFT"), None);
    }

    #[test]
    fn test_serde_matches_as_str() {
        for kind in MovementKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_effects() {
        assert_eq!(MovementKind::TransferIn.effect(), MovementEffect::Inbound);
        assert_eq!(MovementKind::ReturnOutward.effect(), MovementEffect::Outbound);
        assert_eq!(MovementKind::Recall.effect(), MovementEffect::WriteOff);
        assert!(MovementKind::Purchase.accepts_rate());
        assert!(!MovementKind::Adjustment.accepts_rate());
        assert!(MovementKind::TransferOut.blocked_by_quarantine());
        assert!(!MovementKind::Expiry.blocked_by_quarantine());
        assert!(!MovementKind::TransferOut.blocked_by_expiry());
    }

    #[test]
    fn test_position_helpers() {
        let pos = StockPosition {
            quantity: dec!(10),
            allocated_quantity: dec!(3),
            valuation_rate: dec!(1.23456),
            expiry_date: NaiveDate::from_ymd_opt(2026, 6, 30),
            is_quarantined: false,
        };
        assert_eq!(pos.available(), dec!(7));
        assert_eq!(pos.stock_value(), Some(dec!(12.3456)));

        let june_29 = NaiveDate::from_ymd_opt(2026, 6, 29).unwrap();
        let june_30 = NaiveDate::from_ymd_opt(2026, 6, 30).unwrap();
        assert!(!pos.is_expired_on(june_29));
        assert!(pos.is_expired_on(june_30));
        assert!(!StockPosition::empty(None).is_expired_on(june_30));
    }

    #[test]
    fn test_amount_bounds() {
        assert_eq!(MAX_AMOUNT, dec!(999999999999999.9999));
        assert!(fits_amount(MAX_AMOUNT));
        assert!(fits_amount(-MAX_AMOUNT));
        assert!(!fits_amount(dec!(1000000000000000)));
        assert!(!fits_amount(Decimal::MAX));

        let huge = StockPosition {
            quantity: Decimal::MAX,
            valuation_rate: dec!(2),
            ..StockPosition::empty(None)
        };
        assert_eq!(huge.stock_value(), None);
    }
}
