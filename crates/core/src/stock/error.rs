//! Stock ledger error types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::stock::types::MovementKind;

/// Errors raised by stock movements and FEFO picking.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    /// Quantity must be strictly positive for this kind.
    #[error("Quantity for {kind} must be positive, got {quantity}")]
    NonPositiveQuantity {
        /// The movement kind.
        kind: MovementKind,
        /// The quantity supplied.
        quantity: Decimal,
    },

    /// ADJUSTMENT with a zero delta.
    #[error("Adjustment quantity must not be zero")]
    ZeroAdjustment,

    /// STOCK_TAKE with a negative count.
    #[error("Counted quantity must not be negative, got {0}")]
    NegativeCount(Decimal),

    /// Incoming rate below zero.
    #[error("Incoming rate must not be negative, got {0}")]
    NegativeRate(Decimal),

    /// Incoming rate on a kind that does not bring in goods.
    #[error("{0} does not accept an incoming rate")]
    UnexpectedRate(MovementKind),

    /// Not enough available stock.
    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        /// Quantity requested.
        requested: Decimal,
        /// Quantity available.
        available: Decimal,
    },

    /// Releasing more than is allocated.
    #[error("Cannot release {requested}, only {allocated} allocated")]
    InsufficientAllocation {
        /// Quantity requested.
        requested: Decimal,
        /// Quantity allocated.
        allocated: Decimal,
    },

    /// The resulting quantity would drop below the allocated quantity.
    #[error("Resulting quantity {resulting} is below allocated quantity {allocated}")]
    BelowAllocated {
        /// Quantity after the movement.
        resulting: Decimal,
        /// Quantity allocated.
        allocated: Decimal,
    },

    /// The batch is quarantined.
    #[error("Batch is quarantined; {0} is not allowed")]
    Quarantined(MovementKind),

    /// The batch has expired.
    #[error("Batch expired on {expiry_date}; {kind} is not allowed")]
    Expired {
        /// The movement kind.
        kind: MovementKind,
        /// The batch expiry.
        expiry_date: NaiveDate,
    },

    /// Transfer within one pharmacy.
    #[error("Source and destination pharmacy must differ")]
    SamePharmacy,

    /// Transfer legs must be posted through a transfer.
    #[error("{0} can only be posted as part of a transfer")]
    TransferLegOnly(MovementKind),

    /// Batch number missing.
    #[error("Batch number is required")]
    BatchNumberRequired,

    /// An inbound movement names an expiry other than the batch's own.
    #[error("Batch {batch_number} already exists with expiry {existing}")]
    ExpiryMismatch {
        /// The batch.
        batch_number: String,
        /// Expiry recorded on the batch.
        existing: String,
    },

    /// A quantity, rate or value does not fit the stock columns.
    #[error("Amount is outside the supported range")]
    OutOfRange,
}

impl StockError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NonPositiveQuantity { .. }
            | Self::ZeroAdjustment
            | Self::NegativeCount(_)
            | Self::NegativeRate(_)
            | Self::UnexpectedRate(_)
            | Self::SamePharmacy
            | Self::TransferLegOnly(_)
            | Self::BatchNumberRequired
            | Self::OutOfRange => 400,

            Self::InsufficientStock { .. }
            | Self::InsufficientAllocation { .. }
            | Self::BelowAllocated { .. }
            | Self::Quarantined(_)
            | Self::Expired { .. }
            | Self::ExpiryMismatch { .. } => 422,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NonPositiveQuantity { .. } => "NON_POSITIVE_QUANTITY",
            Self::ZeroAdjustment => "ZERO_ADJUSTMENT",
            Self::NegativeCount(_) => "NEGATIVE_COUNT",
            Self::NegativeRate(_) => "NEGATIVE_RATE",
            Self::UnexpectedRate(_) => "UNEXPECTED_RATE",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::InsufficientAllocation { .. } => "INSUFFICIENT_ALLOCATION",
            Self::BelowAllocated { .. } => "BELOW_ALLOCATED",
            Self::Quarantined(_) => "BATCH_QUARANTINED",
            Self::Expired { .. } => "BATCH_EXPIRED",
            Self::SamePharmacy => "SAME_PHARMACY",
            Self::TransferLegOnly(_) => "TRANSFER_LEG_ONLY",
            Self::BatchNumberRequired => "BATCH_NUMBER_REQUIRED",
            Self::ExpiryMismatch { .. } => "BATCH_EXPIRY_MISMATCH",
            Self::OutOfRange => "AMOUNT_OUT_OF_RANGE",
        }
    }
}
