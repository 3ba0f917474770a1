//! Stock ledger: quantities, allocations, valuation and FEFO picking.
//!
//! # Modules
//!
//! - `types` - Movement kinds, stock positions and movement snapshots
//! - `ledger` - Applying movements and transfers to a stock line
//! - `fefo` - First-expiry-first-out pick planning
//! - `error` - Stock-specific error types

pub mod error;
pub mod fefo;
pub mod ledger;
pub mod types;

#[cfg(test)]
mod props;

pub use error::StockError;
pub use fefo::{FefoCandidate, FefoPick, FefoPlanner};
pub use ledger::StockLedger;
pub use types::{
    MAX_AMOUNT, MovementEffect, MovementKind, MovementOutcome, MovementRequest,
    MovementSnapshot, StockPosition, VALUATION_SCALE, fits_amount,
};
