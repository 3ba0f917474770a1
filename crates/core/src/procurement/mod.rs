//! Purchase order lifecycle.
//!
//! Orders are drafted, submitted, received (possibly in parts), invoiced
//! and completed. Only drafts are editable; a submitted order is corrected
//! by an amendment that links back through `amended_from_id`.
//!
//! # Modules
//!
//! - `types` - Statuses, order lines and receipt/invoice plans
//! - `error` - Procurement-specific error types
//! - `service` - State transitions and receipt/invoice planning

pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use error::ProcurementError;
pub use service::ProcurementService;
pub use types::{
    AmendPlan, DocStatus, InvoicePlan, LineQuantity, MAX_CONVERSION_FACTOR, OrderLine,
    PERCENTAGE_SCALE, ProcurementAction, PurchaseOrderStatus, ReceiptPlan, ReceivedLine,
    line_amount, order_total,
};
