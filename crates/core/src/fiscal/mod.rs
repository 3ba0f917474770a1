//! Fiscal calendar of an organization.

pub mod calendar;

pub use calendar::{FiscalCalendar, FiscalError, FiscalPosition};
