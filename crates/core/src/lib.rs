//! Core business logic for Apotik.
//!
//! This crate contains pure domain logic with ZERO web or database
//! dependencies. Repositories call into it inside their transactions and
//! persist whatever it returns.
//!
//! # Modules
//!
//! - `permission` - Closed enumeration of capabilities
//! - `access` - Role and pharmacy-scope authorization
//! - `stock` - Stock ledger, valuation and FEFO picking
//! - `procurement` - Purchase order lifecycle
//! - `party` - Supplier and customer codes and balances
//! - `fiscal` - Fiscal year and period derivation
//! - `auth` - Password hashing and opaque tokens

pub mod access;
pub mod auth;
pub mod fiscal;
pub mod party;
pub mod permission;
pub mod procurement;
pub mod stock;
