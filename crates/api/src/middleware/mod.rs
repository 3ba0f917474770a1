//! Request middleware and extractors.

pub mod auth;

pub use auth::{AuthUser, Principal, auth_middleware};
