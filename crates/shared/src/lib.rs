//! Shared types, errors, and configuration for Apotik.
//!
//! This crate provides common types used across all other crates:
//! - Pagination types for list endpoints
//! - Application-wide error types
//! - Configuration management
//! - Authentication DTOs, JWT handling and transactional e-mail

pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod jwt;
pub mod types;

#[cfg(test)]
mod auth_dto_tests;

pub use auth::{Claims, TokenKind, TokenPair};
pub use config::{AppConfig, EmailConfig, JwtConfig};
pub use email::{EmailError, EmailService};
pub use error::{AppError, AppResult};
pub use jwt::{JwtError, JwtService};
