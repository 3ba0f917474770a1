//! Authentication primitives.
//!
//! This module provides:
//! - Password hashing and verification with Argon2id
//! - Opaque tokens for password resets and organization joins

mod password;
mod token;

pub use password::{PasswordError, ensure_password_length, hash_password, verify_password};
pub use token::{OpaqueToken, generate_token, hash_token};
