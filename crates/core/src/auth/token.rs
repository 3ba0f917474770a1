//! Opaque random tokens.
//!
//! The raw token is handed to the user once (in a reset link, or as an
//! organization join code); only its SHA-256 digest is stored when the
//! token grants access.

use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Random bytes per token.
const TOKEN_BYTES: usize = 32;

/// A freshly generated token and its digest.
#[derive(Debug, Clone)]
pub struct OpaqueToken {
    /// URL-safe base64 of 32 random bytes.
    pub raw: String,
    /// Hex SHA-256 of `raw`.
    pub hash: String,
}

/// Generates a new random token.
#[must_use]
pub fn generate_token() -> OpaqueToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    let raw = base64_url::encode(&bytes);
    let hash = hash_token(&raw);
    OpaqueToken { raw, hash }
}

/// Hex SHA-256 digest of a raw token.
#[must_use]
pub fn hash_token(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    digest
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}
