//! Password hashing with Argon2id.
//!
//! Uses the recommended Argon2id variant with secure defaults.

use apotik_shared::auth::MIN_PASSWORD_LENGTH;
use argon2::{
    Argon2, PasswordHash,
    password_hash::{PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

/// Errors that can occur during password operations.
#[derive(Debug, Error)]
pub enum PasswordError {
    /// Failed to hash password.
    #[error("failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password.
    #[error("failed to verify password: {0}")]
    VerifyError(String),

    /// Invalid password hash format.
    #[error("invalid password hash format")]
    InvalidHash,

    /// Password shorter than the minimum.
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    TooShort,
}

impl PasswordError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::TooShort => 400,
            Self::HashError(_) | Self::VerifyError(_) | Self::InvalidHash => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::TooShort => "VALIDATION_ERROR",
            Self::HashError(_) | Self::VerifyError(_) | Self::InvalidHash => "INTERNAL_ERROR",
        }
    }
}

/// Rejects passwords shorter than the minimum length.
///
/// # Errors
///
/// Returns `PasswordError::TooShort`.
pub fn ensure_password_length(password: &str) -> Result<(), PasswordError> {
    let length = u64::try_from(password.chars().count()).unwrap_or(u64::MAX);
    if length < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    Ok(())
}

/// Hashes a password with Argon2id and a random salt, returning the PHC
/// string stored in `users.password_hash`.
///
/// # Errors
///
/// Returns `PasswordError::HashError` if hashing fails.
///
/// ```
/// use apotik_core::auth::hash_password;
///
/// let hash = hash_password("s3cret-pass").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashError(e.to_string()))
}

/// Checks a password against a stored PHC string. A mismatch is `Ok(false)`.
///
/// # Errors
///
/// `InvalidHash` when the stored value is not a PHC string, `VerifyError`
/// for any other verifier failure.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let stored = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHash)?;

    match Argon2::default().verify_password(password.as_bytes(), &stored) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(e.to_string())),
    }
}
