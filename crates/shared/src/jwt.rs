//! JWT token generation and validation.
//!
//! Access and refresh tokens share one signing key and differ by
//! [`TokenKind`], so a refresh token is never accepted as an access token.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{Claims, TokenKind, TokenPair};
use crate::config::JwtConfig;

/// Errors that can occur during JWT operations.
#[derive(Debug, Error)]
pub enum JwtError {
    /// Token encoding failed.
    #[error("failed to encode token: {0}")]
    EncodingError(String),

    /// Token decoding failed.
    #[error("failed to decode token: {0}")]
    DecodingError(String),

    /// Token has expired.
    #[error("token has expired")]
    Expired,

    /// Token is of the wrong kind for this use.
    #[error("invalid token")]
    Invalid,
}

/// JWT service for token operations.
#[derive(Clone)]
pub struct JwtService {
    access_expiry_secs: i64,
    refresh_expiry_secs: i64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("access_expiry_secs", &self.access_expiry_secs)
            .field("refresh_expiry_secs", &self.refresh_expiry_secs)
            .field("encoding_key", &"[hidden]")
            .field("decoding_key", &"[hidden]")
            .finish()
    }
}

impl JwtService {
    /// Creates a new JWT service with the given configuration.
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            access_expiry_secs: i64::try_from(config.access_token_expiry_secs).unwrap_or(i64::MAX),
            refresh_expiry_secs: i64::try_from(config.refresh_token_expiry_secs)
                .unwrap_or(i64::MAX),
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
        }
    }

    fn issue(
        &self,
        user_id: Uuid,
        org_id: Uuid,
        kind: TokenKind,
        lifetime_secs: i64,
    ) -> Result<String, JwtError> {
        let expires_at = Utc::now() + Duration::seconds(lifetime_secs);
        let claims = Claims::new(user_id, org_id, kind, expires_at);

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))
    }

    /// Generates an access token for a user.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::EncodingError` if token generation fails.
    pub fn generate_access_token(&self, user_id: Uuid, org_id: Uuid) -> Result<String, JwtError> {
        self.issue(user_id, org_id, TokenKind::Access, self.access_expiry_secs)
    }

    /// Generates a refresh token for a user.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::EncodingError` if token generation fails.
    pub fn generate_refresh_token(&self, user_id: Uuid, org_id: Uuid) -> Result<String, JwtError> {
        self.issue(user_id, org_id, TokenKind::Refresh, self.refresh_expiry_secs)
    }

    /// Generates an access/refresh pair.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::EncodingError` if token generation fails.
    pub fn generate_pair(&self, user_id: Uuid, org_id: Uuid) -> Result<TokenPair, JwtError> {
        Ok(TokenPair::new(
            self.generate_access_token(user_id, org_id)?,
            self.generate_refresh_token(user_id, org_id)?,
            self.access_expiry_secs,
        ))
    }

    fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::DecodingError(e.to_string()),
            })
    }

    /// Validates and decodes an access token.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::Expired` if the token has expired,
    /// `JwtError::Invalid` for a refresh token, and
    /// `JwtError::DecodingError` if the token is malformed.
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.decode(token)?;
        if claims.kind != TokenKind::Access {
            return Err(JwtError::Invalid);
        }
        Ok(claims)
    }

    /// Validates and decodes a refresh token.
    ///
    /// # Errors
    ///
    /// Same as [`Self::validate_token`], with the kinds swapped.
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.decode(token)?;
        if claims.kind != TokenKind::Refresh {
            return Err(JwtError::Invalid);
        }
        Ok(claims)
    }

    /// Returns the access token expiration in seconds.
    #[must_use]
    pub const fn access_token_expires_in(&self) -> i64 {
        self.access_expiry_secs
    }
}
