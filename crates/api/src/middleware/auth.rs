//! Authentication middleware for protected routes.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;
use uuid::Uuid;

use crate::{AppState, error::ApiError};
use apotik_core::access::AccessContext;
use apotik_core::permission::Permission;
use apotik_db::RoleRepository;
use apotik_shared::Claims;

/// Extracts the bearer token from the Authorization header.
fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
}

/// Authentication middleware that validates JWT access tokens.
///
/// This middleware:
/// 1. Extracts the Bearer token from the Authorization header
/// 2. Validates it as an access token
/// 3. Stores the claims in request extensions for handlers to access
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(token) = auth_header.and_then(extract_bearer_token) else {
        return ApiError::unauthorized(
            "MISSING_TOKEN",
            "Authorization header with Bearer token is required",
        )
        .into_response();
    };

    match state.jwt_service.validate_token(token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Extractor for authenticated user claims.
///
/// ```ignore
/// async fn handler(auth: AuthUser) -> impl IntoResponse {
///     let user_id = auth.user_id();
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    /// Returns the user ID from the claims.
    #[must_use]
    pub const fn user_id(&self) -> Uuid {
        self.0.user_id()
    }

    /// Returns the organization ID from the claims.
    #[must_use]
    pub const fn organization_id(&self) -> Uuid {
        self.0.organization_id()
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| ApiError::unauthorized("UNAUTHORIZED", "Authentication required"))
    }
}

/// An authenticated user with their resolved roles.
///
/// Extracting a principal loads the user's roles and pharmacy scopes for the
/// organization in the token. Inactive users are rejected.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Token claims.
    pub claims: Claims,
    /// Authority inside the organization.
    pub access: AccessContext,
}

impl Principal {
    /// The acting user.
    #[must_use]
    pub const fn user_id(&self) -> Uuid {
        self.claims.user_id()
    }

    /// The tenant of the request.
    #[must_use]
    pub const fn organization_id(&self) -> Uuid {
        self.claims.organization_id()
    }

    /// Fails with 403 unless the permission is granted for the pharmacy.
    pub fn require(&self, permission: Permission, pharmacy_id: Option<Uuid>) -> Result<(), ApiError> {
        self.access.authorize(permission, pharmacy_id).map_err(|e| {
            warn!(
                user_id = %self.user_id(),
                %permission,
                pharmacy_id = ?pharmacy_id,
                "Permission denied"
            );
            ApiError::from(e)
        })
    }
}

impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;

        let access = RoleRepository::new((*state.db).clone())
            .load_access_context(claims.organization_id(), claims.user_id())
            .await?
            .ok_or_else(|| {
                ApiError::unauthorized("ACCOUNT_DISABLED", "This account is not active")
            })?;

        Ok(Self { claims, access })
    }
}
