//! Authentication routes: login, registration, token refresh and passwords.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use serde_json::json;
use tracing::{info, warn};

use crate::{AppState, error::ApiError, extractors::ValidatedJson, middleware::AuthUser};
use apotik_core::auth::{ensure_password_length, hash_password, verify_password};
use apotik_db::{
    OrganizationRepository, PasswordResetRepository, UserRepository,
    entities::{organizations, users},
    repositories::CreateUserInput,
};
use apotik_shared::auth::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse,
    OrganizationInfo, RefreshRequest, RegisterRequest, ResetPasswordRequest, UserInfo,
};

/// Routes that need no token.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/refresh", post(refresh))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

/// Routes for a signed-in user.
pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/auth/change-password", post(change_password))
}

fn invalid_credentials() -> ApiError {
    ApiError::unauthorized("INVALID_CREDENTIALS", "Invalid email or password")
}

fn login_response(
    state: &AppState,
    user: users::Model,
    org: organizations::Model,
) -> Result<LoginResponse, ApiError> {
    let tokens = state.jwt_service.generate_pair(user.id, org.id)?;
    Ok(LoginResponse {
        user: UserInfo {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            organization: OrganizationInfo {
                id: org.id,
                name: org.name,
                code: org.code,
            },
        },
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
    })
}

/// POST /auth/login - Authenticate user and return tokens.
async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_repo = UserRepository::new((*state.db).clone());

    let Some((user, org)) = user_repo.find_with_organization(&payload.email).await? else {
        info!("Login attempt for unknown email");
        return Err(invalid_credentials());
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        info!(user_id = %user.id, "Failed login attempt - invalid password");
        return Err(invalid_credentials());
    }

    if !user.is_active || !org.is_active {
        return Err(ApiError::unauthorized(
            "ACCOUNT_DISABLED",
            "This account has been disabled",
        ));
    }

    info!(user_id = %user.id, org_id = %org.id, "User logged in");
    Ok((StatusCode::OK, Json(login_response(&state, user, org)?)))
}

/// POST /auth/register - Join an organization by its token.
async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let org = OrganizationRepository::new((*state.db).clone())
        .find_by_token(payload.organization_token.trim())
        .await?
        .filter(|org| org.is_active)
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_ORGANIZATION_TOKEN",
                "Organization token is not valid",
            )
        })?;

    let password_hash = hash_password(&payload.password)?;
    let user = UserRepository::new((*state.db).clone())
        .create(CreateUserInput {
            organization_id: org.id,
            email: payload.email,
            password_hash,
            full_name: payload.full_name,
            is_platform_admin: false,
        })
        .await?;

    info!(user_id = %user.id, org_id = %org.id, "New user registered");
    Ok((StatusCode::CREATED, Json(login_response(&state, user, org)?)))
}

/// POST /auth/refresh - Exchange a refresh token for a new access token.
async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = state
        .jwt_service
        .validate_refresh_token(&payload.refresh_token)?;

    let active = UserRepository::new((*state.db).clone())
        .find_by_id(claims.user_id())
        .await?
        .is_some_and(|u| u.is_active && u.organization_id == claims.organization_id());
    if !active {
        return Err(ApiError::unauthorized(
            "ACCOUNT_DISABLED",
            "This account is not active",
        ));
    }

    let access_token = state
        .jwt_service
        .generate_access_token(claims.user_id(), claims.organization_id())?;

    Ok(Json(json!({
        "access_token": access_token,
        "expires_in": state.jwt_service.access_token_expires_in()
    })))
}

/// POST /auth/forgot-password - Mail a reset link.
///
/// Always answers 200 so the endpoint does not reveal which addresses exist.
async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = UserRepository::new((*state.db).clone())
        .find_by_email(&payload.email)
        .await?
        .filter(|u| u.is_active);

    if let Some(user) = user {
        let token = PasswordResetRepository::new((*state.db).clone())
            .issue(user.id)
            .await?;
        let email_service = state.email_service.clone();
        tokio::spawn(async move {
            if let Err(e) = email_service
                .send_password_reset_email(&user.email, &user.full_name, &token.raw)
                .await
            {
                warn!(user_id = %user.id, error = %e, "Failed to send password reset email");
            }
        });
        info!(user_id = %user.id, "Password reset requested");
    }

    Ok(Json(MessageResponse::new(
        "If the address is registered, a reset link has been sent",
    )))
}

/// POST /auth/reset-password - Consume a reset token and set a new password.
async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_password_length(&payload.new_password)?;

    let password_hash = hash_password(&payload.new_password)?;
    let user_id = PasswordResetRepository::new((*state.db).clone())
        .reset_password(payload.token.trim(), &password_hash)
        .await?;

    info!(user_id = %user_id, "Password reset");
    Ok(Json(MessageResponse::new("Password has been reset")))
}

/// POST /auth/change-password - Change the signed-in user's password.
async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(payload): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_password_length(&payload.new_password)?;

    let user_repo = UserRepository::new((*state.db).clone());
    let user = user_repo
        .find_by_id(auth.user_id())
        .await?
        .ok_or_else(|| ApiError::unauthorized("UNAUTHORIZED", "Authentication required"))?;

    if !verify_password(&payload.current_password, &user.password_hash)? {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_PASSWORD",
            "Current password is incorrect",
        ));
    }

    let password_hash = hash_password(&payload.new_password)?;
    user_repo.update_password(user.id, &password_hash).await?;

    info!(user_id = %user.id, "Password changed");
    Ok(Json(MessageResponse::new("Password has been changed")))
}
