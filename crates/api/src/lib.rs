//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes under `/api/v1`
//! - Authentication middleware and the `Principal` extractor
//! - Validated JSON extraction
//! - The error body every route answers with

pub mod error;
pub mod extractors;
pub mod middleware;
pub mod routes;

use apotik_shared::{EmailService, JwtService};
use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// JWT service for token operations.
    pub jwt_service: Arc<JwtService>,
    /// Email service for sending emails.
    pub email_service: Arc<EmailService>,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use apotik_shared::{EmailConfig, JwtConfig};
    use axum::{
        body::Body,
        http::{Request, StatusCode, header::AUTHORIZATION},
    };
    use http_body_util::BodyExt;
    use rstest::rstest;
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    /// State backed by a disconnected database; only routes that fail before
    /// touching the database can be exercised with it.
    fn test_state() -> AppState {
        let jwt = JwtService::new(&JwtConfig {
            secret: "test-secret-key-that-is-long-enough".to_string(),
            access_token_expiry_secs: 900,
            refresh_token_expiry_secs: 3600,
        });
        AppState {
            db: Arc::new(DatabaseConnection::default()),
            jwt_service: Arc::new(jwt),
            email_service: Arc::new(EmailService::new(EmailConfig::default())),
        }
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[rstest]
    #[case("/api/v1/drugs")]
    #[case("/api/v1/organization")]
    #[case("/api/v1/purchase-orders")]
    #[tokio::test]
    async fn test_protected_route_without_token(#[case] uri: &str) {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["error"], "MISSING_TOKEN");
    }

    #[tokio::test]
    async fn test_protected_route_with_garbage_token() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::get("/api/v1/drugs")
                    .header(AUTHORIZATION, "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let state = test_state();
        let access = state
            .jwt_service
            .generate_access_token(Uuid::new_v4(), Uuid::new_v4())
            .unwrap();
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::post("/api/v1/auth/refresh")
                    .header("Content-Type", "application/json")
                    .body(Body::from(format!(r#"{{"refresh_token":"{access}"}}"#)))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn test_reset_password_validates_body() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::post("/api/v1/auth/reset-password")
                    .header("Content-Type", "application/json")
                    .body(Body::from(r#"{"token":"abc","new_password":"123"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_malformed_json_uses_error_body() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::post("/api/v1/auth/login")
                    .header("Content-Type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_health_reports_database_down() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["database"], "down");
    }
}
