//! Validation rules of the authentication DTOs.

use chrono::{Duration, Utc};
use rstest::rstest;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{
    ChangePasswordRequest, Claims, ForgotPasswordRequest, LoginRequest, RegisterRequest,
    ResetPasswordRequest, TokenKind,
};

#[rstest]
#[case("", "secret1", false)]
#[case("abc", "12345", false)]
#[case("abc", "123456", true)]
#[case("a", "a-much-longer-password", true)]
fn test_reset_password_rules(#[case] token: &str, #[case] password: &str, #[case] ok: bool) {
    let req = ResetPasswordRequest {
        token: token.to_string(),
        new_password: password.to_string(),
    };
    assert_eq!(req.validate().is_ok(), ok);
}

#[test]
fn test_reset_password_reports_each_field() {
    let req = ResetPasswordRequest {
        token: String::new(),
        new_password: "abc".to_string(),
    };
    let errors = req.validate().unwrap_err();
    let fields = errors.field_errors();
    assert!(fields.contains_key("token"));
    assert!(fields.contains_key("new_password"));
}

#[test]
fn test_reset_password_rejects_missing_fields_at_deserialization() {
    let result: Result<ResetPasswordRequest, _> =
        serde_json::from_value(json!({ "token": "abc" }));
    assert!(result.is_err());
}

#[test]
fn test_change_password_requires_current_password() {
    let req = ChangePasswordRequest {
        current_password: String::new(),
        new_password: "longenough".to_string(),
    };
    assert!(req.validate().is_err());
}

#[test]
fn test_register_requires_token_and_email() {
    let req = RegisterRequest {
        organization_token: String::new(),
        email: "not-an-email".to_string(),
        password: "secret123".to_string(),
        full_name: "Dewi".to_string(),
    };
    let errors = req.validate().unwrap_err();
    let fields = errors.field_errors();
    assert!(fields.contains_key("organization_token"));
    assert!(fields.contains_key("email"));
    assert!(!fields.contains_key("password"));
}

#[test]
fn test_login_and_forgot_password_email() {
    let login = LoginRequest {
        email: "apoteker@example.com".to_string(),
        password: "x".to_string(),
    };
    assert!(login.validate().is_ok());

    let forgot = ForgotPasswordRequest {
        email: "nope".to_string(),
    };
    assert!(forgot.validate().is_err());
}

#[test]
fn test_claims_accessors() {
    let user = Uuid::new_v4();
    let org = Uuid::new_v4();
    let expires_at = Utc::now() + Duration::minutes(30);
    let claims = Claims::new(user, org, TokenKind::Refresh, expires_at);

    assert_eq!(claims.user_id(), user);
    assert_eq!(claims.organization_id(), org);
    assert_eq!(claims.kind, TokenKind::Refresh);
    assert_eq!(claims.exp, expires_at.timestamp());
    assert!(claims.iat <= claims.exp);
}
