//! HTTP error responses.
//!
//! Every handler returns `Result<_, ApiError>`. Domain and repository errors
//! convert into an [`ApiError`] carrying the status, a machine-readable code
//! and a message; the body is always `{"error": code, "message": text}`.
//! Database failures are logged and answered with a generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde_json::json;
use tracing::error;
use validator::ValidationErrors;

use apotik_core::access::AccessError;
use apotik_core::auth::PasswordError;
use apotik_core::party::PartyError;
use apotik_core::procurement::ProcurementError;
use apotik_core::stock::StockError;
use apotik_db::repositories::{
    CustomerError, DrugError, OrganizationError, PasswordResetError, PharmacyError,
    PurchaseOrderError, RoleError, StockLedgerError, SupplierError, UserError,
};
use apotik_shared::{AppError, JwtError};

/// An error answered to the client.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Creates an error with an explicit status and code.
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// 401 with the given code.
    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, message)
    }

    /// 404 `NOT_FOUND`.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// 400 `VALIDATION_ERROR`.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    /// 409 with the given code.
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    /// 500 `INTERNAL_ERROR`; the detail is logged, not returned.
    pub fn internal(detail: &impl std::fmt::Display) -> Self {
        error!(error = %detail, "Request failed");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "An internal error occurred",
        )
    }

    /// Status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    fn from_parts(status: u16, code: &'static str, message: String) -> Self {
        Self::new(
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            code,
            message,
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": self.code,
                "message": self.message,
            })),
        )
            .into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        if matches!(e, AppError::Database(_) | AppError::Internal(_)) {
            error!(error = %e, "Request failed");
        }
        Self::from_parts(e.status_code(), e.error_code(), e.public_message())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(e: ValidationErrors) -> Self {
        AppError::from(e).into()
    }
}

impl From<DbErr> for ApiError {
    fn from(e: DbErr) -> Self {
        Self::internal(&e)
    }
}

impl From<JwtError> for ApiError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::Expired => Self::unauthorized("TOKEN_EXPIRED", "Token has expired"),
            JwtError::Invalid | JwtError::DecodingError(_) => {
                Self::unauthorized("INVALID_TOKEN", "Invalid or malformed token")
            }
            JwtError::EncodingError(_) => Self::internal(&e),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(e: AccessError) -> Self {
        Self::from_parts(e.status_code(), e.error_code(), e.to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::TooShort => {
                Self::from_parts(e.status_code(), e.error_code(), e.to_string())
            }
            _ => Self::internal(&e),
        }
    }
}

impl From<PartyError> for ApiError {
    fn from(e: PartyError) -> Self {
        Self::from_parts(e.status_code(), e.error_code(), e.to_string())
    }
}

impl From<StockError> for ApiError {
    fn from(e: StockError) -> Self {
        Self::from_parts(e.status_code(), e.error_code(), e.to_string())
    }
}

impl From<ProcurementError> for ApiError {
    fn from(e: ProcurementError) -> Self {
        Self::from_parts(e.status_code(), e.error_code(), e.to_string())
    }
}

impl From<OrganizationError> for ApiError {
    fn from(e: OrganizationError) -> Self {
        match e {
            OrganizationError::DuplicateCode(_) => Self::conflict("DUPLICATE_CODE", e.to_string()),
            OrganizationError::InvalidCode(e) => e.into(),
            OrganizationError::Fiscal(_) => {
                Self::new(StatusCode::BAD_REQUEST, "INVALID_FISCAL_SETTINGS", e.to_string())
            }
            OrganizationError::NotFound(_) => Self::not_found(e.to_string()),
            OrganizationError::Database(e) => e.into(),
        }
    }
}

impl From<UserError> for ApiError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::DuplicateEmail(_) => Self::conflict("EMAIL_EXISTS", e.to_string()),
            UserError::NotFound(_) => Self::not_found(e.to_string()),
            UserError::Database(e) => e.into(),
        }
    }
}

impl From<PasswordResetError> for ApiError {
    fn from(e: PasswordResetError) -> Self {
        match e {
            PasswordResetError::InvalidToken => {
                Self::new(StatusCode::BAD_REQUEST, "INVALID_TOKEN", e.to_string())
            }
            PasswordResetError::Expired => {
                Self::new(StatusCode::BAD_REQUEST, "TOKEN_EXPIRED", e.to_string())
            }
            PasswordResetError::AlreadyUsed => {
                Self::new(StatusCode::BAD_REQUEST, "TOKEN_USED", e.to_string())
            }
            PasswordResetError::Database(e) => e.into(),
        }
    }
}

impl From<PharmacyError> for ApiError {
    fn from(e: PharmacyError) -> Self {
        match e {
            PharmacyError::DuplicateCode(_) => Self::conflict("DUPLICATE_CODE", e.to_string()),
            PharmacyError::MainWarehouseExists => {
                Self::conflict("MAIN_WAREHOUSE_EXISTS", e.to_string())
            }
            PharmacyError::InvalidCode(e) => e.into(),
            PharmacyError::NotFound(_) => Self::not_found(e.to_string()),
            PharmacyError::Database(e) => e.into(),
        }
    }
}

impl From<DrugError> for ApiError {
    fn from(e: DrugError) -> Self {
        match e {
            DrugError::DuplicateCode(_) => Self::conflict("DUPLICATE_CODE", e.to_string()),
            DrugError::InvalidCode(e) => e.into(),
            DrugError::NotFound(_) => Self::not_found(e.to_string()),
            DrugError::Database(e) => e.into(),
        }
    }
}

impl From<SupplierError> for ApiError {
    fn from(e: SupplierError) -> Self {
        match e {
            SupplierError::DuplicateCode(_) => Self::conflict("DUPLICATE_CODE", e.to_string()),
            SupplierError::Invalid(e) => e.into(),
            SupplierError::NotFound(_) => Self::not_found(e.to_string()),
            SupplierError::Database(e) => e.into(),
        }
    }
}

impl From<CustomerError> for ApiError {
    fn from(e: CustomerError) -> Self {
        match e {
            CustomerError::DuplicateCode(_) => Self::conflict("DUPLICATE_CODE", e.to_string()),
            CustomerError::Invalid(e) => e.into(),
            CustomerError::NotFound(_) => Self::not_found(e.to_string()),
            CustomerError::Database(e) => e.into(),
        }
    }
}

impl From<RoleError> for ApiError {
    fn from(e: RoleError) -> Self {
        match e {
            RoleError::DuplicateName(_) => Self::conflict("DUPLICATE_NAME", e.to_string()),
            RoleError::NotFound(_) | RoleError::UserNotFound(_) => Self::not_found(e.to_string()),
            RoleError::PharmacyNotInOrganization(_) => Self::new(
                StatusCode::BAD_REQUEST,
                "PHARMACY_NOT_IN_ORGANIZATION",
                e.to_string(),
            ),
            RoleError::Database(e) => e.into(),
        }
    }
}

impl From<StockLedgerError> for ApiError {
    fn from(e: StockLedgerError) -> Self {
        match e {
            StockLedgerError::Stock(e) => e.into(),
            StockLedgerError::Organization(e) => e.into(),
            StockLedgerError::StockLineNotFound
            | StockLedgerError::PharmacyNotFound(_)
            | StockLedgerError::DrugNotFound(_) => Self::not_found(e.to_string()),
            StockLedgerError::Constraint(_) => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "CONSTRAINT_VIOLATION",
                e.to_string(),
            ),
            StockLedgerError::Database(e) => e.into(),
        }
    }
}

impl From<PurchaseOrderError> for ApiError {
    fn from(e: PurchaseOrderError) -> Self {
        match e {
            PurchaseOrderError::Procurement(e) => e.into(),
            PurchaseOrderError::Stock(e) => e.into(),
            PurchaseOrderError::Supplier(e) => e.into(),
            PurchaseOrderError::DuplicateCode(_) => {
                Self::conflict("DUPLICATE_CODE", e.to_string())
            }
            PurchaseOrderError::InvalidCode(e) => e.into(),
            PurchaseOrderError::NotFound(_) => Self::not_found(e.to_string()),
            PurchaseOrderError::SupplierNotFound(_)
            | PurchaseOrderError::PharmacyNotFound(_)
            | PurchaseOrderError::DrugNotFound(_) => Self::new(
                StatusCode::BAD_REQUEST,
                "UNKNOWN_REFERENCE",
                e.to_string(),
            ),
            PurchaseOrderError::Constraint(_) => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "CONSTRAINT_VIOLATION",
                e.to_string(),
            ),
            PurchaseOrderError::Database(e) => e.into(),
        }
    }
}
