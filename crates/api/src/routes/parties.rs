//! Supplier and customer routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{AppState, error::ApiError, extractors::ValidatedJson, middleware::Principal};
use apotik_core::permission::Permission;
use apotik_db::{
    CustomerRepository, SupplierRepository,
    repositories::{CreateCustomerInput, CreateSupplierInput},
};

/// Creates the supplier and customer routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/suppliers", get(list_suppliers).post(create_supplier))
        .route("/suppliers/{supplier_id}", get(get_supplier))
        .route("/suppliers/{supplier_id}/balance", post(adjust_supplier_balance))
        .route("/customers", get(list_customers).post(create_customer))
        .route("/customers/{customer_id}", get(get_customer))
        .route("/customers/{customer_id}/balance", post(adjust_customer_balance))
}

/// Request body for creating a supplier.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSupplierRequest {
    /// Code, unique within the organization.
    #[validate(length(min = 1, max = 50, message = "Code is required"))]
    pub code: String,
    /// Name.
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    /// Contact person.
    pub contact_person: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// E-mail address.
    #[validate(email(message = "A valid email is required"))]
    pub email: Option<String>,
    /// Street address.
    pub address: Option<String>,
}

/// Request body for creating a customer.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    /// Optional code, unique within the organization when present.
    #[validate(length(max = 50))]
    pub code: Option<String>,
    /// Name.
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    /// Phone number.
    pub phone: Option<String>,
    /// E-mail address.
    #[validate(email(message = "A valid email is required"))]
    pub email: Option<String>,
    /// Street address.
    pub address: Option<String>,
}

/// Request body for a manual balance correction.
#[derive(Debug, Deserialize, Validate)]
pub struct AdjustBalanceRequest {
    /// Signed amount added to the current balance.
    #[validate(custom(function = "crate::routes::validate_amount"))]
    pub delta: Decimal,
}

/// GET /suppliers
async fn list_suppliers(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::SupplierRead, None)?;
    let suppliers = SupplierRepository::new((*state.db).clone())
        .list(principal.organization_id())
        .await?;
    Ok(Json(json!({ "suppliers": suppliers })))
}

/// POST /suppliers
async fn create_supplier(
    State(state): State<AppState>,
    principal: Principal,
    ValidatedJson(payload): ValidatedJson<CreateSupplierRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::SupplierCreate, None)?;

    let supplier = SupplierRepository::new((*state.db).clone())
        .create(
            principal.organization_id(),
            CreateSupplierInput {
                code: payload.code,
                name: payload.name,
                contact_person: payload.contact_person,
                phone: payload.phone,
                email: payload.email,
                address: payload.address,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(supplier)))
}

/// GET /suppliers/{supplier_id}
async fn get_supplier(
    State(state): State<AppState>,
    principal: Principal,
    Path(supplier_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::SupplierRead, None)?;
    let supplier = SupplierRepository::new((*state.db).clone())
        .find(principal.organization_id(), supplier_id)
        .await?;
    Ok(Json(supplier))
}

/// POST /suppliers/{supplier_id}/balance - Correct the payable.
async fn adjust_supplier_balance(
    State(state): State<AppState>,
    principal: Principal,
    Path(supplier_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<AdjustBalanceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::SupplierUpdate, None)?;
    let supplier = SupplierRepository::new((*state.db).clone())
        .adjust_balance(principal.organization_id(), supplier_id, payload.delta)
        .await?;

    info!(
        user_id = %principal.user_id(),
        supplier_id = %supplier.id,
        delta = %payload.delta,
        "Supplier balance adjusted"
    );
    Ok(Json(supplier))
}

/// GET /customers
async fn list_customers(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::CustomerRead, None)?;
    let customers = CustomerRepository::new((*state.db).clone())
        .list(principal.organization_id())
        .await?;
    Ok(Json(json!({ "customers": customers })))
}

/// POST /customers
async fn create_customer(
    State(state): State<AppState>,
    principal: Principal,
    ValidatedJson(payload): ValidatedJson<CreateCustomerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::CustomerCreate, None)?;

    let customer = CustomerRepository::new((*state.db).clone())
        .create(
            principal.organization_id(),
            CreateCustomerInput {
                code: payload.code,
                name: payload.name,
                phone: payload.phone,
                email: payload.email,
                address: payload.address,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(customer)))
}

/// GET /customers/{customer_id}
async fn get_customer(
    State(state): State<AppState>,
    principal: Principal,
    Path(customer_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::CustomerRead, None)?;
    let customer = CustomerRepository::new((*state.db).clone())
        .find(principal.organization_id(), customer_id)
        .await?;
    Ok(Json(customer))
}

/// POST /customers/{customer_id}/balance - Correct the receivable.
async fn adjust_customer_balance(
    State(state): State<AppState>,
    principal: Principal,
    Path(customer_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<AdjustBalanceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::CustomerUpdate, None)?;
    let customer = CustomerRepository::new((*state.db).clone())
        .adjust_balance(principal.organization_id(), customer_id, payload.delta)
        .await?;

    info!(
        user_id = %principal.user_id(),
        customer_id = %customer.id,
        delta = %payload.delta,
        "Customer balance adjusted"
    );
    Ok(Json(customer))
}
