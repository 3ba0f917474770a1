//! Purchase order routes.
//!
//! Permissions are checked against the receiving pharmacy of the order.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState, error::ApiError, extractors::ValidatedJson, middleware::Principal,
    routes::page_request,
};
use apotik_core::access::PharmacyScope;
use apotik_core::permission::Permission;
use apotik_core::procurement::{LineQuantity, PurchaseOrderStatus};
use apotik_db::{
    PurchaseOrderRepository,
    repositories::{
        CreatePurchaseOrderInput, PurchaseOrderFilter, PurchaseOrderItemInput,
        PurchaseOrderWithItems, ReceiptLineInput, ReceiveInput, UpdatePurchaseOrderInput,
    },
};
use apotik_shared::types::PageResponse;

/// Creates the purchase order routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/purchase-orders", get(list_orders).post(create_order))
        .route(
            "/purchase-orders/{order_id}",
            get(get_order).put(update_order).delete(delete_order),
        )
        .route("/purchase-orders/{order_id}/submit", post(submit_order))
        .route("/purchase-orders/{order_id}/cancel", post(cancel_order))
        .route("/purchase-orders/{order_id}/close", post(close_order))
        .route("/purchase-orders/{order_id}/amend", post(amend_order))
        .route("/purchase-orders/{order_id}/receive", post(receive_order))
        .route("/purchase-orders/{order_id}/invoice", post(invoice_order))
}

// ============================================================================
// Request Types
// ============================================================================

/// Query parameters for listing orders.
#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    /// Filter by status, e.g. `SUBMITTED`.
    pub status: Option<String>,
    /// Filter by supplier.
    pub supplier_id: Option<Uuid>,
    /// Filter by receiving pharmacy.
    pub pharmacy_id: Option<Uuid>,
    /// Page number (1-indexed).
    pub page: Option<u32>,
    /// Page size.
    pub per_page: Option<u32>,
}

/// One order line.
#[derive(Debug, Deserialize, Validate)]
pub struct OrderItemRequest {
    /// Drug ordered.
    pub drug_id: Uuid,
    /// Quantity in order units.
    #[validate(custom(function = "crate::routes::validate_amount"))]
    pub quantity: Decimal,
    /// Price per order unit.
    #[validate(custom(function = "crate::routes::validate_amount"))]
    pub unit_price: Decimal,
    /// Order unit; defaults to the drug's stock unit.
    #[validate(length(min = 1, max = 20))]
    pub uom: Option<String>,
    /// Stock units per order unit; defaults to 1.
    #[validate(custom(function = "crate::routes::validate_amount"))]
    pub conversion_factor: Option<Decimal>,
}

impl From<OrderItemRequest> for PurchaseOrderItemInput {
    fn from(item: OrderItemRequest) -> Self {
        Self {
            drug_id: item.drug_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            uom: item.uom,
            conversion_factor: item.conversion_factor,
        }
    }
}

/// Request body for creating a draft.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    /// Supplier.
    pub supplier_id: Uuid,
    /// Receiving pharmacy.
    pub pharmacy_id: Uuid,
    /// Code, unique within the organization.
    #[validate(length(min = 1, max = 50, message = "Code is required"))]
    pub code: String,
    /// Order date.
    pub order_date: NaiveDate,
    /// Expected delivery date.
    pub expected_date: Option<NaiveDate>,
    /// Free text.
    pub remarks: Option<String>,
    /// Lines.
    #[validate(nested)]
    pub items: Vec<OrderItemRequest>,
}

/// Request body replacing a draft.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrderRequest {
    /// Supplier.
    pub supplier_id: Uuid,
    /// Receiving pharmacy.
    pub pharmacy_id: Uuid,
    /// Order date.
    pub order_date: NaiveDate,
    /// Expected delivery date.
    pub expected_date: Option<NaiveDate>,
    /// Free text.
    pub remarks: Option<String>,
    /// Lines; replace every existing line.
    #[validate(nested)]
    pub items: Vec<OrderItemRequest>,
}

/// One received line.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ReceiptLineRequest {
    /// Order item.
    pub item_id: Uuid,
    /// Quantity in order units.
    #[validate(custom(function = "crate::routes::validate_amount"))]
    pub quantity: Decimal,
    /// Batch the goods arrived in.
    #[validate(length(min = 1, max = 100, message = "Batch number is required"))]
    pub batch_number: String,
    /// Batch expiry.
    pub expiry_date: Option<NaiveDate>,
    /// Selling price per stock unit for a new batch.
    #[validate(custom(function = "crate::routes::validate_amount"))]
    pub selling_price: Option<Decimal>,
}

/// Request body for a goods receipt.
#[derive(Debug, Deserialize, Validate)]
pub struct ReceiveRequest {
    /// Received lines.
    #[validate(length(min = 1, message = "At least one line is required"), nested)]
    pub lines: Vec<ReceiptLineRequest>,
    /// Posting time; defaults to now.
    pub posting_datetime: Option<DateTime<Utc>>,
    /// Free text copied to the movements.
    pub remarks: Option<String>,
}

/// Request body for a supplier invoice.
#[derive(Debug, Deserialize, Validate)]
pub struct InvoiceRequest {
    /// Invoiced quantities per item.
    #[validate(length(min = 1, message = "At least one line is required"))]
    pub lines: Vec<LineQuantity>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Loads an order and checks the permission on its pharmacy.
async fn authorized_order(
    repo: &PurchaseOrderRepository,
    principal: &Principal,
    order_id: Uuid,
    permission: Permission,
) -> Result<PurchaseOrderWithItems, ApiError> {
    let order = repo.find(principal.organization_id(), order_id).await?;
    principal.require(permission, Some(order.order.pharmacy_id))?;
    Ok(order)
}

/// GET /purchase-orders
async fn list_orders(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::PurchaseOrderRead, query.pharmacy_id)?;

    let status = match query.status.as_deref() {
        None => None,
        Some(s) => Some(
            PurchaseOrderStatus::parse(s)
                .ok_or_else(|| ApiError::validation(format!("Unknown status '{s}'")))?,
        ),
    };
    let pharmacy_ids = match principal.access.pharmacy_scope(Permission::PurchaseOrderRead) {
        PharmacyScope::All => None,
        PharmacyScope::Only(ids) => Some(ids),
    };
    let filter = PurchaseOrderFilter {
        status,
        supplier_id: query.supplier_id,
        pharmacy_id: query.pharmacy_id,
        pharmacy_ids,
    };
    let page = page_request(query.page, query.per_page);

    let (orders, total) = PurchaseOrderRepository::new((*state.db).clone())
        .list(principal.organization_id(), filter, page)
        .await?;

    Ok(Json(PageResponse::new(orders, page, total)))
}

/// POST /purchase-orders - Create a draft.
async fn create_order(
    State(state): State<AppState>,
    principal: Principal,
    ValidatedJson(payload): ValidatedJson<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::PurchaseOrderCreate, Some(payload.pharmacy_id))?;

    let order = PurchaseOrderRepository::new((*state.db).clone())
        .create_draft(
            principal.organization_id(),
            CreatePurchaseOrderInput {
                supplier_id: payload.supplier_id,
                pharmacy_id: payload.pharmacy_id,
                code: payload.code,
                order_date: payload.order_date,
                expected_date: payload.expected_date,
                remarks: payload.remarks,
                items: payload.items.into_iter().map(Into::into).collect(),
                created_by: Some(principal.user_id()),
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /purchase-orders/{order_id}
async fn get_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = PurchaseOrderRepository::new((*state.db).clone());
    let order = authorized_order(&repo, &principal, order_id, Permission::PurchaseOrderRead).await?;
    Ok(Json(order))
}

/// PUT /purchase-orders/{order_id} - Replace a draft.
async fn update_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = PurchaseOrderRepository::new((*state.db).clone());
    authorized_order(&repo, &principal, order_id, Permission::PurchaseOrderUpdate).await?;
    principal.require(Permission::PurchaseOrderUpdate, Some(payload.pharmacy_id))?;

    let order = repo
        .update_draft(
            principal.organization_id(),
            order_id,
            UpdatePurchaseOrderInput {
                supplier_id: payload.supplier_id,
                pharmacy_id: payload.pharmacy_id,
                order_date: payload.order_date,
                expected_date: payload.expected_date,
                remarks: payload.remarks,
                items: payload.items.into_iter().map(Into::into).collect(),
            },
        )
        .await?;

    Ok(Json(order))
}

/// DELETE /purchase-orders/{order_id} - Delete a draft.
async fn delete_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = PurchaseOrderRepository::new((*state.db).clone());
    authorized_order(&repo, &principal, order_id, Permission::PurchaseOrderDelete).await?;

    repo.delete_draft(principal.organization_id(), order_id)
        .await?;

    info!(user_id = %principal.user_id(), order_id = %order_id, "Draft purchase order deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /purchase-orders/{order_id}/submit
async fn submit_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = PurchaseOrderRepository::new((*state.db).clone());
    authorized_order(&repo, &principal, order_id, Permission::PurchaseOrderSubmit).await?;

    let order = repo
        .submit(principal.organization_id(), order_id, principal.user_id())
        .await?;
    Ok(Json(order))
}

/// POST /purchase-orders/{order_id}/cancel
async fn cancel_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = PurchaseOrderRepository::new((*state.db).clone());
    authorized_order(&repo, &principal, order_id, Permission::PurchaseOrderCancel).await?;

    let order = repo
        .cancel(principal.organization_id(), order_id, principal.user_id())
        .await?;
    Ok(Json(order))
}

/// POST /purchase-orders/{order_id}/close - Stop expecting further receipts.
async fn close_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = PurchaseOrderRepository::new((*state.db).clone());
    authorized_order(&repo, &principal, order_id, Permission::PurchaseOrderUpdate).await?;

    let order = repo
        .close(principal.organization_id(), order_id, principal.user_id())
        .await?;
    Ok(Json(order))
}

/// POST /purchase-orders/{order_id}/amend - Copy into a new draft.
async fn amend_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = PurchaseOrderRepository::new((*state.db).clone());
    authorized_order(&repo, &principal, order_id, Permission::PurchaseOrderCreate).await?;

    let amendment = repo
        .amend(principal.organization_id(), order_id, principal.user_id())
        .await?;
    Ok((StatusCode::CREATED, Json(amendment)))
}

/// POST /purchase-orders/{order_id}/receive - Post a goods receipt.
async fn receive_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<ReceiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = PurchaseOrderRepository::new((*state.db).clone());
    authorized_order(&repo, &principal, order_id, Permission::PurchaseReceiptCreate).await?;

    let lines = payload
        .lines
        .into_iter()
        .map(|line| ReceiptLineInput {
            item_id: line.item_id,
            quantity: line.quantity,
            batch_number: line.batch_number,
            expiry_date: line.expiry_date,
            selling_price: line.selling_price,
        })
        .collect();

    let receipt = repo
        .receive(
            principal.organization_id(),
            order_id,
            ReceiveInput {
                lines,
                posting_datetime: payload.posting_datetime,
                remarks: payload.remarks,
                received_by: Some(principal.user_id()),
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST /purchase-orders/{order_id}/invoice - Record invoiced quantities.
async fn invoice_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<InvoiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = PurchaseOrderRepository::new((*state.db).clone());
    authorized_order(&repo, &principal, order_id, Permission::PurchaseInvoiceCreate).await?;

    let order = repo
        .invoice(principal.organization_id(), order_id, &payload.lines)
        .await?;
    Ok(Json(order))
}
