//! Stock ledger routes.
//!
//! Every stock route is checked against the pharmacy it touches; a transfer
//! needs `inventory:transfer` on both ends.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState, error::ApiError, extractors::ValidatedJson, middleware::Principal,
    routes::page_request,
};
use apotik_core::permission::Permission;
use apotik_core::stock::MovementKind;
use apotik_db::{
    OrganizationRepository, StockRepository,
    repositories::{DispenseInput, MovementFilter, PostMovementInput, TransferInput},
};
use apotik_shared::types::PageResponse;

/// Creates the stock routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pharmacies/{pharmacy_id}/stock", get(list_stock))
        .route("/pharmacies/{pharmacy_id}/stock/fefo", get(fefo_order))
        .route(
            "/pharmacies/{pharmacy_id}/stock/movements",
            get(list_movements).post(post_movement),
        )
        .route("/pharmacies/{pharmacy_id}/stock/dispense", post(dispense))
        .route("/stock/transfers", post(transfer))
        .route("/stock/{stock_id}/quarantine", patch(set_quarantine))
}

// ============================================================================
// Request Types
// ============================================================================

/// Query parameters for the stock list.
#[derive(Debug, Deserialize)]
pub struct ListStockQuery {
    /// Only this drug.
    pub drug_id: Option<Uuid>,
}

/// Query parameters for the FEFO order.
#[derive(Debug, Deserialize)]
pub struct FefoQuery {
    /// Drug to pick.
    pub drug_id: Uuid,
    /// Expiry reference date; defaults to today in the organization's time zone.
    pub as_of: Option<NaiveDate>,
}

/// Query parameters for the movement history.
#[derive(Debug, Deserialize)]
pub struct ListMovementsQuery {
    /// Only this drug.
    pub drug_id: Option<Uuid>,
    /// Only this kind, e.g. `SALE`.
    pub kind: Option<String>,
    /// Page number (1-indexed).
    pub page: Option<u32>,
    /// Page size.
    pub per_page: Option<u32>,
}

/// Request body for posting a movement.
#[derive(Debug, Deserialize, Validate)]
pub struct PostMovementRequest {
    /// Drug.
    pub drug_id: Uuid,
    /// Batch number.
    #[validate(length(min = 1, max = 100, message = "Batch number is required"))]
    pub batch_number: String,
    /// Movement kind, e.g. `PURCHASE` or `ADJUSTMENT`.
    pub kind: MovementKind,
    /// Quantity in stock units.
    #[validate(custom(function = "crate::routes::validate_amount"))]
    pub quantity: Decimal,
    /// Cost per stock unit of inbound goods.
    #[validate(custom(function = "crate::routes::validate_amount"))]
    pub incoming_rate: Option<Decimal>,
    /// Expiry of a new batch.
    pub expiry_date: Option<NaiveDate>,
    /// Selling price of a new batch.
    #[validate(custom(function = "crate::routes::validate_amount"))]
    pub selling_price: Option<Decimal>,
    /// Posting time; defaults to now.
    pub posting_datetime: Option<DateTime<Utc>>,
    /// Source document type.
    #[validate(length(max = 50))]
    pub reference_type: Option<String>,
    /// Source document id.
    pub reference_id: Option<Uuid>,
    /// Free text.
    pub remarks: Option<String>,
}

/// Request body for dispensing by FEFO.
#[derive(Debug, Deserialize, Validate)]
pub struct DispenseRequest {
    /// Drug.
    pub drug_id: Uuid,
    /// Quantity in stock units.
    #[validate(custom(function = "crate::routes::validate_amount"))]
    pub quantity: Decimal,
    /// Posting time; defaults to now.
    pub posting_datetime: Option<DateTime<Utc>>,
    /// Source document type.
    #[validate(length(max = 50))]
    pub reference_type: Option<String>,
    /// Source document id.
    pub reference_id: Option<Uuid>,
    /// Free text.
    pub remarks: Option<String>,
}

/// Request body for a transfer.
#[derive(Debug, Deserialize, Validate)]
pub struct TransferRequest {
    /// Stock line to take from.
    pub source_stock_id: Uuid,
    /// Receiving pharmacy.
    pub destination_pharmacy_id: Uuid,
    /// Quantity in stock units.
    #[validate(custom(function = "crate::routes::validate_amount"))]
    pub quantity: Decimal,
    /// Posting time; defaults to now.
    pub posting_datetime: Option<DateTime<Utc>>,
    /// Free text.
    pub remarks: Option<String>,
}

/// Request body for quarantining a batch.
#[derive(Debug, Deserialize, Validate)]
pub struct QuarantineRequest {
    /// New flag.
    pub quarantined: bool,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /pharmacies/{pharmacy_id}/stock
async fn list_stock(
    State(state): State<AppState>,
    principal: Principal,
    Path(pharmacy_id): Path<Uuid>,
    Query(query): Query<ListStockQuery>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::InventoryRead, Some(pharmacy_id))?;

    let stock = StockRepository::new((*state.db).clone())
        .list_stock(principal.organization_id(), pharmacy_id, query.drug_id)
        .await?;

    Ok(Json(json!({ "stock": stock })))
}

/// GET /pharmacies/{pharmacy_id}/stock/fefo - Batches in picking order.
async fn fefo_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(pharmacy_id): Path<Uuid>,
    Query(query): Query<FefoQuery>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::InventoryRead, Some(pharmacy_id))?;
    let org_id = principal.organization_id();

    let as_of = match query.as_of {
        Some(date) => date,
        None => OrganizationRepository::new((*state.db).clone())
            .fiscal_calendar(org_id)
            .await?
            .local_date(Utc::now()),
    };

    let lines = StockRepository::new((*state.db).clone())
        .fefo_lines(org_id, pharmacy_id, query.drug_id, as_of)
        .await?;

    Ok(Json(json!({ "as_of": as_of, "stock": lines })))
}

/// GET /pharmacies/{pharmacy_id}/stock/movements - Movement history, newest first.
async fn list_movements(
    State(state): State<AppState>,
    principal: Principal,
    Path(pharmacy_id): Path<Uuid>,
    Query(query): Query<ListMovementsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::InventoryRead, Some(pharmacy_id))?;

    let kind = match query.kind.as_deref() {
        None => None,
        Some(s) => Some(
            MovementKind::parse(s)
                .ok_or_else(|| ApiError::validation(format!("Unknown movement kind '{s}'")))?,
        ),
    };
    let filter = MovementFilter {
        drug_id: query.drug_id,
        kind,
    };
    let page = page_request(query.page, query.per_page);

    let (movements, total) = StockRepository::new((*state.db).clone())
        .list_movements(principal.organization_id(), pharmacy_id, filter, page)
        .await?;

    Ok(Json(PageResponse::new(movements, page, total)))
}

/// POST /pharmacies/{pharmacy_id}/stock/movements - Post one movement.
async fn post_movement(
    State(state): State<AppState>,
    principal: Principal,
    Path(pharmacy_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<PostMovementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(payload.kind.required_permission(), Some(pharmacy_id))?;

    let input = PostMovementInput {
        incoming_rate: payload.incoming_rate,
        expiry_date: payload.expiry_date,
        selling_price: payload.selling_price,
        posting_datetime: payload.posting_datetime,
        reference_type: payload.reference_type,
        reference_id: payload.reference_id,
        remarks: payload.remarks,
        created_by: Some(principal.user_id()),
        ..PostMovementInput::new(
            pharmacy_id,
            payload.drug_id,
            payload.batch_number,
            payload.kind,
            payload.quantity,
        )
    };

    let posted = StockRepository::new((*state.db).clone())
        .post_movement(principal.organization_id(), input)
        .await?;

    Ok((StatusCode::CREATED, Json(posted)))
}

/// POST /pharmacies/{pharmacy_id}/stock/dispense - Sell by FEFO.
async fn dispense(
    State(state): State<AppState>,
    principal: Principal,
    Path(pharmacy_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<DispenseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Permission::SalesInvoiceCreate, Some(pharmacy_id))?;

    let movements = StockRepository::new((*state.db).clone())
        .dispense_fefo(
            principal.organization_id(),
            DispenseInput {
                pharmacy_id,
                drug_id: payload.drug_id,
                quantity: payload.quantity,
                posting_datetime: payload.posting_datetime,
                reference_type: payload.reference_type,
                reference_id: payload.reference_id,
                remarks: payload.remarks,
                created_by: Some(principal.user_id()),
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "movements": movements }))))
}

/// POST /stock/transfers - Move a batch to another pharmacy.
async fn transfer(
    State(state): State<AppState>,
    principal: Principal,
    ValidatedJson(payload): ValidatedJson<TransferRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let org_id = principal.organization_id();
    let repo = StockRepository::new((*state.db).clone());

    let source = repo.find(org_id, payload.source_stock_id).await?;
    principal.require(Permission::InventoryTransfer, Some(source.pharmacy_id))?;
    principal.require(
        Permission::InventoryTransfer,
        Some(payload.destination_pharmacy_id),
    )?;

    let result = repo
        .transfer(
            org_id,
            TransferInput {
                source_stock_id: payload.source_stock_id,
                destination_pharmacy_id: payload.destination_pharmacy_id,
                quantity: payload.quantity,
                posting_datetime: payload.posting_datetime,
                remarks: payload.remarks,
                created_by: Some(principal.user_id()),
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(result)))
}

/// PATCH /stock/{stock_id}/quarantine - Hold or release a batch.
async fn set_quarantine(
    State(state): State<AppState>,
    principal: Principal,
    Path(stock_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<QuarantineRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let org_id = principal.organization_id();
    let repo = StockRepository::new((*state.db).clone());

    let line = repo.find(org_id, stock_id).await?;
    principal.require(Permission::InventoryQuarantine, Some(line.pharmacy_id))?;

    let line = repo
        .set_quarantine(org_id, stock_id, payload.quarantined)
        .await?;

    Ok(Json(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_amounts_are_bounded() {
        let drug_id = Uuid::new_v4();
        let ok: PostMovementRequest = serde_json::from_value(json!({
            "drug_id": drug_id,
            "batch_number": "B-1",
            "kind": "PURCHASE",
            "quantity": "999999999999999.9999",
            "incoming_rate": "0",
        }))
        .unwrap();
        assert!(ok.validate().is_ok());

        let too_many: PostMovementRequest = serde_json::from_value(json!({
            "drug_id": drug_id,
            "batch_number": "B-1",
            "kind": "PURCHASE",
            "quantity": 1_000_000_000_000_000_u64,
        }))
        .unwrap();
        let errors = too_many.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("quantity"));

        let dear: PostMovementRequest = serde_json::from_value(json!({
            "drug_id": drug_id,
            "batch_number": "B-1",
            "kind": "PURCHASE",
            "quantity": 1,
            "incoming_rate": "79228162514264337593543950335",
        }))
        .unwrap();
        assert!(dear.validate().unwrap_err().field_errors().contains_key("incoming_rate"));
    }

    #[test]
    fn test_dispense_and_transfer_quantities_are_bounded() {
        let dispense: DispenseRequest = serde_json::from_value(json!({
            "drug_id": Uuid::new_v4(),
            "quantity": "-79228162514264337593543950335",
        }))
        .unwrap();
        assert!(dispense.validate().is_err());

        let transfer: TransferRequest = serde_json::from_value(json!({
            "source_stock_id": Uuid::new_v4(),
            "destination_pharmacy_id": Uuid::new_v4(),
            "quantity": "5000000000000000",
        }))
        .unwrap();
        assert!(transfer.validate().is_err());
    }
}
