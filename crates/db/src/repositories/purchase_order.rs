//! Purchase order repository.
//!
//! Status decisions come from [`ProcurementService`]; this module loads the
//! order under a row lock, asks the service for a plan and writes it.
//! Receipts post PURCHASE movements through the stock ledger and raise the
//! supplier payable in the same transaction.

use std::collections::{BTreeSet, HashMap, HashSet};

use apotik_core::party::{PartyError, normalize_code};
use apotik_core::procurement::{
    LineQuantity, OrderLine, ProcurementAction, ProcurementError, ProcurementService,
    PurchaseOrderStatus as OrderStatus, line_amount, order_total,
};
use apotik_core::stock::MovementKind;
use apotik_shared::types::PageRequest;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::{
    drugs, pharmacies, purchase_order_items, purchase_orders, sea_orm_active_enums, suppliers,
};
use crate::repositories::constraint::{Violation, violation};
use crate::repositories::organization::fiscal_calendar;
use crate::repositories::stock::{PostMovementInput, PostedMovement, StockLedgerError, post_in};
use crate::repositories::supplier::{SupplierError, adjust_balance_in};
use crate::rls::RlsExt;

/// `reference_type` of movements posted by a receipt.
pub const PURCHASE_ORDER_REFERENCE: &str = "PURCHASE_ORDER";

/// Error types for purchase order operations.
#[derive(Debug, thiserror::Error)]
pub enum PurchaseOrderError {
    /// Lifecycle rule violated.
    #[error(transparent)]
    Procurement(#[from] ProcurementError),

    /// Receipt refused by the stock ledger.
    #[error(transparent)]
    Stock(#[from] StockLedgerError),

    /// Supplier balance could not be adjusted.
    #[error(transparent)]
    Supplier(#[from] SupplierError),

    /// Code already used in the organization.
    #[error("Purchase order code '{0}' already exists")]
    DuplicateCode(String),

    /// Malformed code.
    #[error(transparent)]
    InvalidCode(#[from] PartyError),

    /// Purchase order not found in the organization.
    #[error("Purchase order not found: {0}")]
    NotFound(Uuid),

    /// Supplier not in the organization.
    #[error("Supplier not found: {0}")]
    SupplierNotFound(Uuid),

    /// Pharmacy not in the organization.
    #[error("Pharmacy not found: {0}")]
    PharmacyNotFound(Uuid),

    /// Drug not in the organization.
    #[error("Drug not found: {0}")]
    DrugNotFound(Uuid),

    /// The database refused the change.
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(DbErr),
}

impl From<DbErr> for PurchaseOrderError {
    fn from(err: DbErr) -> Self {
        match violation(&err) {
            Some(Violation::Check(msg)) => Self::Constraint(msg),
            _ => Self::Database(err),
        }
    }
}

/// One line of a draft.
#[derive(Debug, Clone)]
pub struct PurchaseOrderItemInput {
    /// Drug ordered.
    pub drug_id: Uuid,
    /// Quantity in order units.
    pub quantity: Decimal,
    /// Price per order unit.
    pub unit_price: Decimal,
    /// Order unit; defaults to the drug's stock unit.
    pub uom: Option<String>,
    /// Stock units per order unit; defaults to 1.
    pub conversion_factor: Option<Decimal>,
}

/// Header and lines of a new draft.
#[derive(Debug, Clone)]
pub struct CreatePurchaseOrderInput {
    /// Supplier.
    pub supplier_id: Uuid,
    /// Receiving pharmacy.
    pub pharmacy_id: Uuid,
    /// Code, unique within the organization.
    pub code: String,
    /// Order date.
    pub order_date: NaiveDate,
    /// Expected delivery date.
    pub expected_date: Option<NaiveDate>,
    /// Free text.
    pub remarks: Option<String>,
    /// Lines.
    pub items: Vec<PurchaseOrderItemInput>,
    /// Acting user.
    pub created_by: Option<Uuid>,
}

/// Replacement header and lines of a draft.
#[derive(Debug, Clone)]
pub struct UpdatePurchaseOrderInput {
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
    /// Lines; replace all existing lines.
    pub items: Vec<PurchaseOrderItemInput>,
}

/// One received line with its batch.
#[derive(Debug, Clone)]
pub struct ReceiptLineInput {
    /// Order item.
    pub item_id: Uuid,
    /// Quantity in order units.
    pub quantity: Decimal,
    /// Batch the goods arrived in.
    pub batch_number: String,
    /// Batch expiry.
    pub expiry_date: Option<NaiveDate>,
    /// Selling price per stock unit for a new batch.
    pub selling_price: Option<Decimal>,
}

/// A goods receipt.
#[derive(Debug, Clone)]
pub struct ReceiveInput {
    /// Received lines.
    pub lines: Vec<ReceiptLineInput>,
    /// Posting time; defaults to now.
    pub posting_datetime: Option<DateTime<Utc>>,
    /// Free text copied to the movements.
    pub remarks: Option<String>,
    /// Acting user.
    pub received_by: Option<Uuid>,
}

/// Filter for listing orders.
#[derive(Debug, Clone, Default)]
pub struct PurchaseOrderFilter {
    /// Only this status.
    pub status: Option<OrderStatus>,
    /// Only this supplier.
    pub supplier_id: Option<Uuid>,
    /// Only this pharmacy.
    pub pharmacy_id: Option<Uuid>,
    /// Only these pharmacies; `None` means no restriction.
    pub pharmacy_ids: Option<BTreeSet<Uuid>>,
}

/// An order with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOrderWithItems {
    /// Header.
    #[serde(flatten)]
    pub order: purchase_orders::Model,
    /// Lines.
    pub items: Vec<purchase_order_items::Model>,
}

/// Outcome of a receipt.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptResult {
    /// The order after the receipt.
    pub order: PurchaseOrderWithItems,
    /// One PURCHASE movement per received line.
    pub movements: Vec<PostedMovement>,
}

/// Purchase order repository.
#[derive(Debug, Clone)]
pub struct PurchaseOrderRepository {
    db: DatabaseConnection,
}

impl PurchaseOrderRepository {
    /// Creates a new purchase order repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a draft order.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid or duplicate code, an unknown
    /// supplier, pharmacy or drug, or an invalid line.
    pub async fn create_draft(
        &self,
        organization_id: Uuid,
        input: CreatePurchaseOrderInput,
    ) -> Result<PurchaseOrderWithItems, PurchaseOrderError> {
        let code = normalize_code(&input.code)?;
        for item in &input.items {
            validate_item(item)?;
        }

        let rls = self.db.with_rls(organization_id).await?;
        let txn = rls.transaction();
        ensure_header_refs(txn, organization_id, input.supplier_id, input.pharmacy_id).await?;

        let now = chrono::Utc::now().into();
        let order = purchase_orders::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            supplier_id: Set(input.supplier_id),
            pharmacy_id: Set(input.pharmacy_id),
            code: Set(code.clone()),
            status: Set(OrderStatus::Draft.into()),
            doc_status: Set(OrderStatus::Draft.doc_status().code()),
            order_date: Set(input.order_date),
            expected_date: Set(input.expected_date),
            amended_from_id: Set(None),
            remarks: Set(input.remarks),
            total_amount: Set(Decimal::ZERO),
            received_percentage: Set(Decimal::ZERO),
            invoiced_percentage: Set(Decimal::ZERO),
            submitted_by: Set(None),
            submitted_at: Set(None),
            cancelled_by: Set(None),
            cancelled_at: Set(None),
            closed_by: Set(None),
            closed_at: Set(None),
            created_by: Set(input.created_by),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await
        .map_err(|e| duplicate_or(e, &code))?;

        let items = insert_items(txn, organization_id, order.id, &input.items).await?;
        let order = set_total(txn, order, &items).await?;
        rls.commit().await?;

        tracing::info!(org_id = %organization_id, po_id = %order.id, code = %order.code, "Purchase order drafted");
        Ok(PurchaseOrderWithItems { order, items })
    }

    /// Replaces the header and lines of a draft.
    ///
    /// # Errors
    ///
    /// Returns `ProcurementError::CannotModify` unless the order is a draft.
    pub async fn update_draft(
        &self,
        organization_id: Uuid,
        id: Uuid,
        input: UpdatePurchaseOrderInput,
    ) -> Result<PurchaseOrderWithItems, PurchaseOrderError> {
        for item in &input.items {
            validate_item(item)?;
        }

        let rls = self.db.with_rls(organization_id).await?;
        let txn = rls.transaction();
        let order = lock_order(txn, organization_id, id).await?;
        ProcurementService::ensure_editable(order.status.into())?;
        ensure_header_refs(txn, organization_id, input.supplier_id, input.pharmacy_id).await?;

        purchase_order_items::Entity::delete_many()
            .filter(purchase_order_items::Column::PurchaseOrderId.eq(order.id))
            .exec(txn)
            .await?;
        let items = insert_items(txn, organization_id, order.id, &input.items).await?;

        let mut active: purchase_orders::ActiveModel = order.into();
        active.supplier_id = Set(input.supplier_id);
        active.pharmacy_id = Set(input.pharmacy_id);
        active.order_date = Set(input.order_date);
        active.expected_date = Set(input.expected_date);
        active.remarks = Set(input.remarks);
        let order = active.update(txn).await?;
        let order = set_total(txn, order, &items).await?;
        rls.commit().await?;

        Ok(PurchaseOrderWithItems { order, items })
    }

    /// Deletes a draft and its lines.
    ///
    /// # Errors
    ///
    /// Returns `ProcurementError::CannotModify` unless the order is a draft.
    pub async fn delete_draft(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<(), PurchaseOrderError> {
        let rls = self.db.with_rls(organization_id).await?;
        let order = lock_order(rls.transaction(), organization_id, id).await?;
        ProcurementService::ensure_editable(order.status.into())?;

        purchase_orders::Entity::delete_by_id(order.id)
            .exec(rls.transaction())
            .await?;
        rls.commit().await?;

        tracing::info!(org_id = %organization_id, po_id = %id, "Draft purchase order deleted");
        Ok(())
    }

    /// Finds an order with its lines.
    ///
    /// # Errors
    ///
    /// Returns `PurchaseOrderError::NotFound` if it does not exist.
    pub async fn find(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<PurchaseOrderWithItems, PurchaseOrderError> {
        let rls = self.db.with_rls(organization_id).await?;
        let order = purchase_orders::Entity::find_by_id(id)
            .filter(purchase_orders::Column::OrganizationId.eq(organization_id))
            .one(rls.transaction())
            .await?
            .ok_or(PurchaseOrderError::NotFound(id))?;
        let items = load_items(rls.transaction(), order.id).await?;
        rls.commit().await?;
        Ok(PurchaseOrderWithItems { order, items })
    }

    /// Lists orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(
        &self,
        organization_id: Uuid,
        filter: PurchaseOrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<purchase_orders::Model>, u64), DbErr> {
        let page = page.normalized();
        let mut query = purchase_orders::Entity::find()
            .filter(purchase_orders::Column::OrganizationId.eq(organization_id));
        if let Some(status) = filter.status {
            query = query.filter(
                purchase_orders::Column::Status
                    .eq(sea_orm_active_enums::PurchaseOrderStatus::from(status)),
            );
        }
        if let Some(supplier_id) = filter.supplier_id {
            query = query.filter(purchase_orders::Column::SupplierId.eq(supplier_id));
        }
        if let Some(pharmacy_id) = filter.pharmacy_id {
            query = query.filter(purchase_orders::Column::PharmacyId.eq(pharmacy_id));
        }
        if let Some(ids) = filter.pharmacy_ids {
            query = query.filter(purchase_orders::Column::PharmacyId.is_in(ids));
        }
        let query = query
            .order_by_desc(purchase_orders::Column::OrderDate)
            .order_by_desc(purchase_orders::Column::Code);

        let rls = self.db.with_rls(organization_id).await?;
        let total = query.clone().count(rls.transaction()).await?;
        let rows = query
            .offset(page.offset())
            .limit(page.limit())
            .all(rls.transaction())
            .await?;
        rls.commit().await?;
        Ok((rows, total))
    }

    /// Submits a draft.
    ///
    /// # Errors
    ///
    /// Returns an error unless the order is a draft with at least one line.
    pub async fn submit(
        &self,
        organization_id: Uuid,
        id: Uuid,
        submitted_by: Uuid,
    ) -> Result<PurchaseOrderWithItems, PurchaseOrderError> {
        let rls = self.db.with_rls(organization_id).await?;
        let txn = rls.transaction();
        let order = lock_order(txn, organization_id, id).await?;
        let items = load_items(txn, order.id).await?;

        let action = ProcurementService::submit(order.status.into(), items.len(), submitted_by)?;
        let order = apply_action(txn, order, &action).await?;
        rls.commit().await?;

        tracing::info!(org_id = %organization_id, po_id = %id, "Purchase order submitted");
        Ok(PurchaseOrderWithItems { order, items })
    }

    /// Cancels a submitted order that received nothing.
    ///
    /// # Errors
    ///
    /// Returns an error unless the order is submitted without receipts.
    pub async fn cancel(
        &self,
        organization_id: Uuid,
        id: Uuid,
        cancelled_by: Uuid,
    ) -> Result<PurchaseOrderWithItems, PurchaseOrderError> {
        let rls = self.db.with_rls(organization_id).await?;
        let txn = rls.transaction();
        let order = lock_order(txn, organization_id, id).await?;
        let items = load_items(txn, order.id).await?;

        let action =
            ProcurementService::cancel(order.status.into(), &order_lines(&items), cancelled_by)?;
        let order = apply_action(txn, order, &action).await?;
        rls.commit().await?;

        tracing::info!(org_id = %organization_id, po_id = %id, "Purchase order cancelled");
        Ok(PurchaseOrderWithItems { order, items })
    }

    /// Closes an order so no further goods are received.
    ///
    /// # Errors
    ///
    /// Returns an error for draft, completed, cancelled or closed orders.
    pub async fn close(
        &self,
        organization_id: Uuid,
        id: Uuid,
        closed_by: Uuid,
    ) -> Result<PurchaseOrderWithItems, PurchaseOrderError> {
        let rls = self.db.with_rls(organization_id).await?;
        let txn = rls.transaction();
        let order = lock_order(txn, organization_id, id).await?;
        let items = load_items(txn, order.id).await?;

        let action = ProcurementService::close(order.status.into(), closed_by)?;
        let order = apply_action(txn, order, &action).await?;
        rls.commit().await?;

        tracing::info!(org_id = %organization_id, po_id = %id, "Purchase order closed");
        Ok(PurchaseOrderWithItems { order, items })
    }

    /// Creates a draft amendment of a submitted or cancelled order.
    ///
    /// A submitted original is cancelled in the same transaction. The new
    /// draft copies header and lines and links back through
    /// `amended_from_id`.
    ///
    /// # Errors
    ///
    /// Returns `ProcurementError::HasReceipts` or `CannotModify` when the
    /// original cannot be amended.
    pub async fn amend(
        &self,
        organization_id: Uuid,
        id: Uuid,
        amended_by: Uuid,
    ) -> Result<PurchaseOrderWithItems, PurchaseOrderError> {
        let rls = self.db.with_rls(organization_id).await?;
        let txn = rls.transaction();
        let original = lock_order(txn, organization_id, id).await?;
        let original_items = load_items(txn, original.id).await?;

        let plan = ProcurementService::amend(original.status.into(), &order_lines(&original_items))?;
        let original = if plan.cancel_original {
            let action = ProcurementService::cancel(
                original.status.into(),
                &order_lines(&original_items),
                amended_by,
            )?;
            apply_action(txn, original, &action).await?
        } else {
            original
        };

        let is_amendment = original.amended_from_id.is_some();
        let base = ProcurementService::amendment_base(&original.code, is_amendment);
        let existing: Vec<String> = purchase_orders::Entity::find()
            .select_only()
            .column(purchase_orders::Column::Code)
            .filter(purchase_orders::Column::OrganizationId.eq(organization_id))
            .filter(purchase_orders::Column::Code.starts_with(format!("{base}-")))
            .into_tuple()
            .all(txn)
            .await?;
        let code = ProcurementService::amendment_code(&original.code, is_amendment, &existing);

        let now = chrono::Utc::now().into();
        let draft = purchase_orders::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            supplier_id: Set(original.supplier_id),
            pharmacy_id: Set(original.pharmacy_id),
            code: Set(code.clone()),
            status: Set(OrderStatus::Draft.into()),
            doc_status: Set(OrderStatus::Draft.doc_status().code()),
            order_date: Set(original.order_date),
            expected_date: Set(original.expected_date),
            amended_from_id: Set(Some(original.id)),
            remarks: Set(original.remarks.clone()),
            total_amount: Set(original.total_amount),
            received_percentage: Set(Decimal::ZERO),
            invoiced_percentage: Set(Decimal::ZERO),
            submitted_by: Set(None),
            submitted_at: Set(None),
            cancelled_by: Set(None),
            cancelled_at: Set(None),
            closed_by: Set(None),
            closed_at: Set(None),
            created_by: Set(Some(amended_by)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await
        .map_err(|e| duplicate_or(e, &code))?;

        let mut items = Vec::with_capacity(original_items.len());
        for item in &original_items {
            let copy = purchase_order_items::ActiveModel {
                id: Set(Uuid::new_v4()),
                organization_id: Set(organization_id),
                purchase_order_id: Set(draft.id),
                drug_id: Set(item.drug_id),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                uom: Set(item.uom.clone()),
                conversion_factor: Set(item.conversion_factor),
                received_quantity: Set(Decimal::ZERO),
                invoiced_quantity: Set(Decimal::ZERO),
                amount: Set(item.amount),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(txn)
            .await?;
            items.push(copy);
        }
        rls.commit().await?;

        tracing::info!(
            org_id = %organization_id,
            original_id = %original.id,
            po_id = %draft.id,
            code = %draft.code,
            "Purchase order amended"
        );
        Ok(PurchaseOrderWithItems {
            order: draft,
            items,
        })
    }

    /// Receives goods against an order.
    ///
    /// Each line posts a PURCHASE movement of `quantity × conversion_factor`
    /// stock units at `unit_price / conversion_factor` into the order's
    /// pharmacy, and the supplier payable grows by the received amount.
    ///
    /// # Errors
    ///
    /// Returns a procurement error when the order does not accept the
    /// receipt, and a stock error when the ledger refuses a line.
    pub async fn receive(
        &self,
        organization_id: Uuid,
        id: Uuid,
        input: ReceiveInput,
    ) -> Result<ReceiptResult, PurchaseOrderError> {
        let rls = self.db.with_rls(organization_id).await?;
        let txn = rls.transaction();
        let order = lock_order(txn, organization_id, id).await?;
        let items = load_items(txn, order.id).await?;

        let receipt: Vec<LineQuantity> = input
            .lines
            .iter()
            .map(|l| LineQuantity {
                item_id: l.item_id,
                quantity: l.quantity,
            })
            .collect();
        let plan = ProcurementService::receive(order.status.into(), &order_lines(&items), &receipt)?;

        let calendar = fiscal_calendar(txn, organization_id)
            .await
            .map_err(StockLedgerError::from)?;
        let posting = input.posting_datetime.unwrap_or_else(Utc::now);
        let batches: HashMap<Uuid, &ReceiptLineInput> =
            input.lines.iter().map(|l| (l.item_id, l)).collect();
        let mut by_id: HashMap<Uuid, purchase_order_items::Model> =
            items.into_iter().map(|i| (i.id, i)).collect();

        let mut movements = Vec::with_capacity(plan.lines.len());
        for line in &plan.lines {
            let (Some(item), Some(batch)) = (by_id.remove(&line.item_id), batches.get(&line.item_id))
            else {
                return Err(ProcurementError::UnknownItem(line.item_id).into());
            };

            let mut movement = PostMovementInput::new(
                order.pharmacy_id,
                item.drug_id,
                batch.batch_number.clone(),
                MovementKind::Purchase,
                line.stock_quantity,
            );
            movement.incoming_rate = Some(line.incoming_rate);
            movement.expiry_date = batch.expiry_date;
            movement.selling_price = batch.selling_price;
            movement.posting_datetime = Some(posting);
            movement.reference_type = Some(PURCHASE_ORDER_REFERENCE.to_string());
            movement.reference_id = Some(order.id);
            movement.remarks.clone_from(&input.remarks);
            movement.created_by = input.received_by;
            movements.push(post_in(txn, organization_id, &calendar, movement).await?);

            let mut active: purchase_order_items::ActiveModel = item.into();
            active.received_quantity = Set(line.received_after);
            active.updated_at = Set(chrono::Utc::now().into());
            let updated = active.update(txn).await?;
            by_id.insert(updated.id, updated);
        }

        adjust_balance_in(txn, organization_id, order.supplier_id, plan.payable).await?;

        let mut active: purchase_orders::ActiveModel = order.into();
        active.status = Set(plan.new_status.into());
        active.received_percentage = Set(plan.received_percentage);
        active.updated_at = Set(chrono::Utc::now().into());
        let order = active.update(txn).await?;
        let items = load_items(txn, order.id).await?;
        rls.commit().await?;

        tracing::info!(
            org_id = %organization_id,
            po_id = %order.id,
            status = %plan.new_status,
            received_percentage = %plan.received_percentage,
            payable = %plan.payable,
            "Goods received"
        );
        Ok(ReceiptResult {
            order: PurchaseOrderWithItems { order, items },
            movements,
        })
    }

    /// Records supplier-invoiced quantities.
    ///
    /// A fully received order becomes COMPLETED once fully invoiced.
    ///
    /// # Errors
    ///
    /// Returns a procurement error when the order does not accept invoices
    /// or a line exceeds the ordered quantity.
    pub async fn invoice(
        &self,
        organization_id: Uuid,
        id: Uuid,
        lines: &[LineQuantity],
    ) -> Result<PurchaseOrderWithItems, PurchaseOrderError> {
        let rls = self.db.with_rls(organization_id).await?;
        let txn = rls.transaction();
        let order = lock_order(txn, organization_id, id).await?;
        let items = load_items(txn, order.id).await?;

        let plan = ProcurementService::invoice(order.status.into(), &order_lines(&items), lines)?;
        let totals: HashMap<Uuid, Decimal> =
            plan.invoiced.iter().map(|l| (l.item_id, l.quantity)).collect();

        let now = chrono::Utc::now();
        for item in items {
            if let Some(invoiced) = totals.get(&item.id) {
                let mut active: purchase_order_items::ActiveModel = item.into();
                active.invoiced_quantity = Set(*invoiced);
                active.updated_at = Set(now.into());
                active.update(txn).await?;
            }
        }

        let mut active: purchase_orders::ActiveModel = order.into();
        active.status = Set(plan.new_status.into());
        active.invoiced_percentage = Set(plan.invoiced_percentage);
        active.updated_at = Set(now.into());
        let order = active.update(txn).await?;
        let items = load_items(txn, order.id).await?;
        rls.commit().await?;

        tracing::info!(
            org_id = %organization_id,
            po_id = %order.id,
            status = %plan.new_status,
            invoiced_percentage = %plan.invoiced_percentage,
            "Supplier invoice recorded"
        );
        Ok(PurchaseOrderWithItems { order, items })
    }
}

fn duplicate_or(err: DbErr, code: &str) -> PurchaseOrderError {
    match violation(&err) {
        Some(Violation::Unique(_)) => PurchaseOrderError::DuplicateCode(code.to_string()),
        _ => err.into(),
    }
}

fn validate_item(item: &PurchaseOrderItemInput) -> Result<(), ProcurementError> {
    ProcurementService::validate_line(
        item.quantity,
        item.unit_price,
        item.conversion_factor.unwrap_or(Decimal::ONE),
    )
}

async fn lock_order(
    txn: &DatabaseTransaction,
    organization_id: Uuid,
    id: Uuid,
) -> Result<purchase_orders::Model, PurchaseOrderError> {
    purchase_orders::Entity::find_by_id(id)
        .filter(purchase_orders::Column::OrganizationId.eq(organization_id))
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or(PurchaseOrderError::NotFound(id))
}

async fn load_items(
    txn: &DatabaseTransaction,
    order_id: Uuid,
) -> Result<Vec<purchase_order_items::Model>, DbErr> {
    purchase_order_items::Entity::find()
        .filter(purchase_order_items::Column::PurchaseOrderId.eq(order_id))
        .order_by_asc(purchase_order_items::Column::CreatedAt)
        .order_by_asc(purchase_order_items::Column::Id)
        .all(txn)
        .await
}

async fn ensure_header_refs(
    txn: &DatabaseTransaction,
    organization_id: Uuid,
    supplier_id: Uuid,
    pharmacy_id: Uuid,
) -> Result<(), PurchaseOrderError> {
    let supplier = suppliers::Entity::find_by_id(supplier_id)
        .filter(suppliers::Column::OrganizationId.eq(organization_id))
        .count(txn)
        .await?;
    if supplier == 0 {
        return Err(PurchaseOrderError::SupplierNotFound(supplier_id));
    }
    let pharmacy = pharmacies::Entity::find_by_id(pharmacy_id)
        .filter(pharmacies::Column::OrganizationId.eq(organization_id))
        .count(txn)
        .await?;
    if pharmacy == 0 {
        return Err(PurchaseOrderError::PharmacyNotFound(pharmacy_id));
    }
    Ok(())
}

async fn insert_items(
    txn: &DatabaseTransaction,
    organization_id: Uuid,
    order_id: Uuid,
    inputs: &[PurchaseOrderItemInput],
) -> Result<Vec<purchase_order_items::Model>, PurchaseOrderError> {
    let drug_ids: HashSet<Uuid> = inputs.iter().map(|i| i.drug_id).collect();
    let units: HashMap<Uuid, String> = drugs::Entity::find()
        .filter(drugs::Column::OrganizationId.eq(organization_id))
        .filter(drugs::Column::Id.is_in(drug_ids.iter().copied()))
        .all(txn)
        .await?
        .into_iter()
        .map(|d| (d.id, d.unit))
        .collect();

    let now = chrono::Utc::now().into();
    let mut items = Vec::with_capacity(inputs.len());
    for input in inputs {
        let unit = units
            .get(&input.drug_id)
            .ok_or(PurchaseOrderError::DrugNotFound(input.drug_id))?;
        let uom = input
            .uom
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map_or_else(|| unit.clone(), str::to_uppercase);

        let item = purchase_order_items::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            purchase_order_id: Set(order_id),
            drug_id: Set(input.drug_id),
            quantity: Set(input.quantity),
            unit_price: Set(input.unit_price),
            uom: Set(uom),
            conversion_factor: Set(input.conversion_factor.unwrap_or(Decimal::ONE)),
            received_quantity: Set(Decimal::ZERO),
            invoiced_quantity: Set(Decimal::ZERO),
            amount: Set(line_amount(input.quantity, input.unit_price)?),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await?;
        items.push(item);
    }
    Ok(items)
}

async fn set_total(
    txn: &DatabaseTransaction,
    order: purchase_orders::Model,
    items: &[purchase_order_items::Model],
) -> Result<purchase_orders::Model, PurchaseOrderError> {
    let total = order_total(items.iter().map(|i| i.amount))?;
    let mut active: purchase_orders::ActiveModel = order.into();
    active.total_amount = Set(total);
    active.updated_at = Set(chrono::Utc::now().into());
    Ok(active.update(txn).await?)
}

async fn apply_action(
    txn: &DatabaseTransaction,
    order: purchase_orders::Model,
    action: &ProcurementAction,
) -> Result<purchase_orders::Model, DbErr> {
    let new_status = action.new_status();
    let mut active: purchase_orders::ActiveModel = order.into();
    active.status = Set(new_status.into());
    active.doc_status = Set(new_status.doc_status().code());
    match action {
        ProcurementAction::Submit {
            submitted_by,
            submitted_at,
            ..
        } => {
            active.submitted_by = Set(Some(*submitted_by));
            active.submitted_at = Set(Some((*submitted_at).into()));
        }
        ProcurementAction::Cancel {
            cancelled_by,
            cancelled_at,
            ..
        } => {
            active.cancelled_by = Set(Some(*cancelled_by));
            active.cancelled_at = Set(Some((*cancelled_at).into()));
        }
        ProcurementAction::Close {
            closed_by,
            closed_at,
            ..
        } => {
            active.closed_by = Set(Some(*closed_by));
            active.closed_at = Set(Some((*closed_at).into()));
        }
    }
    active.updated_at = Set(chrono::Utc::now().into());
    active.update(txn).await
}

fn order_lines(items: &[purchase_order_items::Model]) -> Vec<OrderLine> {
    items
        .iter()
        .map(|i| OrderLine {
            item_id: i.id,
            quantity: i.quantity,
            unit_price: i.unit_price,
            conversion_factor: i.conversion_factor,
            received_quantity: i.received_quantity,
            invoiced_quantity: i.invoiced_quantity,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(quantity: Decimal, received: Decimal) -> purchase_order_items::Model {
        let now = chrono::Utc::now().into();
        purchase_order_items::Model {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            purchase_order_id: Uuid::new_v4(),
            drug_id: Uuid::new_v4(),
            quantity,
            unit_price: dec!(12),
            uom: "BOX".to_string(),
            conversion_factor: dec!(10),
            received_quantity: received,
            invoiced_quantity: Decimal::ZERO,
            amount: line_amount(quantity, dec!(12)).unwrap(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_order_lines_mirror_items() {
        let items = vec![item(dec!(5), dec!(2)), item(dec!(3), Decimal::ZERO)];
        let lines = order_lines(&items);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].item_id, items[0].id);
        assert_eq!(lines[0].remaining(), dec!(3));
        assert_eq!(lines[1].conversion_factor, dec!(10));
    }

    #[test]
    fn test_validate_item_defaults_conversion_factor() {
        let input = PurchaseOrderItemInput {
            drug_id: Uuid::new_v4(),
            quantity: dec!(1),
            unit_price: dec!(0),
            uom: None,
            conversion_factor: None,
        };
        assert!(validate_item(&input).is_ok());

        let bad = PurchaseOrderItemInput {
            conversion_factor: Some(dec!(0)),
            ..input
        };
        assert!(matches!(
            validate_item(&bad),
            Err(ProcurementError::InvalidConversionFactor(_))
        ));
    }
}
