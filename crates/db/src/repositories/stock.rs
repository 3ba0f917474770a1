//! Stock ledger repository.
//!
//! Every change to a `pharmacy_stock` row happens under a row lock inside
//! one transaction: lock, apply [`StockLedger`], update the row, append the
//! movement. Ordering of `balance_after` per line follows from the lock.

use std::collections::HashMap;

use apotik_core::fiscal::FiscalCalendar;
use apotik_core::stock::{
    FefoCandidate, FefoPlanner, MovementEffect, MovementKind, MovementOutcome, MovementRequest,
    StockError, StockLedger, StockPosition, fits_amount,
};
use apotik_shared::types::PageRequest;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, sea_query::OnConflict,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::{drugs, pharmacies, pharmacy_stock, stock_movements};
use crate::repositories::constraint::check_violation;
use crate::repositories::organization::{OrganizationError, fiscal_calendar};
use crate::rls::RlsExt;

/// `reference_type` written on both legs of a transfer.
pub const TRANSFER_REFERENCE: &str = "STOCK_TRANSFER";

/// Error types for stock operations.
#[derive(Debug, thiserror::Error)]
pub enum StockLedgerError {
    /// Ledger rule violated.
    #[error(transparent)]
    Stock(#[from] StockError),

    /// Organization or fiscal calendar could not be resolved.
    #[error(transparent)]
    Organization(#[from] OrganizationError),

    /// No stock line for the batch or id.
    #[error("Stock line not found")]
    StockLineNotFound,

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

impl From<DbErr> for StockLedgerError {
    fn from(err: DbErr) -> Self {
        match check_violation(&err) {
            Some(msg) => Self::Constraint(msg),
            None => Self::Database(err),
        }
    }
}

/// Input for posting a single movement.
#[derive(Debug, Clone)]
pub struct PostMovementInput {
    /// Pharmacy holding the stock.
    pub pharmacy_id: Uuid,
    /// Drug.
    pub drug_id: Uuid,
    /// Batch number.
    pub batch_number: String,
    /// Movement kind; transfer legs are refused.
    pub kind: MovementKind,
    /// Quantity in stock units (signed for ADJUSTMENT, counted for STOCK_TAKE).
    pub quantity: Decimal,
    /// Cost per stock unit of inbound goods.
    pub incoming_rate: Option<Decimal>,
    /// Expiry of a batch seen for the first time.
    pub expiry_date: Option<NaiveDate>,
    /// Selling price of a batch seen for the first time.
    pub selling_price: Option<Decimal>,
    /// Posting time; defaults to now.
    pub posting_datetime: Option<DateTime<Utc>>,
    /// Source document type.
    pub reference_type: Option<String>,
    /// Source document id.
    pub reference_id: Option<Uuid>,
    /// Free text.
    pub remarks: Option<String>,
    /// Acting user.
    pub created_by: Option<Uuid>,
}

impl PostMovementInput {
    /// Creates an input with no rate, reference or remarks.
    #[must_use]
    pub fn new(
        pharmacy_id: Uuid,
        drug_id: Uuid,
        batch_number: impl Into<String>,
        kind: MovementKind,
        quantity: Decimal,
    ) -> Self {
        Self {
            pharmacy_id,
            drug_id,
            batch_number: batch_number.into(),
            kind,
            quantity,
            incoming_rate: None,
            expiry_date: None,
            selling_price: None,
            posting_datetime: None,
            reference_type: None,
            reference_id: None,
            remarks: None,
            created_by: None,
        }
    }
}

/// Input for a transfer between two pharmacies.
#[derive(Debug, Clone)]
pub struct TransferInput {
    /// Source stock line.
    pub source_stock_id: Uuid,
    /// Receiving pharmacy.
    pub destination_pharmacy_id: Uuid,
    /// Quantity in stock units.
    pub quantity: Decimal,
    /// Posting time; defaults to now.
    pub posting_datetime: Option<DateTime<Utc>>,
    /// Free text.
    pub remarks: Option<String>,
    /// Acting user.
    pub created_by: Option<Uuid>,
}

/// Input for dispensing by FEFO.
#[derive(Debug, Clone)]
pub struct DispenseInput {
    /// Pharmacy to dispense from.
    pub pharmacy_id: Uuid,
    /// Drug.
    pub drug_id: Uuid,
    /// Quantity in stock units.
    pub quantity: Decimal,
    /// Posting time; defaults to now.
    pub posting_datetime: Option<DateTime<Utc>>,
    /// Source document type.
    pub reference_type: Option<String>,
    /// Source document id.
    pub reference_id: Option<Uuid>,
    /// Free text.
    pub remarks: Option<String>,
    /// Acting user.
    pub created_by: Option<Uuid>,
}

/// A stock line after a movement, with the movement written.
#[derive(Debug, Clone, Serialize)]
pub struct PostedMovement {
    /// The stock line after the movement.
    pub stock: pharmacy_stock::Model,
    /// The appended movement.
    pub movement: stock_movements::Model,
}

/// Both legs of a transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    /// Id shared by both movements.
    pub reference_id: Uuid,
    /// TRANSFER_OUT leg.
    pub outgoing: PostedMovement,
    /// TRANSFER_IN leg.
    pub incoming: PostedMovement,
}

/// Filter for the movement history.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementFilter {
    /// Only this drug.
    pub drug_id: Option<Uuid>,
    /// Only this kind.
    pub kind: Option<MovementKind>,
}

/// Provenance of a movement.
#[derive(Debug, Clone)]
pub(crate) struct MovementMeta {
    pub posting_datetime: DateTime<Utc>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub remarks: Option<String>,
    pub created_by: Option<Uuid>,
}

/// Stock repository.
#[derive(Debug, Clone)]
pub struct StockRepository {
    db: DatabaseConnection,
}

impl StockRepository {
    /// Creates a new stock repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Posts one movement against a batch.
    ///
    /// Inbound kinds create the stock line on first receipt; every other
    /// kind needs an existing line.
    ///
    /// # Errors
    ///
    /// Returns `StockLedgerError::Stock` when a ledger rule refuses the
    /// movement, and `StockLineNotFound` for a missing line.
    pub async fn post_movement(
        &self,
        organization_id: Uuid,
        input: PostMovementInput,
    ) -> Result<PostedMovement, StockLedgerError> {
        if input.kind.is_transfer() {
            return Err(StockError::TransferLegOnly(input.kind).into());
        }

        let rls = self.db.with_rls(organization_id).await?;
        let calendar = fiscal_calendar(rls.transaction(), organization_id).await?;
        let posted = post_in(rls.transaction(), organization_id, &calendar, input).await?;
        rls.commit().await?;

        tracing::info!(
            org_id = %organization_id,
            stock_id = %posted.stock.id,
            kind = %MovementKind::from(posted.movement.movement_type),
            quantity = %posted.movement.quantity,
            balance_after = %posted.movement.balance_after,
            "Stock movement posted"
        );
        Ok(posted)
    }

    /// Moves stock of one batch to another pharmacy of the organization.
    ///
    /// The destination line inherits the batch's cost, selling price and
    /// expiry. Both legs share one reference id.
    ///
    /// # Errors
    ///
    /// Returns `StockError::SamePharmacy` for a transfer within one
    /// pharmacy, and the ledger error of whichever leg is refused.
    pub async fn transfer(
        &self,
        organization_id: Uuid,
        input: TransferInput,
    ) -> Result<TransferResult, StockLedgerError> {
        let rls = self.db.with_rls(organization_id).await?;
        let txn = rls.transaction();
        let calendar = fiscal_calendar(txn, organization_id).await?;

        let source = find_line(txn, organization_id, input.source_stock_id)
            .await?
            .ok_or(StockLedgerError::StockLineNotFound)?;
        if source.pharmacy_id == input.destination_pharmacy_id {
            return Err(StockError::SamePharmacy.into());
        }
        ensure_pharmacy(txn, organization_id, input.destination_pharmacy_id).await?;

        let now = chrono::Utc::now().into();
        pharmacy_stock::Entity::insert(pharmacy_stock::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            pharmacy_id: Set(input.destination_pharmacy_id),
            drug_id: Set(source.drug_id),
            batch_number: Set(source.batch_number.clone()),
            quantity: Set(Decimal::ZERO),
            allocated_quantity: Set(Decimal::ZERO),
            cost_price: Set(source.cost_price),
            selling_price: Set(source.selling_price),
            expiry_date: Set(source.expiry_date),
            is_quarantined: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .on_conflict(batch_conflict())
        .exec_without_returning(txn)
        .await?;

        // Lock both lines in id order so opposite transfers cannot deadlock.
        let locked = pharmacy_stock::Entity::find()
            .filter(pharmacy_stock::Column::OrganizationId.eq(organization_id))
            .filter(
                pharmacy_stock::Column::Id.eq(source.id).or(pharmacy_stock::Column::PharmacyId
                    .eq(input.destination_pharmacy_id)
                    .and(pharmacy_stock::Column::DrugId.eq(source.drug_id))
                    .and(pharmacy_stock::Column::BatchNumber.eq(source.batch_number.as_str()))),
            )
            .order_by_asc(pharmacy_stock::Column::Id)
            .lock_exclusive()
            .all(txn)
            .await?;
        let mut source_line = None;
        let mut destination_line = None;
        for line in locked {
            if line.id == source.id {
                source_line = Some(line);
            } else {
                destination_line = Some(line);
            }
        }
        let (Some(source_line), Some(destination_line)) = (source_line, destination_line) else {
            return Err(StockLedgerError::StockLineNotFound);
        };

        let posting = input.posting_datetime.unwrap_or_else(Utc::now);
        let (out, inc) = StockLedger::transfer(
            &position_of(&source_line),
            &position_of(&destination_line),
            input.quantity,
            calendar.local_date(posting),
        )?;

        let reference_id = Uuid::new_v4();
        let meta = MovementMeta {
            posting_datetime: posting,
            reference_type: Some(TRANSFER_REFERENCE.to_string()),
            reference_id: Some(reference_id),
            remarks: input.remarks,
            created_by: input.created_by,
        };
        let outgoing = write_outcome(txn, &calendar, source_line, out, &meta).await?;
        let incoming = write_outcome(txn, &calendar, destination_line, inc, &meta).await?;
        rls.commit().await?;

        tracing::info!(
            org_id = %organization_id,
            reference_id = %reference_id,
            from = %outgoing.stock.pharmacy_id,
            to = %incoming.stock.pharmacy_id,
            quantity = %input.quantity,
            "Stock transferred"
        );
        Ok(TransferResult {
            reference_id,
            outgoing,
            incoming,
        })
    }

    /// Dispenses a drug from the earliest-expiring batches.
    ///
    /// Posts one SALE per picked batch. Nothing is posted when the pickable
    /// stock is short.
    ///
    /// # Errors
    ///
    /// Returns `StockError::InsufficientStock` when the pickable total is
    /// below the requested quantity.
    pub async fn dispense_fefo(
        &self,
        organization_id: Uuid,
        input: DispenseInput,
    ) -> Result<Vec<PostedMovement>, StockLedgerError> {
        let rls = self.db.with_rls(organization_id).await?;
        let txn = rls.transaction();
        let calendar = fiscal_calendar(txn, organization_id).await?;
        let posting = input.posting_datetime.unwrap_or_else(Utc::now);
        let as_of = calendar.local_date(posting);

        let lines = pharmacy_stock::Entity::find()
            .filter(pharmacy_stock::Column::OrganizationId.eq(organization_id))
            .filter(pharmacy_stock::Column::PharmacyId.eq(input.pharmacy_id))
            .filter(pharmacy_stock::Column::DrugId.eq(input.drug_id))
            .order_by_asc(pharmacy_stock::Column::Id)
            .lock_exclusive()
            .all(txn)
            .await?;
        let candidates: Vec<FefoCandidate> = lines.iter().map(candidate_of).collect();
        let picks = FefoPlanner::plan(&candidates, input.quantity, as_of)?;

        let mut by_id: HashMap<Uuid, pharmacy_stock::Model> =
            lines.into_iter().map(|l| (l.id, l)).collect();
        let meta = MovementMeta {
            posting_datetime: posting,
            reference_type: input.reference_type,
            reference_id: input.reference_id,
            remarks: input.remarks,
            created_by: input.created_by,
        };

        let mut posted = Vec::with_capacity(picks.len());
        for pick in picks {
            let line = by_id
                .remove(&pick.stock_id)
                .ok_or(StockLedgerError::StockLineNotFound)?;
            let outcome = StockLedger::apply(
                &position_of(&line),
                &MovementRequest::new(MovementKind::Sale, pick.quantity, as_of),
            )?;
            posted.push(write_outcome(txn, &calendar, line, outcome, &meta).await?);
        }
        rls.commit().await?;

        tracing::info!(
            org_id = %organization_id,
            pharmacy_id = %input.pharmacy_id,
            drug_id = %input.drug_id,
            quantity = %input.quantity,
            batches = posted.len(),
            "Dispensed by FEFO"
        );
        Ok(posted)
    }

    /// Sets or clears the quarantine flag of a stock line.
    ///
    /// # Errors
    ///
    /// Returns `StockLineNotFound` for an unknown line.
    pub async fn set_quarantine(
        &self,
        organization_id: Uuid,
        stock_id: Uuid,
        quarantined: bool,
    ) -> Result<pharmacy_stock::Model, StockLedgerError> {
        let rls = self.db.with_rls(organization_id).await?;
        let line = pharmacy_stock::Entity::find_by_id(stock_id)
            .filter(pharmacy_stock::Column::OrganizationId.eq(organization_id))
            .lock_exclusive()
            .one(rls.transaction())
            .await?
            .ok_or(StockLedgerError::StockLineNotFound)?;

        let mut active: pharmacy_stock::ActiveModel = line.into();
        active.is_quarantined = Set(quarantined);
        active.updated_at = Set(chrono::Utc::now().into());
        let line = active.update(rls.transaction()).await?;
        rls.commit().await?;

        tracing::info!(org_id = %organization_id, stock_id = %stock_id, quarantined, "Quarantine updated");
        Ok(line)
    }

    /// Finds a stock line of the organization.
    ///
    /// # Errors
    ///
    /// Returns `StockLineNotFound` for an unknown line.
    pub async fn find(
        &self,
        organization_id: Uuid,
        stock_id: Uuid,
    ) -> Result<pharmacy_stock::Model, StockLedgerError> {
        let rls = self.db.with_rls(organization_id).await?;
        let line = find_line(rls.transaction(), organization_id, stock_id).await?;
        rls.commit().await?;
        line.ok_or(StockLedgerError::StockLineNotFound)
    }

    /// Lists the stock lines of a pharmacy, optionally for one drug.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_stock(
        &self,
        organization_id: Uuid,
        pharmacy_id: Uuid,
        drug_id: Option<Uuid>,
    ) -> Result<Vec<pharmacy_stock::Model>, DbErr> {
        let mut query = pharmacy_stock::Entity::find()
            .filter(pharmacy_stock::Column::OrganizationId.eq(organization_id))
            .filter(pharmacy_stock::Column::PharmacyId.eq(pharmacy_id));
        if let Some(drug_id) = drug_id {
            query = query.filter(pharmacy_stock::Column::DrugId.eq(drug_id));
        }

        let rls = self.db.with_rls(organization_id).await?;
        let rows = query
            .order_by_asc(pharmacy_stock::Column::DrugId)
            .order_by_asc(pharmacy_stock::Column::ExpiryDate)
            .order_by_asc(pharmacy_stock::Column::BatchNumber)
            .all(rls.transaction())
            .await?;
        rls.commit().await?;
        Ok(rows)
    }

    /// Pickable lines of a drug in FEFO order as of a date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn fefo_lines(
        &self,
        organization_id: Uuid,
        pharmacy_id: Uuid,
        drug_id: Uuid,
        as_of: NaiveDate,
    ) -> Result<Vec<pharmacy_stock::Model>, DbErr> {
        let rls = self.db.with_rls(organization_id).await?;
        let lines = pharmacy_stock::Entity::find()
            .filter(pharmacy_stock::Column::OrganizationId.eq(organization_id))
            .filter(pharmacy_stock::Column::PharmacyId.eq(pharmacy_id))
            .filter(pharmacy_stock::Column::DrugId.eq(drug_id))
            .filter(pharmacy_stock::Column::IsQuarantined.eq(false))
            .filter(pharmacy_stock::Column::Quantity.gt(Decimal::ZERO))
            .order_by_asc(pharmacy_stock::Column::ExpiryDate)
            .all(rls.transaction())
            .await?;
        rls.commit().await?;

        let candidates: Vec<FefoCandidate> = lines.iter().map(candidate_of).collect();
        let order: Vec<Uuid> = FefoPlanner::order(&candidates, as_of)
            .into_iter()
            .map(|c| c.stock_id)
            .collect();
        let mut by_id: HashMap<Uuid, pharmacy_stock::Model> =
            lines.into_iter().map(|l| (l.id, l)).collect();
        Ok(order.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Movement history of a pharmacy, newest posting first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_movements(
        &self,
        organization_id: Uuid,
        pharmacy_id: Uuid,
        filter: MovementFilter,
        page: PageRequest,
    ) -> Result<(Vec<stock_movements::Model>, u64), DbErr> {
        let page = page.normalized();
        let mut query = stock_movements::Entity::find()
            .filter(stock_movements::Column::OrganizationId.eq(organization_id))
            .filter(stock_movements::Column::PharmacyId.eq(pharmacy_id));
        if let Some(drug_id) = filter.drug_id {
            query = query.filter(stock_movements::Column::DrugId.eq(drug_id));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(
                stock_movements::Column::MovementType
                    .eq(crate::entities::sea_orm_active_enums::StockMovementType::from(kind)),
            );
        }
        let query = query
            .order_by_desc(stock_movements::Column::PostingDatetime)
            .order_by_desc(stock_movements::Column::CreatedAt);

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
}

/// Posts a movement inside an open tenant transaction.
pub(crate) async fn post_in(
    txn: &DatabaseTransaction,
    organization_id: Uuid,
    calendar: &FiscalCalendar,
    input: PostMovementInput,
) -> Result<PostedMovement, StockLedgerError> {
    let batch_number = input.batch_number.trim().to_string();
    if batch_number.is_empty() {
        return Err(StockError::BatchNumberRequired.into());
    }

    let mut line = lock_batch(
        txn,
        organization_id,
        input.pharmacy_id,
        input.drug_id,
        &batch_number,
    )
    .await?;

    if let Some(price) = input.selling_price {
        if !fits_amount(price) {
            return Err(StockError::OutOfRange.into());
        }
    }

    if let Some(existing) = &line {
        if input.kind.effect() == MovementEffect::Inbound {
            StockLedger::check_batch_expiry(
                &batch_number,
                existing.expiry_date,
                input.expiry_date,
            )?;
            if input
                .selling_price
                .is_some_and(|price| price != existing.selling_price)
            {
                tracing::warn!(
                    stock_id = %existing.id,
                    batch = %batch_number,
                    "Selling price of an existing batch is kept; requested price ignored"
                );
            }
        }
    }

    if line.is_none() && input.kind.effect() == MovementEffect::Inbound {
        ensure_pharmacy(txn, organization_id, input.pharmacy_id).await?;
        ensure_drug(txn, organization_id, input.drug_id).await?;

        let now = chrono::Utc::now().into();
        pharmacy_stock::Entity::insert(pharmacy_stock::ActiveModel {
            id: Set(Uuid::new_v4()),
            organization_id: Set(organization_id),
            pharmacy_id: Set(input.pharmacy_id),
            drug_id: Set(input.drug_id),
            batch_number: Set(batch_number.clone()),
            quantity: Set(Decimal::ZERO),
            allocated_quantity: Set(Decimal::ZERO),
            cost_price: Set(Decimal::ZERO),
            selling_price: Set(input.selling_price.unwrap_or(Decimal::ZERO)),
            expiry_date: Set(input.expiry_date),
            is_quarantined: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .on_conflict(batch_conflict())
        .exec_without_returning(txn)
        .await?;

        line = lock_batch(
            txn,
            organization_id,
            input.pharmacy_id,
            input.drug_id,
            &batch_number,
        )
        .await?;
    }
    let line = line.ok_or(StockLedgerError::StockLineNotFound)?;

    let posting = input.posting_datetime.unwrap_or_else(Utc::now);
    let mut request = MovementRequest::new(input.kind, input.quantity, calendar.local_date(posting));
    if let Some(rate) = input.incoming_rate {
        request = request.with_rate(rate);
    }
    let outcome = StockLedger::apply(&position_of(&line), &request)?;

    let meta = MovementMeta {
        posting_datetime: posting,
        reference_type: input.reference_type,
        reference_id: input.reference_id,
        remarks: input.remarks,
        created_by: input.created_by,
    };
    write_outcome(txn, calendar, line, outcome, &meta).await
}

/// Writes the new position of a locked line and appends its movement.
async fn write_outcome(
    txn: &DatabaseTransaction,
    calendar: &FiscalCalendar,
    line: pharmacy_stock::Model,
    outcome: MovementOutcome,
    meta: &MovementMeta,
) -> Result<PostedMovement, StockLedgerError> {
    let fiscal = calendar.position_of(meta.posting_datetime);
    let now = chrono::Utc::now();

    let movement = stock_movements::ActiveModel {
        id: Set(Uuid::new_v4()),
        organization_id: Set(line.organization_id),
        stock_id: Set(line.id),
        pharmacy_id: Set(line.pharmacy_id),
        drug_id: Set(line.drug_id),
        batch_number: Set(line.batch_number.clone()),
        movement_type: Set(outcome.movement.kind.into()),
        quantity: Set(outcome.movement.quantity),
        balance_after: Set(outcome.movement.balance_after),
        allocated_after: Set(outcome.movement.allocated_after),
        valuation_rate: Set(outcome.movement.valuation_rate),
        stock_value: Set(outcome.movement.stock_value),
        stock_value_difference: Set(outcome.movement.stock_value_difference),
        posting_datetime: Set(meta.posting_datetime.into()),
        fiscal_year: Set(fiscal.fiscal_year),
        fiscal_period: Set(i16::try_from(fiscal.fiscal_period).unwrap_or(i16::MAX)),
        reference_type: Set(meta.reference_type.clone()),
        reference_id: Set(meta.reference_id),
        remarks: Set(meta.remarks.clone()),
        created_by: Set(meta.created_by),
        created_at: Set(now.into()),
    };

    let mut active: pharmacy_stock::ActiveModel = line.into();
    active.quantity = Set(outcome.position.quantity);
    active.allocated_quantity = Set(outcome.position.allocated_quantity);
    active.cost_price = Set(outcome.position.valuation_rate);
    active.updated_at = Set(now.into());
    let stock = active.update(txn).await?;
    let movement = movement.insert(txn).await?;

    Ok(PostedMovement { stock, movement })
}

async fn lock_batch(
    txn: &DatabaseTransaction,
    organization_id: Uuid,
    pharmacy_id: Uuid,
    drug_id: Uuid,
    batch_number: &str,
) -> Result<Option<pharmacy_stock::Model>, DbErr> {
    pharmacy_stock::Entity::find()
        .filter(pharmacy_stock::Column::OrganizationId.eq(organization_id))
        .filter(pharmacy_stock::Column::PharmacyId.eq(pharmacy_id))
        .filter(pharmacy_stock::Column::DrugId.eq(drug_id))
        .filter(pharmacy_stock::Column::BatchNumber.eq(batch_number))
        .lock_exclusive()
        .one(txn)
        .await
}

async fn find_line(
    txn: &DatabaseTransaction,
    organization_id: Uuid,
    stock_id: Uuid,
) -> Result<Option<pharmacy_stock::Model>, DbErr> {
    pharmacy_stock::Entity::find_by_id(stock_id)
        .filter(pharmacy_stock::Column::OrganizationId.eq(organization_id))
        .one(txn)
        .await
}

async fn ensure_pharmacy(
    txn: &DatabaseTransaction,
    organization_id: Uuid,
    pharmacy_id: Uuid,
) -> Result<(), StockLedgerError> {
    let found = pharmacies::Entity::find_by_id(pharmacy_id)
        .filter(pharmacies::Column::OrganizationId.eq(organization_id))
        .count(txn)
        .await?;
    if found == 0 {
        return Err(StockLedgerError::PharmacyNotFound(pharmacy_id));
    }
    Ok(())
}

async fn ensure_drug(
    txn: &DatabaseTransaction,
    organization_id: Uuid,
    drug_id: Uuid,
) -> Result<(), StockLedgerError> {
    let found = drugs::Entity::find_by_id(drug_id)
        .filter(drugs::Column::OrganizationId.eq(organization_id))
        .count(txn)
        .await?;
    if found == 0 {
        return Err(StockLedgerError::DrugNotFound(drug_id));
    }
    Ok(())
}

fn batch_conflict() -> OnConflict {
    OnConflict::columns([
        pharmacy_stock::Column::PharmacyId,
        pharmacy_stock::Column::DrugId,
        pharmacy_stock::Column::BatchNumber,
    ])
    .do_nothing()
    .to_owned()
}

fn position_of(line: &pharmacy_stock::Model) -> StockPosition {
    StockPosition {
        quantity: line.quantity,
        allocated_quantity: line.allocated_quantity,
        valuation_rate: line.cost_price,
        expiry_date: line.expiry_date,
        is_quarantined: line.is_quarantined,
    }
}

fn candidate_of(line: &pharmacy_stock::Model) -> FefoCandidate {
    FefoCandidate {
        stock_id: line.id,
        batch_number: line.batch_number.clone(),
        expiry_date: line.expiry_date,
        quantity: line.quantity,
        allocated_quantity: line.allocated_quantity,
        is_quarantined: line.is_quarantined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(quantity: Decimal, allocated: Decimal) -> pharmacy_stock::Model {
        let now = chrono::Utc::now().into();
        pharmacy_stock::Model {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            pharmacy_id: Uuid::new_v4(),
            drug_id: Uuid::new_v4(),
            batch_number: "B-1".to_string(),
            quantity,
            allocated_quantity: allocated,
            cost_price: dec!(2.5),
            selling_price: dec!(4),
            expiry_date: NaiveDate::from_ymd_opt(2026, 6, 30),
            is_quarantined: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_position_uses_cost_price_as_rate() {
        let position = position_of(&line(dec!(10), dec!(3)));
        assert_eq!(position.valuation_rate, dec!(2.5));
        assert_eq!(position.available(), dec!(7));
    }

    #[test]
    fn test_candidate_mirrors_line() {
        let l = line(dec!(8), dec!(2));
        let c = candidate_of(&l);
        assert_eq!(c.stock_id, l.id);
        assert_eq!(c.available(), dec!(6));
        assert_eq!(c.expiry_date, l.expiry_date);
    }

    #[test]
    fn test_constraint_errors_are_classified() {
        let err: StockLedgerError = DbErr::Custom("boom".into()).into();
        assert!(matches!(err, StockLedgerError::Database(_)));
    }
}
