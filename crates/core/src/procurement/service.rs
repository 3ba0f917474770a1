//! Purchase order state transitions, receipts and invoices.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashSet;
use uuid::Uuid;

use crate::procurement::error::ProcurementError;
use crate::procurement::types::{
    AmendPlan, InvoicePlan, LineQuantity, MAX_CONVERSION_FACTOR, OrderLine, PERCENTAGE_SCALE,
    ProcurementAction, PurchaseOrderStatus, ReceiptPlan, ReceivedLine, line_amount,
};
use crate::stock::{VALUATION_SCALE, fits_amount};

/// Stateless service for the purchase order lifecycle.
pub struct ProcurementService;

impl ProcurementService {
    /// Validates the quantities of a new or edited line.
    ///
    /// # Errors
    ///
    /// Returns an error for a non-positive quantity or conversion factor,
    /// a negative unit price, or values the order columns cannot hold.
    pub fn validate_line(
        quantity: Decimal,
        unit_price: Decimal,
        conversion_factor: Decimal,
    ) -> Result<(), ProcurementError> {
        if quantity <= Decimal::ZERO {
            return Err(ProcurementError::InvalidQuantity(quantity));
        }
        if unit_price < Decimal::ZERO {
            return Err(ProcurementError::InvalidPrice(unit_price));
        }
        if conversion_factor <= Decimal::ZERO {
            return Err(ProcurementError::InvalidConversionFactor(conversion_factor));
        }
        if !fits_amount(quantity)
            || !fits_amount(unit_price)
            || conversion_factor > MAX_CONVERSION_FACTOR
        {
            return Err(ProcurementError::OutOfRange);
        }
        line_amount(quantity, unit_price)?;
        checked(quantity.checked_mul(conversion_factor))?;
        Ok(())
    }

    /// Fails unless the order is a draft.
    ///
    /// # Errors
    ///
    /// Returns `ProcurementError::CannotModify` for any other status.
    pub fn ensure_editable(status: PurchaseOrderStatus) -> Result<(), ProcurementError> {
        if status.is_editable() {
            Ok(())
        } else {
            Err(ProcurementError::CannotModify(status))
        }
    }

    /// Submit a draft order.
    ///
    /// # Errors
    ///
    /// Returns `ProcurementError::InvalidTransition` unless the order is a
    /// draft, and `ProcurementError::EmptyOrder` when it has no items.
    pub fn submit(
        current_status: PurchaseOrderStatus,
        item_count: usize,
        submitted_by: Uuid,
    ) -> Result<ProcurementAction, ProcurementError> {
        if current_status != PurchaseOrderStatus::Draft {
            return Err(ProcurementError::InvalidTransition {
                from: current_status,
                to: PurchaseOrderStatus::Submitted,
            });
        }
        if item_count == 0 {
            return Err(ProcurementError::EmptyOrder);
        }
        Ok(ProcurementAction::Submit {
            new_status: PurchaseOrderStatus::Submitted,
            submitted_by,
            submitted_at: Utc::now(),
        })
    }

    /// Cancel a submitted order that received nothing.
    ///
    /// # Errors
    ///
    /// Returns `ProcurementError::InvalidTransition` unless the order is
    /// submitted, and `ProcurementError::HasReceipts` if goods arrived.
    pub fn cancel(
        current_status: PurchaseOrderStatus,
        lines: &[OrderLine],
        cancelled_by: Uuid,
    ) -> Result<ProcurementAction, ProcurementError> {
        if current_status != PurchaseOrderStatus::Submitted {
            return Err(ProcurementError::InvalidTransition {
                from: current_status,
                to: PurchaseOrderStatus::Cancelled,
            });
        }
        if has_receipts(lines) {
            return Err(ProcurementError::HasReceipts);
        }
        Ok(ProcurementAction::Cancel {
            new_status: PurchaseOrderStatus::Cancelled,
            cancelled_by,
            cancelled_at: Utc::now(),
        })
    }

    /// Close an order so no further goods are received.
    ///
    /// # Errors
    ///
    /// Returns `ProcurementError::InvalidTransition` for draft, completed,
    /// cancelled or already closed orders.
    pub fn close(
        current_status: PurchaseOrderStatus,
        closed_by: Uuid,
    ) -> Result<ProcurementAction, ProcurementError> {
        match current_status {
            PurchaseOrderStatus::Submitted
            | PurchaseOrderStatus::PartiallyReceived
            | PurchaseOrderStatus::Received => Ok(ProcurementAction::Close {
                new_status: PurchaseOrderStatus::Closed,
                closed_by,
                closed_at: Utc::now(),
            }),
            _ => Err(ProcurementError::InvalidTransition {
                from: current_status,
                to: PurchaseOrderStatus::Closed,
            }),
        }
    }

    /// Decide whether an order can be amended.
    ///
    /// A submitted order without receipts is cancelled as part of the
    /// amendment; a cancelled order is amended as is.
    ///
    /// # Errors
    ///
    /// Returns `ProcurementError::HasReceipts` for a submitted order with
    /// receipts and `ProcurementError::CannotModify` for every other status.
    pub fn amend(
        current_status: PurchaseOrderStatus,
        lines: &[OrderLine],
    ) -> Result<AmendPlan, ProcurementError> {
        match current_status {
            PurchaseOrderStatus::Cancelled => Ok(AmendPlan {
                cancel_original: false,
            }),
            PurchaseOrderStatus::Submitted if has_receipts(lines) => {
                Err(ProcurementError::HasReceipts)
            }
            PurchaseOrderStatus::Submitted => Ok(AmendPlan {
                cancel_original: true,
            }),
            other => Err(ProcurementError::CannotModify(other)),
        }
    }

    /// Plan a goods receipt.
    ///
    /// # Errors
    ///
    /// Returns `ProcurementError::InvalidTransition` when the order does not
    /// accept receipts, and a line error for empty, unknown, duplicated or
    /// excessive lines.
    pub fn receive(
        current_status: PurchaseOrderStatus,
        lines: &[OrderLine],
        receipt: &[LineQuantity],
    ) -> Result<ReceiptPlan, ProcurementError> {
        if !current_status.accepts_receipts() {
            return Err(ProcurementError::InvalidTransition {
                from: current_status,
                to: PurchaseOrderStatus::Received,
            });
        }
        check_lines(lines, receipt)?;

        let mut updated = lines.to_vec();
        let mut received = Vec::with_capacity(receipt.len());
        let mut payable = Decimal::ZERO;

        for entry in receipt {
            let line = updated
                .iter_mut()
                .find(|l| l.item_id == entry.item_id)
                .ok_or(ProcurementError::UnknownItem(entry.item_id))?;

            let remaining = line.remaining();
            if entry.quantity > remaining {
                return Err(ProcurementError::OverReceipt {
                    item_id: entry.item_id,
                    requested: entry.quantity,
                    remaining,
                });
            }

            line.received_quantity = checked(line.received_quantity.checked_add(entry.quantity))?;
            let amount = line_amount(entry.quantity, line.unit_price)?;
            payable = checked(payable.checked_add(amount))?;
            let incoming_rate = checked(line.unit_price.checked_div(line.conversion_factor))?
                .round_dp(VALUATION_SCALE);
            received.push(ReceivedLine {
                item_id: entry.item_id,
                quantity: entry.quantity,
                stock_quantity: checked(entry.quantity.checked_mul(line.conversion_factor))?,
                incoming_rate,
                amount,
                received_after: line.received_quantity,
            });
        }

        let received_percentage = Self::received_percentage(&updated);
        let mut new_status = Self::status_after_receipt(&updated);
        if new_status == PurchaseOrderStatus::Received && fully_invoiced(&updated) {
            new_status = PurchaseOrderStatus::Completed;
        }

        Ok(ReceiptPlan {
            lines: received,
            new_status,
            received_percentage,
            payable,
        })
    }

    /// Plan a supplier invoice.
    ///
    /// # Errors
    ///
    /// Returns `ProcurementError::InvalidTransition` when the order does not
    /// accept invoices, and a line error for empty, unknown, duplicated or
    /// excessive lines.
    pub fn invoice(
        current_status: PurchaseOrderStatus,
        lines: &[OrderLine],
        invoice: &[LineQuantity],
    ) -> Result<InvoicePlan, ProcurementError> {
        if !current_status.accepts_invoices() {
            return Err(ProcurementError::InvalidTransition {
                from: current_status,
                to: PurchaseOrderStatus::Completed,
            });
        }
        check_lines(lines, invoice)?;

        let mut updated = lines.to_vec();
        let mut invoiced = Vec::with_capacity(invoice.len());

        for entry in invoice {
            let line = updated
                .iter_mut()
                .find(|l| l.item_id == entry.item_id)
                .ok_or(ProcurementError::UnknownItem(entry.item_id))?;

            let remaining = (line.quantity - line.invoiced_quantity).max(Decimal::ZERO);
            if entry.quantity > remaining {
                return Err(ProcurementError::OverInvoice {
                    item_id: entry.item_id,
                    requested: entry.quantity,
                    remaining,
                });
            }
            line.invoiced_quantity = checked(line.invoiced_quantity.checked_add(entry.quantity))?;
            invoiced.push(LineQuantity {
                item_id: entry.item_id,
                quantity: line.invoiced_quantity,
            });
        }

        let invoiced_percentage = Self::invoiced_percentage(&updated);
        let new_status = if current_status == PurchaseOrderStatus::Received
            && fully_invoiced(&updated)
        {
            PurchaseOrderStatus::Completed
        } else {
            current_status
        };

        Ok(InvoicePlan {
            invoiced,
            new_status,
            invoiced_percentage,
        })
    }

    /// `Σ min(received, quantity) / Σ quantity × 100`, two decimals.
    ///
    /// A partial receipt never rounds to 0 or 100.
    #[must_use]
    pub fn received_percentage(lines: &[OrderLine]) -> Decimal {
        percentage(lines, |l| l.received_quantity)
    }

    /// `Σ min(invoiced, quantity) / Σ quantity × 100`, two decimals.
    #[must_use]
    pub fn invoiced_percentage(lines: &[OrderLine]) -> Decimal {
        percentage(lines, |l| l.invoiced_quantity)
    }

    /// Status implied by the received quantities.
    ///
    /// RECEIVED only once every line has nothing left to receive.
    #[must_use]
    pub fn status_after_receipt(lines: &[OrderLine]) -> PurchaseOrderStatus {
        if !has_receipts(lines) {
            PurchaseOrderStatus::Submitted
        } else if lines.iter().all(|l| l.remaining().is_zero()) {
            PurchaseOrderStatus::Received
        } else {
            PurchaseOrderStatus::PartiallyReceived
        }
    }

    /// Code of the next amendment.
    ///
    /// Amendments of amendments share the root code: `PO-7`, `PO-7-1`,
    /// `PO-7-2`. `existing` are the codes already taken in the organization.
    #[must_use]
    pub fn amendment_code(original_code: &str, is_amendment: bool, existing: &[String]) -> String {
        let base = Self::amendment_base(original_code, is_amendment);
        let prefix = format!("{base}-");
        let next = existing
            .iter()
            .filter_map(|code| code.strip_prefix(&prefix))
            .filter_map(|suffix| suffix.parse::<u32>().ok())
            .max()
            .map_or(1, |n| n + 1);

        format!("{base}-{next}")
    }

    /// Root code shared by every amendment of an order.
    #[must_use]
    pub fn amendment_base(original_code: &str, is_amendment: bool) -> &str {
        if !is_amendment {
            return original_code;
        }
        original_code
            .rsplit_once('-')
            .filter(|(_, suffix)| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
            .map_or(original_code, |(base, _)| base)
    }

    /// Check if a status transition is valid.
    #[must_use]
    pub fn is_valid_transition(from: PurchaseOrderStatus, to: PurchaseOrderStatus) -> bool {
        use PurchaseOrderStatus::{
            Cancelled, Closed, Completed, Draft, PartiallyReceived, Received, Submitted,
        };
        matches!(
            (from, to),
            (Draft, Submitted)
                | (Submitted, PartiallyReceived | Received | Completed | Cancelled | Closed)
                | (PartiallyReceived, PartiallyReceived | Received | Completed | Closed)
                | (Received, Completed | Closed)
        )
    }
}

fn has_receipts(lines: &[OrderLine]) -> bool {
    lines.iter().any(|l| l.received_quantity > Decimal::ZERO)
}

fn fully_invoiced(lines: &[OrderLine]) -> bool {
    lines.iter().all(|l| l.invoiced_quantity >= l.quantity)
}

fn checked(value: Option<Decimal>) -> Result<Decimal, ProcurementError> {
    value
        .filter(|v| fits_amount(*v))
        .ok_or(ProcurementError::OutOfRange)
}

fn check_lines(lines: &[OrderLine], entries: &[LineQuantity]) -> Result<(), ProcurementError> {
    if entries.is_empty() {
        return Err(ProcurementError::NoLines);
    }
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if !seen.insert(entry.item_id) {
            return Err(ProcurementError::DuplicateLine(entry.item_id));
        }
        if entry.quantity <= Decimal::ZERO {
            return Err(ProcurementError::InvalidQuantity(entry.quantity));
        }
        if !fits_amount(entry.quantity) {
            return Err(ProcurementError::OutOfRange);
        }
        if !lines.iter().any(|l| l.item_id == entry.item_id) {
            return Err(ProcurementError::UnknownItem(entry.item_id));
        }
    }
    Ok(())
}

fn percentage(lines: &[OrderLine], done: impl Fn(&OrderLine) -> Decimal) -> Decimal {
    let step = Decimal::new(1, PERCENTAGE_SCALE);
    let ordered = lines
        .iter()
        .fold(Decimal::ZERO, |total, l| total.saturating_add(l.quantity));
    if ordered <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let completed = lines.iter().fold(Decimal::ZERO, |total, l| {
        total.saturating_add(done(l).min(l.quantity).max(Decimal::ZERO))
    });
    if completed.is_zero() {
        return Decimal::ZERO;
    }
    if completed >= ordered {
        return Decimal::ONE_HUNDRED;
    }
    let ratio = completed
        .checked_div(ordered)
        .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ZERO)
        .round_dp(PERCENTAGE_SCALE);
    ratio.clamp(step, Decimal::ONE_HUNDRED - step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(quantity: Decimal, unit_price: Decimal, cf: Decimal) -> OrderLine {
        OrderLine {
            item_id: Uuid::new_v4(),
            quantity,
            unit_price,
            conversion_factor: cf,
            received_quantity: Decimal::ZERO,
            invoiced_quantity: Decimal::ZERO,
        }
    }

    fn qty(item_id: Uuid, quantity: Decimal) -> LineQuantity {
        LineQuantity { item_id, quantity }
    }

    #[test]
    fn test_validate_line() {
        assert!(ProcurementService::validate_line(dec!(1), dec!(0), dec!(1)).is_ok());
        assert_eq!(
            ProcurementService::validate_line(dec!(0), dec!(1), dec!(1)),
            Err(ProcurementError::InvalidQuantity(dec!(0)))
        );
        assert_eq!(
            ProcurementService::validate_line(dec!(1), dec!(-1), dec!(1)),
            Err(ProcurementError::InvalidPrice(dec!(-1)))
        );
        assert_eq!(
            ProcurementService::validate_line(dec!(1), dec!(1), dec!(0)),
            Err(ProcurementError::InvalidConversionFactor(dec!(0)))
        );
    }

    #[test]
    fn test_submit() {
        let user = Uuid::new_v4();
        let action = ProcurementService::submit(PurchaseOrderStatus::Draft, 2, user).unwrap();
        assert_eq!(action.new_status(), PurchaseOrderStatus::Submitted);
        if let ProcurementAction::Submit { submitted_by, .. } = action {
            assert_eq!(submitted_by, user);
        } else {
            panic!("Expected Submit action");
        }

        assert_eq!(
            ProcurementService::submit(PurchaseOrderStatus::Draft, 0, user).unwrap_err(),
            ProcurementError::EmptyOrder
        );
        assert!(matches!(
            ProcurementService::submit(PurchaseOrderStatus::Submitted, 1, user),
            Err(ProcurementError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_ensure_editable() {
        assert!(ProcurementService::ensure_editable(PurchaseOrderStatus::Draft).is_ok());
        assert_eq!(
            ProcurementService::ensure_editable(PurchaseOrderStatus::Closed),
            Err(ProcurementError::CannotModify(PurchaseOrderStatus::Closed))
        );
    }

    #[test]
    fn test_partial_then_full_receipt() {
        let a = line(dec!(10), dec!(20), dec!(10));
        let b = line(dec!(30), dec!(5), dec!(1));
        let lines = vec![a.clone(), b.clone()];

        let plan = ProcurementService::receive(
            PurchaseOrderStatus::Submitted,
            &lines,
            &[qty(a.item_id, dec!(4))],
        )
        .unwrap();
        assert_eq!(plan.new_status, PurchaseOrderStatus::PartiallyReceived);
        assert_eq!(plan.received_percentage, dec!(10));
        assert_eq!(plan.payable, dec!(80));
        let received = &plan.lines[0];
        assert_eq!(received.stock_quantity, dec!(40));
        assert_eq!(received.incoming_rate, dec!(2));
        assert_eq!(received.received_after, dec!(4));

        let mut lines = lines;
        lines[0].received_quantity = dec!(4);
        let plan = ProcurementService::receive(
            PurchaseOrderStatus::PartiallyReceived,
            &lines,
            &[qty(a.item_id, dec!(6)), qty(b.item_id, dec!(30))],
        )
        .unwrap();
        assert_eq!(plan.new_status, PurchaseOrderStatus::Received);
        assert_eq!(plan.received_percentage, dec!(100));
        assert_eq!(plan.payable, dec!(270));
    }

    #[test]
    fn test_over_receipt() {
        let mut a = line(dec!(10), dec!(1), dec!(1));
        a.received_quantity = dec!(8);
        assert_eq!(
            ProcurementService::receive(
                PurchaseOrderStatus::PartiallyReceived,
                &[a.clone()],
                &[qty(a.item_id, dec!(3))],
            ),
            Err(ProcurementError::OverReceipt {
                item_id: a.item_id,
                requested: dec!(3),
                remaining: dec!(2)
            })
        );
    }

    #[test]
    fn test_receipt_line_errors() {
        let a = line(dec!(10), dec!(1), dec!(1));
        let lines = [a.clone()];
        let status = PurchaseOrderStatus::Submitted;

        assert_eq!(
            ProcurementService::receive(status, &lines, &[]),
            Err(ProcurementError::NoLines)
        );
        let stranger = Uuid::new_v4();
        assert_eq!(
            ProcurementService::receive(status, &lines, &[qty(stranger, dec!(1))]),
            Err(ProcurementError::UnknownItem(stranger))
        );
        assert_eq!(
            ProcurementService::receive(
                status,
                &lines,
                &[qty(a.item_id, dec!(1)), qty(a.item_id, dec!(1))]
            ),
            Err(ProcurementError::DuplicateLine(a.item_id))
        );
        assert_eq!(
            ProcurementService::receive(status, &lines, &[qty(a.item_id, dec!(-1))]),
            Err(ProcurementError::InvalidQuantity(dec!(-1)))
        );
    }

    #[test]
    fn test_receive_requires_open_order() {
        let a = line(dec!(1), dec!(1), dec!(1));
        for status in [
            PurchaseOrderStatus::Draft,
            PurchaseOrderStatus::Received,
            PurchaseOrderStatus::Cancelled,
            PurchaseOrderStatus::Closed,
            PurchaseOrderStatus::Completed,
        ] {
            assert!(matches!(
                ProcurementService::receive(status, &[a.clone()], &[qty(a.item_id, dec!(1))]),
                Err(ProcurementError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn test_invoice_completes_received_order() {
        let mut a = line(dec!(10), dec!(1), dec!(1));
        a.received_quantity = dec!(10);

        let plan = ProcurementService::invoice(
            PurchaseOrderStatus::Received,
            &[a.clone()],
            &[qty(a.item_id, dec!(4))],
        )
        .unwrap();
        assert_eq!(plan.new_status, PurchaseOrderStatus::Received);
        assert_eq!(plan.invoiced_percentage, dec!(40));
        assert_eq!(plan.invoiced, vec![qty(a.item_id, dec!(4))]);

        a.invoiced_quantity = dec!(4);
        let plan = ProcurementService::invoice(
            PurchaseOrderStatus::Received,
            &[a.clone()],
            &[qty(a.item_id, dec!(6))],
        )
        .unwrap();
        assert_eq!(plan.new_status, PurchaseOrderStatus::Completed);
        assert_eq!(plan.invoiced_percentage, dec!(100));

        a.invoiced_quantity = dec!(10);
        assert!(matches!(
            ProcurementService::invoice(
                PurchaseOrderStatus::Received,
                &[a.clone()],
                &[qty(a.item_id, dec!(1))]
            ),
            Err(ProcurementError::OverInvoice { .. })
        ));
    }

    #[test]
    fn test_receipt_after_full_invoice_completes() {
        let mut a = line(dec!(5), dec!(2), dec!(1));
        a.invoiced_quantity = dec!(5);
        let plan = ProcurementService::receive(
            PurchaseOrderStatus::Submitted,
            &[a.clone()],
            &[qty(a.item_id, dec!(5))],
        )
        .unwrap();
        assert_eq!(plan.new_status, PurchaseOrderStatus::Completed);
    }

    #[test]
    fn test_cancel() {
        let user = Uuid::new_v4();
        let a = line(dec!(5), dec!(2), dec!(1));
        let action =
            ProcurementService::cancel(PurchaseOrderStatus::Submitted, &[a.clone()], user).unwrap();
        assert_eq!(action.new_status(), PurchaseOrderStatus::Cancelled);
        assert_eq!(action.new_status().doc_status().code(), 2);

        let mut received = a;
        received.received_quantity = dec!(1);
        assert_eq!(
            ProcurementService::cancel(PurchaseOrderStatus::Submitted, &[received], user)
                .unwrap_err(),
            ProcurementError::HasReceipts
        );
        assert!(matches!(
            ProcurementService::cancel(PurchaseOrderStatus::Draft, &[], user),
            Err(ProcurementError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_close() {
        let user = Uuid::new_v4();
        for status in [
            PurchaseOrderStatus::Submitted,
            PurchaseOrderStatus::PartiallyReceived,
            PurchaseOrderStatus::Received,
        ] {
            assert_eq!(
                ProcurementService::close(status, user).unwrap().new_status(),
                PurchaseOrderStatus::Closed
            );
        }
        for status in [
            PurchaseOrderStatus::Draft,
            PurchaseOrderStatus::Completed,
            PurchaseOrderStatus::Cancelled,
            PurchaseOrderStatus::Closed,
        ] {
            assert!(ProcurementService::close(status, user).is_err());
        }
    }

    #[test]
    fn test_amend() {
        let a = line(dec!(5), dec!(2), dec!(1));
        assert_eq!(
            ProcurementService::amend(PurchaseOrderStatus::Submitted, &[a.clone()]),
            Ok(AmendPlan {
                cancel_original: true
            })
        );
        assert_eq!(
            ProcurementService::amend(PurchaseOrderStatus::Cancelled, &[a.clone()]),
            Ok(AmendPlan {
                cancel_original: false
            })
        );

        let mut received = a;
        received.received_quantity = dec!(2);
        assert_eq!(
            ProcurementService::amend(PurchaseOrderStatus::Submitted, &[received.clone()]),
            Err(ProcurementError::HasReceipts)
        );
        assert_eq!(
            ProcurementService::amend(PurchaseOrderStatus::Draft, &[received]),
            Err(ProcurementError::CannotModify(PurchaseOrderStatus::Draft))
        );
    }

    #[test]
    fn test_amendment_code() {
        let none: Vec<String> = vec![];
        assert_eq!(
            ProcurementService::amendment_code("PO-2026-0007", false, &none),
            "PO-2026-0007-1"
        );

        let existing = vec!["PO-2026-0007-1".to_string(), "PO-2026-0007-2".to_string()];
        assert_eq!(
            ProcurementService::amendment_code("PO-2026-0007-2", true, &existing),
            "PO-2026-0007-3"
        );
        assert_eq!(
            ProcurementService::amendment_code("PO-2026-0007", false, &existing),
            "PO-2026-0007-3"
        );
    }

    #[test]
    fn test_percentage_rounds_to_two_places() {
        let mut a = line(dec!(3), dec!(1), dec!(1));
        a.received_quantity = dec!(1);
        assert_eq!(ProcurementService::received_percentage(&[a]), dec!(33.33));
        assert_eq!(ProcurementService::received_percentage(&[]), dec!(0));
    }

    #[test]
    fn test_valid_transitions() {
        use PurchaseOrderStatus::*;
        assert!(ProcurementService::is_valid_transition(Draft, Submitted));
        assert!(ProcurementService::is_valid_transition(Submitted, Cancelled));
        assert!(ProcurementService::is_valid_transition(Received, Completed));
        assert!(!ProcurementService::is_valid_transition(Draft, Received));
        assert!(!ProcurementService::is_valid_transition(Cancelled, Draft));
        assert!(!ProcurementService::is_valid_transition(PartiallyReceived, Cancelled));
        assert!(!ProcurementService::is_valid_transition(Closed, Submitted));
    }

    #[test]
    fn test_nearly_complete_receipt_stays_partial() {
        let a = line(dec!(100000), dec!(1), dec!(1));
        let plan = ProcurementService::receive(
            PurchaseOrderStatus::Submitted,
            &[a.clone()],
            &[qty(a.item_id, dec!(99999))],
        )
        .unwrap();
        assert_eq!(plan.new_status, PurchaseOrderStatus::PartiallyReceived);
        assert_eq!(plan.received_percentage, dec!(99.99));
        assert!(plan.new_status.accepts_receipts());

        let mut a = a;
        a.received_quantity = dec!(99999);
        let plan = ProcurementService::receive(
            plan.new_status,
            &[a.clone()],
            &[qty(a.item_id, dec!(1))],
        )
        .unwrap();
        assert_eq!(plan.new_status, PurchaseOrderStatus::Received);
        assert_eq!(plan.received_percentage, dec!(100));
    }

    #[test]
    fn test_tiny_receipt_is_partial() {
        let a = line(dec!(1000000), dec!(1), dec!(1));
        let plan = ProcurementService::receive(
            PurchaseOrderStatus::Submitted,
            &[a.clone()],
            &[qty(a.item_id, dec!(1))],
        )
        .unwrap();
        assert_eq!(plan.new_status, PurchaseOrderStatus::PartiallyReceived);
        assert_eq!(plan.received_percentage, dec!(0.01));
    }

    #[test]
    fn test_nearly_complete_invoice_does_not_complete() {
        let mut a = line(dec!(100000), dec!(1), dec!(1));
        a.received_quantity = dec!(100000);
        let plan = ProcurementService::invoice(
            PurchaseOrderStatus::Received,
            &[a.clone()],
            &[qty(a.item_id, dec!(99999))],
        )
        .unwrap();
        assert_eq!(plan.new_status, PurchaseOrderStatus::Received);
        assert_eq!(plan.invoiced_percentage, dec!(99.99));

        let mut b = line(dec!(100000), dec!(1), dec!(1));
        b.invoiced_quantity = dec!(99999);
        let plan = ProcurementService::receive(
            PurchaseOrderStatus::Submitted,
            &[b.clone()],
            &[qty(b.item_id, dec!(100000))],
        )
        .unwrap();
        assert_eq!(plan.new_status, PurchaseOrderStatus::Received);
    }

    #[test]
    fn test_out_of_range_amounts_are_rejected() {
        assert_eq!(
            ProcurementService::validate_line(Decimal::MAX, dec!(1), dec!(1)),
            Err(ProcurementError::OutOfRange)
        );
        assert_eq!(
            ProcurementService::validate_line(dec!(1), Decimal::MAX, dec!(1)),
            Err(ProcurementError::OutOfRange)
        );
        assert_eq!(
            ProcurementService::validate_line(dec!(1), dec!(1), Decimal::MAX),
            Err(ProcurementError::OutOfRange)
        );
        assert_eq!(
            ProcurementService::validate_line(dec!(100000000000), dec!(100000), dec!(1)),
            Err(ProcurementError::OutOfRange)
        );

        let a = line(Decimal::MAX, Decimal::MAX, Decimal::MAX);
        assert_eq!(
            ProcurementService::receive(
                PurchaseOrderStatus::Submitted,
                &[a.clone()],
                &[qty(a.item_id, Decimal::MAX)],
            ),
            Err(ProcurementError::OutOfRange)
        );

        let b = line(dec!(100000000000), dec!(100000), dec!(1));
        assert_eq!(
            ProcurementService::receive(
                PurchaseOrderStatus::Submitted,
                &[b.clone()],
                &[qty(b.item_id, dec!(100000000000))],
            ),
            Err(ProcurementError::OutOfRange)
        );
    }
}
