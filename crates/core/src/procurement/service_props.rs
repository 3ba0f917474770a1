//! Property-based tests for ProcurementService.
//!
//! - Received quantities only grow and never pass the ordered quantity.
//! - Percentages stay within 0..=100.
//! - Only valid transitions are produced.
//! - RECEIVED means every line is fully received, whatever the rounding.
//! - Oversized receipts are rejected, never panicked on.

use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::error::ProcurementError;
use super::service::ProcurementService;
use super::types::{LineQuantity, OrderLine, PurchaseOrderStatus};
use crate::stock::MAX_AMOUNT;

fn arb_status() -> impl Strategy<Value = PurchaseOrderStatus> {
    prop_oneof![
        Just(PurchaseOrderStatus::Draft),
        Just(PurchaseOrderStatus::Submitted),
        Just(PurchaseOrderStatus::PartiallyReceived),
        Just(PurchaseOrderStatus::Received),
        Just(PurchaseOrderStatus::Completed),
        Just(PurchaseOrderStatus::Cancelled),
        Just(PurchaseOrderStatus::Closed),
    ]
}

fn arb_line() -> impl Strategy<Value = OrderLine> {
    (1i64..1_000, 0i64..100_000, 1i64..50).prop_map(|(quantity, price_cents, cf)| OrderLine {
        item_id: Uuid::new_v4(),
        quantity: Decimal::from(quantity),
        unit_price: Decimal::new(price_cents, 2),
        conversion_factor: Decimal::from(cf),
        received_quantity: Decimal::ZERO,
        invoiced_quantity: Decimal::ZERO,
    })
}

/// Lines plus a sequence of receipt attempts as (line index, quantity).
fn arb_receipts() -> impl Strategy<Value = (Vec<OrderLine>, Vec<(usize, i64)>)> {
    prop::collection::vec(arb_line(), 1..6).prop_flat_map(|lines| {
        let n = lines.len();
        (
            Just(lines),
            prop::collection::vec((0..n, 1i64..600), 1..20),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_receipts_are_monotone_and_bounded((mut lines, attempts) in arb_receipts()) {
        let mut status = PurchaseOrderStatus::Submitted;

        for (index, q) in attempts {
            let item_id = lines[index].item_id;
            let before = lines[index].received_quantity;
            let receipt = [LineQuantity { item_id, quantity: Decimal::from(q) }];

            match ProcurementService::receive(status, &lines, &receipt) {
                Ok(plan) => {
                    prop_assert!(ProcurementService::is_valid_transition(status, plan.new_status)
                        || plan.new_status == status);
                    for received in &plan.lines {
                        let line = lines.iter_mut().find(|l| l.item_id == received.item_id);
                        prop_assert!(line.is_some());
                        if let Some(line) = line {
                            prop_assert!(received.received_after > line.received_quantity);
                            prop_assert!(received.received_after <= line.quantity);
                            prop_assert_eq!(received.stock_quantity, received.quantity * line.conversion_factor);
                            line.received_quantity = received.received_after;
                        }
                    }
                    prop_assert!(plan.received_percentage >= Decimal::ZERO);
                    prop_assert!(plan.received_percentage <= Decimal::ONE_HUNDRED);
                    status = plan.new_status;
                }
                Err(_) => {
                    prop_assert_eq!(lines[index].received_quantity, before);
                }
            }
        }

        let fully_received = lines.iter().all(|l| l.received_quantity == l.quantity);
        prop_assert_eq!(fully_received, status == PurchaseOrderStatus::Received);
    }

    #[test]
    fn prop_only_drafts_are_editable(status in arb_status()) {
        prop_assert_eq!(
            ProcurementService::ensure_editable(status).is_ok(),
            status == PurchaseOrderStatus::Draft
        );
    }

    #[test]
    fn prop_submit_only_from_draft(status in arb_status(), items in 0usize..5) {
        let result = ProcurementService::submit(status, items, Uuid::new_v4());
        prop_assert_eq!(result.is_ok(), status == PurchaseOrderStatus::Draft && items > 0);
        if let Ok(action) = result {
            prop_assert!(ProcurementService::is_valid_transition(status, action.new_status()));
        }
    }

    #[test]
    fn prop_close_and_cancel_follow_transition_table(status in arb_status()) {
        let user = Uuid::new_v4();
        if let Ok(action) = ProcurementService::close(status, user) {
            prop_assert!(ProcurementService::is_valid_transition(status, action.new_status()));
        }
        if let Ok(action) = ProcurementService::cancel(status, &[], user) {
            prop_assert!(ProcurementService::is_valid_transition(status, action.new_status()));
        }
    }

    #[test]
    fn prop_short_receipt_keeps_order_open(ordered in 2i64..10_000_000_000, short_by in 1i64..1_000) {
        let short_by = short_by.min(ordered - 1);
        let line = OrderLine {
            item_id: Uuid::new_v4(),
            quantity: Decimal::from(ordered),
            unit_price: Decimal::ONE,
            conversion_factor: Decimal::ONE,
            received_quantity: Decimal::ZERO,
            invoiced_quantity: Decimal::from(ordered),
        };
        let receipt = [LineQuantity {
            item_id: line.item_id,
            quantity: Decimal::from(ordered - short_by),
        }];

        let plan = ProcurementService::receive(PurchaseOrderStatus::Submitted, &[line], &receipt);
        prop_assert!(plan.is_ok());
        if let Ok(plan) = plan {
            prop_assert_eq!(plan.new_status, PurchaseOrderStatus::PartiallyReceived);
            prop_assert!(plan.new_status.accepts_receipts());
            prop_assert!(plan.received_percentage < Decimal::ONE_HUNDRED);
            prop_assert!(plan.received_percentage > Decimal::ZERO);
        }
    }

    #[test]
    fn prop_oversized_receipt_is_rejected(extra in 1u64..u64::MAX, price_cents in 0i64..100_000) {
        let quantity = MAX_AMOUNT.saturating_add(Decimal::from(extra));
        let line = OrderLine {
            item_id: Uuid::new_v4(),
            quantity,
            unit_price: Decimal::new(price_cents, 2),
            conversion_factor: Decimal::ONE,
            received_quantity: Decimal::ZERO,
            invoiced_quantity: Decimal::ZERO,
        };
        let receipt = [LineQuantity { item_id: line.item_id, quantity }];
        prop_assert_eq!(
            ProcurementService::receive(PurchaseOrderStatus::Submitted, &[line], &receipt),
            Err(ProcurementError::OutOfRange)
        );
    }
}
