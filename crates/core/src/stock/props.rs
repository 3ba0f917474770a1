//! Property-based tests for the stock ledger and FEFO planner.
//!
//! - Allocation bound: `0 <= allocated_quantity <= quantity` after any
//!   sequence of accepted movements.
//! - Value continuity: the stock value differences of a line sum to its
//!   current stock value.
//! - FEFO plans take exactly the requested quantity, in expiry order.
//! - Amounts beyond `NUMERIC(19,4)` are rejected, never panicked on.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::error::StockError;
use super::fefo::{FefoCandidate, FefoPlanner};
use super::ledger::StockLedger;
use super::types::{MAX_AMOUNT, MovementKind, MovementRequest, StockPosition};

fn posting_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 15).unwrap_or_default()
}

/// Quantities with up to two decimals, 0.01 to 1,000.00.
fn quantity() -> impl Strategy<Value = Decimal> {
    (1i64..100_000i64).prop_map(|v| Decimal::new(v, 2))
}

/// Rates with up to four decimals.
fn rate() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000i64).prop_map(|v| Decimal::new(v, 4))
}

/// Magnitudes beyond what the stock columns hold, up to `Decimal::MAX`.
fn oversized() -> impl Strategy<Value = Decimal> {
    prop_oneof![
        Just(Decimal::MAX),
        (1u32..=28, any::<u64>()).prop_map(|(scale_down, noise)| {
            let step = Decimal::from(noise) / Decimal::from(10u64.pow(scale_down.min(19)));
            MAX_AMOUNT.saturating_add(Decimal::ONE).saturating_add(step.abs())
        }),
    ]
}

/// Any value a request body could carry.
fn any_amount() -> impl Strategy<Value = Decimal> {
    prop_oneof![quantity(), oversized(), oversized().prop_map(|v| -v)]
}

fn kind() -> impl Strategy<Value = MovementKind> {
    prop::sample::select(MovementKind::ALL.to_vec())
}

fn request() -> impl Strategy<Value = MovementRequest> {
    (kind(), quantity(), rate(), any::<bool>()).prop_map(|(kind, q, rate, negative)| {
        let quantity = if kind == MovementKind::Adjustment && negative {
            -q
        } else {
            q
        };
        let request = MovementRequest::new(kind, quantity, posting_date());
        if kind.accepts_rate() {
            request.with_rate(rate)
        } else {
            request
        }
    })
}

fn candidate() -> impl Strategy<Value = FefoCandidate> {
    (
        proptest::option::of(0i64..400),
        quantity(),
        0u32..=100,
        prop::bool::weighted(0.2),
        "[A-Z][0-9]{3}",
    )
        .prop_map(|(offset, quantity, allocated_pct, is_quarantined, batch)| {
            let allocated = (quantity * Decimal::from(allocated_pct) / Decimal::from(100))
                .round_dp(2);
            FefoCandidate {
                stock_id: Uuid::new_v4(),
                batch_number: batch,
                expiry_date: offset
                    .map(|days| posting_date() + chrono::Duration::days(days - 30)),
                quantity,
                allocated_quantity: allocated,
                is_quarantined,
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_allocation_bound_holds(requests in prop::collection::vec(request(), 1..40)) {
        let mut position = StockPosition::empty(None);
        for request in &requests {
            if let Ok(outcome) = StockLedger::apply(&position, request) {
                prop_assert!(outcome.position.allocated_quantity >= Decimal::ZERO);
                prop_assert!(outcome.position.allocated_quantity <= outcome.position.quantity);
                prop_assert!(outcome.position.valuation_rate >= Decimal::ZERO);
                prop_assert_eq!(outcome.movement.balance_after, outcome.position.quantity);
                prop_assert_eq!(outcome.movement.allocated_after, outcome.position.allocated_quantity);
                position = outcome.position;
            }
        }
    }

    #[test]
    fn prop_value_differences_sum_to_stock_value(requests in prop::collection::vec(request(), 1..40)) {
        let mut position = StockPosition::empty(None);
        let mut total = Decimal::ZERO;
        for request in &requests {
            if let Ok(outcome) = StockLedger::apply(&position, request) {
                total += outcome.movement.stock_value_difference;
                position = outcome.position;
            }
        }
        prop_assert_eq!(Some(total), position.stock_value());
    }

    #[test]
    fn prop_rejected_movement_is_explained(position_qty in quantity(), q in quantity()) {
        let position = StockPosition {
            quantity: position_qty,
            ..StockPosition::empty(None)
        };
        let result = StockLedger::apply(
            &position,
            &MovementRequest::new(MovementKind::Sale, q, posting_date()),
        );
        if q > position_qty {
            prop_assert_eq!(result, Err(StockError::InsufficientStock { requested: q, available: position_qty }));
        } else {
            prop_assert!(result.is_ok());
        }
    }

    #[test]
    fn prop_fefo_plan_takes_exact_quantity_in_order(
        candidates in prop::collection::vec(candidate(), 0..12),
        requested in quantity(),
    ) {
        let as_of = posting_date();
        let available = FefoPlanner::available(&candidates, as_of);

        match FefoPlanner::plan(&candidates, requested, as_of) {
            Ok(picks) => {
                let taken: Decimal = picks.iter().map(|p| p.quantity).sum();
                prop_assert_eq!(taken, requested);

                for pair in picks.windows(2) {
                    match (pair[0].expiry_date, pair[1].expiry_date) {
                        (Some(a), Some(b)) => prop_assert!(a <= b),
                        (None, Some(_)) => prop_assert!(false, "no-expiry batch picked first"),
                        _ => {}
                    }
                }

                for pick in &picks {
                    let source = candidates.iter().find(|c| c.stock_id == pick.stock_id);
                    prop_assert!(source.is_some());
                    if let Some(source) = source {
                        prop_assert!(!source.is_quarantined);
                        prop_assert!(pick.quantity > Decimal::ZERO);
                        prop_assert!(pick.quantity <= source.available());
                        prop_assert!(source.expiry_date.is_none_or(|e| e > as_of));
                    }
                }
            }
            Err(err) => {
                prop_assert!(available < requested);
                prop_assert_eq!(err, StockError::InsufficientStock { requested, available });
            }
        }
    }

    #[test]
    fn prop_oversized_quantity_is_rejected(kind in kind(), q in oversized(), negative in any::<bool>()) {
        let quantity = if negative { -q } else { q };
        let position = StockPosition {
            quantity: Decimal::from(10),
            valuation_rate: Decimal::from(2),
            ..StockPosition::empty(None)
        };
        let result = StockLedger::apply(&position, &MovementRequest::new(kind, quantity, posting_date()));
        prop_assert!(result.is_err());
        if quantity > Decimal::ZERO || kind == MovementKind::Adjustment {
            prop_assert_eq!(result, Err(StockError::OutOfRange));
        }
    }

    #[test]
    fn prop_any_amounts_never_panic(
        position_qty in any_amount(),
        position_rate in any_amount(),
        q in any_amount(),
        incoming in any_amount(),
        kind in kind(),
    ) {
        let position = StockPosition {
            quantity: position_qty.abs(),
            valuation_rate: position_rate.abs(),
            ..StockPosition::empty(None)
        };
        let mut request = MovementRequest::new(kind, q, posting_date());
        if kind.accepts_rate() {
            request = request.with_rate(incoming.abs());
        }
        if let Ok(outcome) = StockLedger::apply(&position, &request) {
            prop_assert!(outcome.position.quantity.abs() <= MAX_AMOUNT);
            prop_assert!(outcome.movement.stock_value.abs() <= MAX_AMOUNT);
            prop_assert!(outcome.movement.stock_value_difference.abs() <= MAX_AMOUNT);
        }
    }

    #[test]
    fn prop_fefo_rejects_oversized_request(
        candidates in prop::collection::vec(candidate(), 0..6),
        requested in oversized(),
    ) {
        prop_assert_eq!(
            FefoPlanner::plan(&candidates, requested, posting_date()),
            Err(StockError::OutOfRange)
        );
    }
}
