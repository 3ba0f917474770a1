//! First-expiry-first-out picking.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

use crate::stock::error::StockError;
use crate::stock::types::{MovementKind, fits_amount};

/// A stock line considered for picking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FefoCandidate {
    /// Stock line.
    pub stock_id: Uuid,
    /// Batch number.
    pub batch_number: String,
    /// Batch expiry; `None` sorts last.
    pub expiry_date: Option<NaiveDate>,
    /// Quantity on hand.
    pub quantity: Decimal,
    /// Quantity reserved.
    pub allocated_quantity: Decimal,
    /// Quarantined lines are never picked.
    pub is_quarantined: bool,
}

impl FefoCandidate {
    /// Quantity that can be picked.
    #[must_use]
    pub fn available(&self) -> Decimal {
        self.quantity.saturating_sub(self.allocated_quantity)
    }

    fn is_pickable(&self, as_of: NaiveDate) -> bool {
        !self.is_quarantined
            && self.available() > Decimal::ZERO
            && self.expiry_date.is_none_or(|expiry| expiry > as_of)
    }
}

/// One batch taken by a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FefoPick {
    /// Stock line.
    pub stock_id: Uuid,
    /// Batch number.
    pub batch_number: String,
    /// Batch expiry.
    pub expiry_date: Option<NaiveDate>,
    /// Quantity taken from the batch.
    pub quantity: Decimal,
}

/// Stateless FEFO planner.
pub struct FefoPlanner;

impl FefoPlanner {
    /// Orders pickable candidates: earliest expiry first, lines without an
    /// expiry last, ties broken by batch number.
    #[must_use]
    pub fn order(candidates: &[FefoCandidate], as_of: NaiveDate) -> Vec<&FefoCandidate> {
        let mut pickable: Vec<&FefoCandidate> = candidates
            .iter()
            .filter(|c| c.is_pickable(as_of))
            .collect();
        pickable.sort_by(|a, b| {
            compare_expiry(a.expiry_date, b.expiry_date)
                .then_with(|| a.batch_number.cmp(&b.batch_number))
        });
        pickable
    }

    /// Total quantity that a plan could take.
    #[must_use]
    pub fn available(candidates: &[FefoCandidate], as_of: NaiveDate) -> Decimal {
        Self::order(candidates, as_of)
            .iter()
            .fold(Decimal::ZERO, |total, c| total.saturating_add(c.available()))
    }

    /// Plans a pick of `requested` units.
    ///
    /// # Errors
    ///
    /// Returns `StockError::NonPositiveQuantity` for a non-positive request,
    /// `StockError::OutOfRange` for a request the stock columns cannot hold
    /// and `StockError::InsufficientStock` when the pickable total is short.
    pub fn plan(
        candidates: &[FefoCandidate],
        requested: Decimal,
        as_of: NaiveDate,
    ) -> Result<Vec<FefoPick>, StockError> {
        if requested <= Decimal::ZERO {
            return Err(StockError::NonPositiveQuantity {
                kind: MovementKind::Sale,
                quantity: requested,
            });
        }

        if !fits_amount(requested) {
            return Err(StockError::OutOfRange);
        }

        let ordered = Self::order(candidates, as_of);
        let available = ordered
            .iter()
            .try_fold(Decimal::ZERO, |total, c| total.checked_add(c.available()))
            .ok_or(StockError::OutOfRange)?;
        if available < requested {
            return Err(StockError::InsufficientStock {
                requested,
                available,
            });
        }

        let mut remaining = requested;
        let mut picks = Vec::new();
        for candidate in ordered {
            if remaining.is_zero() {
                break;
            }
            let take = candidate.available().min(remaining);
            picks.push(FefoPick {
                stock_id: candidate.stock_id,
                batch_number: candidate.batch_number.clone(),
                expiry_date: candidate.expiry_date,
                quantity: take,
            });
            remaining -= take;
        }

        Ok(picks)
    }
}

fn compare_expiry(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn candidate(batch: &str, expiry: Option<NaiveDate>, quantity: Decimal) -> FefoCandidate {
        FefoCandidate {
            stock_id: Uuid::new_v4(),
            batch_number: batch.to_string(),
            expiry_date: expiry,
            quantity,
            allocated_quantity: Decimal::ZERO,
            is_quarantined: false,
        }
    }

    #[test]
    fn test_orders_by_expiry_then_batch() {
        let today = date(2026, 1, 1);
        let lines = vec![
            candidate("C", None, dec!(5)),
            candidate("B", Some(date(2026, 6, 1)), dec!(5)),
            candidate("A", Some(date(2026, 6, 1)), dec!(5)),
            candidate("D", Some(date(2026, 3, 1)), dec!(5)),
        ];
        let batches: Vec<_> = FefoPlanner::order(&lines, today)
            .iter()
            .map(|c| c.batch_number.as_str())
            .collect();
        assert_eq!(batches, vec!["D", "A", "B", "C"]);
    }

    #[test]
    fn test_skips_quarantined_expired_and_fully_allocated() {
        let today = date(2026, 1, 10);
        let mut quarantined = candidate("Q", Some(date(2026, 2, 1)), dec!(10));
        quarantined.is_quarantined = true;
        let expired = candidate("X", Some(date(2026, 1, 10)), dec!(10));
        let mut reserved = candidate("R", Some(date(2026, 2, 2)), dec!(10));
        reserved.allocated_quantity = dec!(10);
        let good = candidate("G", Some(date(2026, 5, 1)), dec!(10));

        let lines = vec![quarantined, expired, reserved, good];
        let ordered = FefoPlanner::order(&lines, today);
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].batch_number, "G");
        assert_eq!(FefoPlanner::available(&lines, today), dec!(10));
    }

    #[test]
    fn test_plan_spans_batches() {
        let today = date(2026, 1, 1);
        let mut first = candidate("B1", Some(date(2026, 2, 1)), dec!(10));
        first.allocated_quantity = dec!(4);
        let second = candidate("B2", Some(date(2026, 4, 1)), dec!(10));
        let third = candidate("B3", None, dec!(10));

        let picks = FefoPlanner::plan(&[third, second, first], dec!(9), today).unwrap();
        assert_eq!(picks.len(), 2);
        assert_eq!(picks[0].batch_number, "B1");
        assert_eq!(picks[0].quantity, dec!(6));
        assert_eq!(picks[1].batch_number, "B2");
        assert_eq!(picks[1].quantity, dec!(3));
    }

    #[test]
    fn test_plan_shortage() {
        let today = date(2026, 1, 1);
        let lines = vec![
            candidate("A", Some(date(2026, 2, 1)), dec!(2)),
            candidate("B", Some(date(2025, 12, 1)), dec!(100)),
        ];
        assert_eq!(
            FefoPlanner::plan(&lines, dec!(3), today),
            Err(StockError::InsufficientStock {
                requested: dec!(3),
                available: dec!(2)
            })
        );
    }

    #[test]
    fn test_plan_rejects_non_positive_request() {
        let lines = vec![candidate("A", None, dec!(2))];
        assert!(matches!(
            FefoPlanner::plan(&lines, dec!(0), date(2026, 1, 1)),
            Err(StockError::NonPositiveQuantity { .. })
        ));
    }

    #[test]
    fn test_plan_rejects_out_of_range_request() {
        let lines = vec![candidate("A", None, dec!(2))];
        assert_eq!(
            FefoPlanner::plan(&lines, Decimal::MAX, date(2026, 1, 1)),
            Err(StockError::OutOfRange)
        );
    }

    #[test]
    fn test_plan_with_huge_candidates_does_not_overflow() {
        let today = date(2026, 1, 1);
        let lines = vec![
            candidate("A", None, Decimal::MAX),
            candidate("B", None, Decimal::MAX),
        ];
        assert_eq!(
            FefoPlanner::plan(&lines, dec!(1), today),
            Err(StockError::OutOfRange)
        );
        assert_eq!(FefoPlanner::available(&lines, today), Decimal::MAX);
    }
}
