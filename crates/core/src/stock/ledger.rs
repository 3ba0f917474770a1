//! Applying movements to a stock line.
//!
//! `StockLedger::apply` is the single place where quantity, allocation and
//! valuation rules live. The repository locks the row, calls it, then
//! writes the new position and appends the returned snapshot.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::stock::error::StockError;
use crate::stock::types::{
    MovementEffect, MovementKind, MovementOutcome, MovementRequest, MovementSnapshot,
    StockPosition, VALUATION_SCALE, fits_amount,
};

/// Stateless service applying movements to stock positions.
pub struct StockLedger;

impl StockLedger {
    /// Applies a movement to a position.
    ///
    /// # Errors
    ///
    /// Returns a `StockError` when the quantity is malformed for the kind,
    /// when the line does not hold enough available or allocated stock, or
    /// when the batch is quarantined or expired for a kind that forbids it.
    pub fn apply(
        position: &StockPosition,
        request: &MovementRequest,
    ) -> Result<MovementOutcome, StockError> {
        let kind = request.kind;
        let q = request.quantity;

        Self::check_input(request)?;

        if position.is_quarantined && kind.blocked_by_quarantine() {
            return Err(StockError::Quarantined(kind));
        }
        if kind.blocked_by_expiry() && position.is_expired_on(request.posting_date) {
            if let Some(expiry_date) = position.expiry_date {
                return Err(StockError::Expired { kind, expiry_date });
            }
        }

        let mut next = position.clone();
        let recorded_quantity = match kind.effect() {
            MovementEffect::Inbound => {
                if let Some(rate) = request.incoming_rate {
                    next.valuation_rate = Self::moving_average(position, q, rate)?;
                }
                next.quantity = bounded(position.quantity.checked_add(q))?;
                q
            }
            MovementEffect::Outbound | MovementEffect::WriteOff => {
                Self::ensure_available(position, q)?;
                next.quantity = bounded(position.quantity.checked_sub(q))?;
                -q
            }
            MovementEffect::Adjust => {
                let resulting = bounded(position.quantity.checked_add(q))?;
                Self::ensure_covers_allocation(position, resulting)?;
                next.quantity = resulting;
                q
            }
            MovementEffect::Count => {
                Self::ensure_covers_allocation(position, q)?;
                next.quantity = q;
                bounded(q.checked_sub(position.quantity))?
            }
            MovementEffect::Allocate => {
                Self::ensure_available(position, q)?;
                next.allocated_quantity = bounded(position.allocated_quantity.checked_add(q))?;
                q
            }
            MovementEffect::Release => {
                if q > position.allocated_quantity {
                    return Err(StockError::InsufficientAllocation {
                        requested: q,
                        allocated: position.allocated_quantity,
                    });
                }
                next.allocated_quantity = bounded(position.allocated_quantity.checked_sub(q))?;
                -q
            }
        };

        let stock_value = bounded(next.stock_value())?;
        let previous_value = bounded(position.stock_value())?;
        let movement = MovementSnapshot {
            kind,
            quantity: recorded_quantity,
            balance_after: next.quantity,
            allocated_after: next.allocated_quantity,
            valuation_rate: next.valuation_rate,
            stock_value,
            stock_value_difference: bounded(stock_value.checked_sub(previous_value))?,
        };

        Ok(MovementOutcome {
            position: next,
            movement,
        })
    }

    /// Applies both legs of a transfer.
    ///
    /// The destination receives the goods at the source's valuation rate.
    /// Nothing is returned unless both legs are valid.
    ///
    /// # Errors
    ///
    /// Returns the first `StockError` raised by either leg.
    pub fn transfer(
        source: &StockPosition,
        destination: &StockPosition,
        quantity: Decimal,
        posting_date: NaiveDate,
    ) -> Result<(MovementOutcome, MovementOutcome), StockError> {
        let outgoing = Self::apply(
            source,
            &MovementRequest::new(MovementKind::TransferOut, quantity, posting_date),
        )?;
        let incoming = Self::apply(
            destination,
            &MovementRequest::new(MovementKind::TransferIn, quantity, posting_date)
                .with_rate(source.valuation_rate),
        )?;
        Ok((outgoing, incoming))
    }

    /// Moving-average rate after receiving `quantity` at `rate`.
    ///
    /// # Errors
    ///
    /// Returns `StockError::OutOfRange` when an intermediate value overflows
    /// or the rate does not fit the stock columns.
    pub fn moving_average(
        position: &StockPosition,
        quantity: Decimal,
        rate: Decimal,
    ) -> Result<Decimal, StockError> {
        let total = bounded(position.quantity.checked_add(quantity))?;
        if total <= Decimal::ZERO {
            return Ok(rate.round_dp(VALUATION_SCALE));
        }
        let held = position
            .quantity
            .checked_mul(position.valuation_rate)
            .ok_or(StockError::OutOfRange)?;
        let incoming = quantity.checked_mul(rate).ok_or(StockError::OutOfRange)?;
        let average = held
            .checked_add(incoming)
            .and_then(|value| value.checked_div(total))
            .map(|value| value.round_dp(VALUATION_SCALE));
        bounded(average)
    }

    /// Checks the expiry named by an inbound movement against an existing batch.
    ///
    /// A batch keeps the expiry it was created with; omitting the expiry is
    /// always accepted.
    ///
    /// # Errors
    ///
    /// Returns `StockError::ExpiryMismatch` when `requested` differs from
    /// `existing`.
    pub fn check_batch_expiry(
        batch_number: &str,
        existing: Option<NaiveDate>,
        requested: Option<NaiveDate>,
    ) -> Result<(), StockError> {
        match requested {
            Some(date) if existing != Some(date) => Err(StockError::ExpiryMismatch {
                batch_number: batch_number.to_string(),
                existing: existing.map_or_else(|| "none".to_string(), |d| d.to_string()),
            }),
            _ => Ok(()),
        }
    }

    fn check_input(request: &MovementRequest) -> Result<(), StockError> {
        let kind = request.kind;
        let q = request.quantity;

        match kind.effect() {
            MovementEffect::Adjust => {
                if q.is_zero() {
                    return Err(StockError::ZeroAdjustment);
                }
            }
            MovementEffect::Count => {
                if q < Decimal::ZERO {
                    return Err(StockError::NegativeCount(q));
                }
            }
            _ => {
                if q <= Decimal::ZERO {
                    return Err(StockError::NonPositiveQuantity { kind, quantity: q });
                }
            }
        }

        if !fits_amount(q) {
            return Err(StockError::OutOfRange);
        }

        if let Some(rate) = request.incoming_rate {
            if !kind.accepts_rate() {
                return Err(StockError::UnexpectedRate(kind));
            }
            if rate < Decimal::ZERO {
                return Err(StockError::NegativeRate(rate));
            }
            if !fits_amount(rate) {
                return Err(StockError::OutOfRange);
            }
        }

        Ok(())
    }

    fn ensure_available(position: &StockPosition, requested: Decimal) -> Result<(), StockError> {
        let available = position.available();
        if requested > available {
            return Err(StockError::InsufficientStock {
                requested,
                available,
            });
        }
        Ok(())
    }

    fn ensure_covers_allocation(
        position: &StockPosition,
        resulting: Decimal,
    ) -> Result<(), StockError> {
        if resulting < position.allocated_quantity {
            return Err(StockError::BelowAllocated {
                resulting,
                allocated: position.allocated_quantity,
            });
        }
        Ok(())
    }
}

/// Unwraps a checked result that must also fit the stock columns.
fn bounded(value: Option<Decimal>) -> Result<Decimal, StockError> {
    value
        .filter(|v| fits_amount(*v))
        .ok_or(StockError::OutOfRange)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::types::MAX_AMOUNT;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    fn line(quantity: Decimal, allocated: Decimal, rate: Decimal) -> StockPosition {
        StockPosition {
            quantity,
            allocated_quantity: allocated,
            valuation_rate: rate,
            expiry_date: NaiveDate::from_ymd_opt(2027, 1, 31),
            is_quarantined: false,
        }
    }

    fn req(kind: MovementKind, quantity: Decimal) -> MovementRequest {
        MovementRequest::new(kind, quantity, today())
    }

    #[test]
    fn test_first_purchase_sets_rate() {
        let pos = StockPosition::empty(None);
        let out = StockLedger::apply(
            &pos,
            &req(MovementKind::Purchase, dec!(100)).with_rate(dec!(2.50)),
        )
        .unwrap();

        assert_eq!(out.position.quantity, dec!(100));
        assert_eq!(out.position.valuation_rate, dec!(2.50));
        assert_eq!(out.movement.quantity, dec!(100));
        assert_eq!(out.movement.balance_after, dec!(100));
        assert_eq!(out.movement.stock_value, dec!(250));
        assert_eq!(out.movement.stock_value_difference, dec!(250));
    }

    #[test]
    fn test_moving_average() {
        let pos = line(dec!(100), dec!(0), dec!(2));
        let out = StockLedger::apply(
            &pos,
            &req(MovementKind::Purchase, dec!(50)).with_rate(dec!(3.5)),
        )
        .unwrap();

        // (100 * 2 + 50 * 3.5) / 150 = 2.5
        assert_eq!(out.position.valuation_rate, dec!(2.5));
        assert_eq!(out.movement.stock_value, dec!(375));
        assert_eq!(out.movement.stock_value_difference, dec!(175));
    }

    #[test]
    fn test_moving_average_rounds_to_four_places() {
        let pos = line(dec!(3), dec!(0), dec!(1));
        let rate = StockLedger::moving_average(&pos, dec!(3), dec!(2) / dec!(3)).unwrap();
        assert_eq!(rate, dec!(0.8333));
    }

    #[test]
    fn test_sale_keeps_rate_and_records_negative_quantity() {
        let pos = line(dec!(10), dec!(2), dec!(4));
        let out = StockLedger::apply(&pos, &req(MovementKind::Sale, dec!(8))).unwrap();

        assert_eq!(out.position.quantity, dec!(2));
        assert_eq!(out.position.valuation_rate, dec!(4));
        assert_eq!(out.movement.quantity, dec!(-8));
        assert_eq!(out.movement.stock_value_difference, dec!(-32));
    }

    #[test]
    fn test_sale_cannot_take_allocated_stock() {
        let pos = line(dec!(10), dec!(3), dec!(1));
        assert_eq!(
            StockLedger::apply(&pos, &req(MovementKind::Sale, dec!(8))),
            Err(StockError::InsufficientStock {
                requested: dec!(8),
                available: dec!(7)
            })
        );
    }

    #[test]
    fn test_quarantine_rules() {
        let mut pos = line(dec!(10), dec!(0), dec!(1));
        pos.is_quarantined = true;

        for kind in [
            MovementKind::Sale,
            MovementKind::TransferOut,
            MovementKind::Allocation,
        ] {
            assert_eq!(
                StockLedger::apply(&pos, &req(kind, dec!(1))),
                Err(StockError::Quarantined(kind))
            );
        }

        let out = StockLedger::apply(&pos, &req(MovementKind::Recall, dec!(10))).unwrap();
        assert_eq!(out.position.quantity, dec!(0));
        assert!(out.position.is_quarantined);
    }

    #[test]
    fn test_expired_batch_cannot_be_sold_but_can_be_written_off() {
        let mut pos = line(dec!(5), dec!(0), dec!(1));
        pos.expiry_date = NaiveDate::from_ymd_opt(2026, 3, 15);

        assert!(matches!(
            StockLedger::apply(&pos, &req(MovementKind::Sale, dec!(1))),
            Err(StockError::Expired { .. })
        ));
        assert!(matches!(
            StockLedger::apply(&pos, &req(MovementKind::Allocation, dec!(1))),
            Err(StockError::Expired { .. })
        ));
        assert!(StockLedger::apply(&pos, &req(MovementKind::Expiry, dec!(5))).is_ok());
        assert!(StockLedger::apply(&pos, &req(MovementKind::TransferOut, dec!(1))).is_ok());
    }

    #[test]
    fn test_adjustment_is_signed_and_respects_allocation() {
        let pos = line(dec!(10), dec!(4), dec!(1));

        let up = StockLedger::apply(&pos, &req(MovementKind::Adjustment, dec!(3))).unwrap();
        assert_eq!(up.position.quantity, dec!(13));

        let down = StockLedger::apply(&pos, &req(MovementKind::Adjustment, dec!(-6))).unwrap();
        assert_eq!(down.position.quantity, dec!(4));
        assert_eq!(down.movement.quantity, dec!(-6));

        assert_eq!(
            StockLedger::apply(&pos, &req(MovementKind::Adjustment, dec!(-7))),
            Err(StockError::BelowAllocated {
                resulting: dec!(3),
                allocated: dec!(4)
            })
        );
        assert_eq!(
            StockLedger::apply(&pos, &req(MovementKind::Adjustment, dec!(0))),
            Err(StockError::ZeroAdjustment)
        );
    }

    #[test]
    fn test_stock_take_records_delta() {
        let pos = line(dec!(10), dec!(2), dec!(3));

        let out = StockLedger::apply(&pos, &req(MovementKind::StockTake, dec!(7))).unwrap();
        assert_eq!(out.position.quantity, dec!(7));
        assert_eq!(out.movement.quantity, dec!(-3));
        assert_eq!(out.movement.stock_value_difference, dec!(-9));

        let zero = line(dec!(10), dec!(0), dec!(3));
        let out = StockLedger::apply(&zero, &req(MovementKind::StockTake, dec!(0))).unwrap();
        assert_eq!(out.position.quantity, dec!(0));

        assert!(matches!(
            StockLedger::apply(&pos, &req(MovementKind::StockTake, dec!(1))),
            Err(StockError::BelowAllocated { .. })
        ));
        assert_eq!(
            StockLedger::apply(&pos, &req(MovementKind::StockTake, dec!(-1))),
            Err(StockError::NegativeCount(dec!(-1)))
        );
    }

    #[test]
    fn test_allocation_and_release() {
        let pos = line(dec!(10), dec!(0), dec!(1));

        let allocated = StockLedger::apply(&pos, &req(MovementKind::Allocation, dec!(6))).unwrap();
        assert_eq!(allocated.position.allocated_quantity, dec!(6));
        assert_eq!(allocated.position.quantity, dec!(10));
        assert_eq!(allocated.movement.allocated_after, dec!(6));
        assert_eq!(allocated.movement.stock_value_difference, dec!(0));

        assert!(matches!(
            StockLedger::apply(&allocated.position, &req(MovementKind::Allocation, dec!(5))),
            Err(StockError::InsufficientStock { .. })
        ));

        let released =
            StockLedger::apply(&allocated.position, &req(MovementKind::Release, dec!(4))).unwrap();
        assert_eq!(released.position.allocated_quantity, dec!(2));
        assert_eq!(released.movement.quantity, dec!(-4));

        assert_eq!(
            StockLedger::apply(&released.position, &req(MovementKind::Release, dec!(3))),
            Err(StockError::InsufficientAllocation {
                requested: dec!(3),
                allocated: dec!(2)
            })
        );
    }

    #[test]
    fn test_input_validation() {
        let pos = line(dec!(10), dec!(0), dec!(1));

        assert!(matches!(
            StockLedger::apply(&pos, &req(MovementKind::Sale, dec!(0))),
            Err(StockError::NonPositiveQuantity { .. })
        ));
        assert!(matches!(
            StockLedger::apply(&pos, &req(MovementKind::Purchase, dec!(-1))),
            Err(StockError::NonPositiveQuantity { .. })
        ));
        assert_eq!(
            StockLedger::apply(&pos, &req(MovementKind::Sale, dec!(1)).with_rate(dec!(1))),
            Err(StockError::UnexpectedRate(MovementKind::Sale))
        );
        assert_eq!(
            StockLedger::apply(
                &pos,
                &req(MovementKind::Purchase, dec!(1)).with_rate(dec!(-0.01))
            ),
            Err(StockError::NegativeRate(dec!(-0.01)))
        );
    }

    #[test]
    fn test_inbound_without_rate_keeps_average() {
        let pos = line(dec!(10), dec!(0), dec!(2));
        let out = StockLedger::apply(&pos, &req(MovementKind::ReturnInward, dec!(5))).unwrap();
        assert_eq!(out.position.valuation_rate, dec!(2));
        assert_eq!(out.movement.stock_value, dec!(30));
    }

    #[test]
    fn test_transfer_carries_cost_to_destination() {
        let source = line(dec!(20), dec!(5), dec!(1.75));
        let destination = StockPosition::empty(source.expiry_date);

        let (out, inc) =
            StockLedger::transfer(&source, &destination, dec!(15), today()).unwrap();
        assert_eq!(out.position.quantity, dec!(5));
        assert_eq!(out.movement.quantity, dec!(-15));
        assert_eq!(inc.position.quantity, dec!(15));
        assert_eq!(inc.position.valuation_rate, dec!(1.75));
        assert_eq!(
            out.movement.stock_value_difference + inc.movement.stock_value_difference,
            dec!(0)
        );

        assert!(matches!(
            StockLedger::transfer(&source, &destination, dec!(16), today()),
            Err(StockError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn test_out_of_range_input_is_rejected() {
        let pos = line(dec!(10), dec!(0), dec!(2));

        assert_eq!(
            StockLedger::apply(&pos, &req(MovementKind::Purchase, Decimal::MAX)),
            Err(StockError::OutOfRange)
        );
        assert_eq!(
            StockLedger::apply(
                &pos,
                &req(MovementKind::Purchase, dec!(1)).with_rate(Decimal::MAX)
            ),
            Err(StockError::OutOfRange)
        );
        assert_eq!(
            StockLedger::apply(&pos, &req(MovementKind::Adjustment, Decimal::MIN)),
            Err(StockError::OutOfRange)
        );
        assert_eq!(
            StockLedger::apply(&pos, &req(MovementKind::StockTake, Decimal::MAX)),
            Err(StockError::OutOfRange)
        );
    }

    #[test]
    fn test_results_beyond_column_range_are_rejected() {
        let full = line(MAX_AMOUNT, dec!(0), dec!(0));
        assert_eq!(
            StockLedger::apply(&full, &req(MovementKind::ReturnInward, dec!(1))),
            Err(StockError::OutOfRange)
        );

        // Quantity and rate fit on their own but their product does not.
        let pos = StockPosition::empty(None);
        assert_eq!(
            StockLedger::apply(
                &pos,
                &req(MovementKind::Purchase, dec!(1000000000)).with_rate(dec!(1000000000))
            ),
            Err(StockError::OutOfRange)
        );

        let at_limit = StockLedger::apply(
            &pos,
            &req(MovementKind::Purchase, MAX_AMOUNT).with_rate(dec!(0)),
        )
        .unwrap();
        assert_eq!(at_limit.position.quantity, MAX_AMOUNT);
    }

    #[test]
    fn test_batch_expiry_must_match() {
        let jan = NaiveDate::from_ymd_opt(2027, 1, 31);
        let feb = NaiveDate::from_ymd_opt(2027, 2, 28);

        assert!(StockLedger::check_batch_expiry("B1", jan, jan).is_ok());
        assert!(StockLedger::check_batch_expiry("B1", jan, None).is_ok());
        assert!(StockLedger::check_batch_expiry("B1", None, None).is_ok());
        assert_eq!(
            StockLedger::check_batch_expiry("B1", jan, feb),
            Err(StockError::ExpiryMismatch {
                batch_number: "B1".to_string(),
                existing: "2027-01-31".to_string(),
            })
        );
        assert!(matches!(
            StockLedger::check_batch_expiry("B1", None, feb),
            Err(StockError::ExpiryMismatch { .. })
        ));
    }
}
