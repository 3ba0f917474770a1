//! Fiscal year and period derivation.
//!
//! A fiscal year is labelled by the calendar year in which it starts and
//! has twelve monthly periods. Dates are taken in the organization's local
//! time zone, so a movement posted at 23:30 UTC may belong to the next day.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;

/// Fiscal calendar errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FiscalError {
    /// Unknown IANA time zone name.
    #[error("Unknown time zone: {0}")]
    UnknownTimezone(String),

    /// Start month outside 1..=12.
    #[error("Fiscal year start month must be between 1 and 12, got {0}")]
    InvalidStartMonth(i32),
}

/// Fiscal year and period of a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FiscalPosition {
    /// Calendar year in which the fiscal year starts.
    pub fiscal_year: i32,
    /// Period 1..=12.
    pub fiscal_period: i32,
}

/// Time zone and first month of an organization's fiscal year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiscalCalendar {
    timezone: Tz,
    start_month: u32,
}

impl Default for FiscalCalendar {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            start_month: 1,
        }
    }
}

impl FiscalCalendar {
    /// Builds a calendar from organization settings.
    ///
    /// # Errors
    ///
    /// Returns `FiscalError::UnknownTimezone` or
    /// `FiscalError::InvalidStartMonth`.
    pub fn new(timezone: &str, start_month: i32) -> Result<Self, FiscalError> {
        let tz: Tz = timezone
            .parse()
            .map_err(|_| FiscalError::UnknownTimezone(timezone.to_string()))?;
        let month = u32::try_from(start_month)
            .ok()
            .filter(|m| (1..=12).contains(m))
            .ok_or(FiscalError::InvalidStartMonth(start_month))?;
        Ok(Self {
            timezone: tz,
            start_month: month,
        })
    }

    /// The calendar's time zone.
    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Local business date of an instant.
    #[must_use]
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.timezone).date_naive()
    }

    /// Fiscal year and period of a local date.
    #[must_use]
    pub fn position_of_date(&self, date: NaiveDate) -> FiscalPosition {
        let month = date.month();
        let (fiscal_year, offset) = if month >= self.start_month {
            (date.year(), month - self.start_month)
        } else {
            (date.year() - 1, month + 12 - self.start_month)
        };
        FiscalPosition {
            fiscal_year,
            // offset is 0..=11
            fiscal_period: i32::try_from(offset + 1).unwrap_or(1),
        }
    }

    /// Fiscal year and period of an instant.
    #[must_use]
    pub fn position_of(&self, at: DateTime<Utc>) -> FiscalPosition {
        self.position_of_date(self.local_date(at))
    }

    /// First and last day of a fiscal year.
    #[must_use]
    pub fn year_bounds(&self, fiscal_year: i32) -> Option<(NaiveDate, NaiveDate)> {
        let start = NaiveDate::from_ymd_opt(fiscal_year, self.start_month, 1)?;
        let next = NaiveDate::from_ymd_opt(fiscal_year + 1, self.start_month, 1)?;
        Some((start, next.pred_opt()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(1, date(2026, 1, 1), 2026, 1)]
    #[case(1, date(2026, 12, 31), 2026, 12)]
    #[case(4, date(2026, 4, 1), 2026, 1)]
    #[case(4, date(2026, 3, 31), 2025, 12)]
    #[case(4, date(2027, 1, 15), 2026, 10)]
    #[case(7, date(2026, 6, 30), 2025, 12)]
    fn test_position_of_date(
        #[case] start_month: i32,
        #[case] day: NaiveDate,
        #[case] year: i32,
        #[case] period: i32,
    ) {
        let cal = FiscalCalendar::new("UTC", start_month).unwrap();
        assert_eq!(
            cal.position_of_date(day),
            FiscalPosition {
                fiscal_year: year,
                fiscal_period: period
            }
        );
    }

    #[test]
    fn test_uses_local_time_zone() {
        let cal = FiscalCalendar::new("Asia/Jakarta", 1).unwrap();
        // 2025-12-31 18:00 UTC is 2026-01-01 01:00 in Jakarta.
        let at = Utc.with_ymd_and_hms(2025, 12, 31, 18, 0, 0).unwrap();
        assert_eq!(cal.local_date(at), date(2026, 1, 1));
        assert_eq!(
            cal.position_of(at),
            FiscalPosition {
                fiscal_year: 2026,
                fiscal_period: 1
            }
        );
    }

    #[test]
    fn test_invalid_settings() {
        assert_eq!(
            FiscalCalendar::new("Mars/Olympus", 1),
            Err(FiscalError::UnknownTimezone("Mars/Olympus".to_string()))
        );
        assert_eq!(
            FiscalCalendar::new("UTC", 13),
            Err(FiscalError::InvalidStartMonth(13))
        );
        assert_eq!(
            FiscalCalendar::new("UTC", 0),
            Err(FiscalError::InvalidStartMonth(0))
        );
    }

    #[test]
    fn test_year_bounds() {
        let cal = FiscalCalendar::new("UTC", 4).unwrap();
        assert_eq!(
            cal.year_bounds(2026),
            Some((date(2026, 4, 1), date(2027, 3, 31)))
        );
    }
}
