//! Suppliers and customers.
//!
//! Codes are stored trimmed and upper-cased. A supplier must have a code;
//! a customer may not, and a blank customer code is stored as NULL so the
//! partial unique index lets any number of code-less customers coexist.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::stock::fits_amount;

/// Longest accepted party code.
pub const MAX_CODE_LENGTH: usize = 50;

/// Party validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartyError {
    /// Supplier code missing.
    #[error("Code is required")]
    CodeRequired,

    /// Code too long.
    #[error("Code must be at most {MAX_CODE_LENGTH} characters")]
    CodeTooLong,

    /// Code contains whitespace.
    #[error("Code must not contain whitespace")]
    CodeHasWhitespace,

    /// Balance would leave the range of the balance column.
    #[error("Balance is outside the supported range")]
    BalanceOutOfRange,
}

impl PartyError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        400
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::CodeRequired => "CODE_REQUIRED",
            Self::CodeTooLong => "CODE_TOO_LONG",
            Self::CodeHasWhitespace => "CODE_HAS_WHITESPACE",
            Self::BalanceOutOfRange => "BALANCE_OUT_OF_RANGE",
        }
    }
}

fn check_code(code: &str) -> Result<String, PartyError> {
    if code.chars().count() > MAX_CODE_LENGTH {
        return Err(PartyError::CodeTooLong);
    }
    if code.chars().any(char::is_whitespace) {
        return Err(PartyError::CodeHasWhitespace);
    }
    Ok(code.to_uppercase())
}

/// Normalizes a required code (suppliers, pharmacies, drugs).
///
/// # Errors
///
/// Returns `PartyError::CodeRequired` for a blank code, and a format error
/// for an over-long code or one with inner whitespace.
pub fn normalize_code(code: &str) -> Result<String, PartyError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(PartyError::CodeRequired);
    }
    check_code(code)
}

/// Normalizes an optional customer code; blank becomes `None`.
///
/// # Errors
///
/// Returns a format error for an over-long code or one with inner whitespace.
pub fn normalize_optional_code(code: Option<&str>) -> Result<Option<String>, PartyError> {
    match code.map(str::trim) {
        None | Some("") => Ok(None),
        Some(code) => check_code(code).map(Some),
    }
}

/// Balance after applying a signed delta.
///
/// Balances may go negative (supplier credit, customer prepayment).
///
/// # Errors
///
/// Returns `PartyError::BalanceOutOfRange` when the result does not fit
/// the balance column.
pub fn apply_balance_delta(current: Decimal, delta: Decimal) -> Result<Decimal, PartyError> {
    current
        .checked_add(delta)
        .filter(|balance| fits_amount(*balance))
        .ok_or(PartyError::BalanceOutOfRange)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case("  sup-001 ", "SUP-001")]
    #[case("Kf", "KF")]
    fn test_normalize_code(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_code(input).unwrap(), expected);
    }

    #[test]
    fn test_required_code_errors() {
        assert_eq!(normalize_code("   "), Err(PartyError::CodeRequired));
        assert_eq!(normalize_code("A B"), Err(PartyError::CodeHasWhitespace));
        assert_eq!(
            normalize_code(&"X".repeat(MAX_CODE_LENGTH + 1)),
            Err(PartyError::CodeTooLong)
        );
    }

    #[test]
    fn test_optional_code() {
        assert_eq!(normalize_optional_code(None), Ok(None));
        assert_eq!(normalize_optional_code(Some("  ")), Ok(None));
        assert_eq!(
            normalize_optional_code(Some(" cust-9 ")),
            Ok(Some("CUST-9".to_string()))
        );
        assert_eq!(
            normalize_optional_code(Some("a b")),
            Err(PartyError::CodeHasWhitespace)
        );
    }

    #[test]
    fn test_balance_delta() {
        assert_eq!(apply_balance_delta(dec!(100), dec!(-150)), Ok(dec!(-50)));
        assert_eq!(apply_balance_delta(dec!(0), dec!(12.5)), Ok(dec!(12.5)));
        assert_eq!(
            apply_balance_delta(dec!(1), Decimal::MAX),
            Err(PartyError::BalanceOutOfRange)
        );
        assert_eq!(
            apply_balance_delta(crate::stock::MAX_AMOUNT, dec!(0.0001)),
            Err(PartyError::BalanceOutOfRange)
        );
    }
}
