//! Classification of constraint violations raised by PostgreSQL.

use sea_orm::{DbErr, RuntimeErr, SqlErr};

/// SQLSTATE of `check_violation`, also raised by the immutability triggers.
const CHECK_VIOLATION: &str = "23514";

/// A constraint the database refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Violation {
    /// Unique constraint or unique index.
    Unique(String),
    /// Foreign key.
    ForeignKey(String),
    /// Check constraint or trigger rule.
    Check(String),
}

/// Returns the violated constraint, if the error is one.
pub(crate) fn violation(err: &DbErr) -> Option<Violation> {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(msg)) => return Some(Violation::Unique(msg)),
        Some(SqlErr::ForeignKeyConstraintViolation(msg)) => {
            return Some(Violation::ForeignKey(msg));
        }
        _ => {}
    }

    let runtime = match err {
        DbErr::Exec(e) | DbErr::Query(e) | DbErr::Conn(e) => e,
        _ => return None,
    };
    if let RuntimeErr::SqlxError(sqlx::Error::Database(db_err)) = runtime {
        if db_err.code().as_deref() == Some(CHECK_VIOLATION) {
            return Some(Violation::Check(db_err.message().to_string()));
        }
    }
    None
}

/// Returns true for a unique violation.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(violation(err), Some(Violation::Unique(_)))
}

/// Returns the message of a check or trigger violation.
pub(crate) fn check_violation(err: &DbErr) -> Option<String> {
    match violation(err) {
        Some(Violation::Check(msg)) => Some(msg),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_sql_errors_are_not_violations() {
        assert_eq!(violation(&DbErr::RecordNotFound("x".into())), None);
        assert!(!is_unique_violation(&DbErr::Custom("boom".into())));
        assert_eq!(check_violation(&DbErr::Custom("boom".into())), None);
    }
}
