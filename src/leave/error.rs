//! Errors raised by the leave ledger and the monthly report.

use thiserror::Error;

use crate::model::leave_application::ApplicationStatus;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The employee does not participate in the named leave type.
    #[error("No leave details found for employee {employee_id} and leave type {leave_type}")]
    LeaveDetailNotFound {
        employee_id: String,
        leave_type: String,
    },

    /// No balance has been provisioned for the year.
    #[error("No remaining leaves record found for employee {employee_id} ({leave_type}, {year})")]
    BalanceNotFound {
        employee_id: String,
        leave_type: String,
        year: i32,
    },

    #[error("Not enough remaining leaves: requested {requested}, remaining {remaining}")]
    InsufficientBalance { requested: f64, remaining: f64 },

    #[error("Leave application {0} not found")]
    ApplicationNotFound(u64),

    #[error("Leave application {id} is already {status}")]
    ApplicationNotPending { id: u64, status: ApplicationStatus },

    #[error("LOP accrual is not supported; clear_lop must be true")]
    LopNotSupported,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// MySQL error 1213 (`ER_LOCK_DEADLOCK`) carries SQLSTATE 40001.
fn is_deadlock_state(sql_state: Option<&str>, message: &str) -> bool {
    sql_state == Some("40001") || message.starts_with("Deadlock found")
}

impl LedgerError {
    /// True when InnoDB rolled the transaction back to break a deadlock.
    pub fn is_deadlock(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db_err)) => {
                is_deadlock_state(db_err.code().as_deref(), db_err.message())
            }
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::LeaveDetailNotFound { .. }
                | Self::BalanceNotFound { .. }
                | Self::ApplicationNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(
            LedgerError::LeaveDetailNotFound {
                employee_id: "E1".into(),
                leave_type: "casual".into(),
            }
            .is_not_found()
        );
        assert!(LedgerError::ApplicationNotFound(7).is_not_found());
        assert!(
            !LedgerError::InsufficientBalance {
                requested: 5.0,
                remaining: 2.0,
            }
            .is_not_found()
        );
        assert!(!LedgerError::LopNotSupported.is_not_found());
    }

    #[test]
    fn test_deadlock_detection() {
        assert!(is_deadlock_state(
            Some("40001"),
            "Deadlock found when trying to get lock; try restarting transaction"
        ));
        assert!(is_deadlock_state(None, "Deadlock found when trying to get lock"));
        assert!(!is_deadlock_state(
            Some("23000"),
            "Duplicate entry '1-2024' for key 'uq_remaining_leaves_detail_year'"
        ));

        assert!(!LedgerError::Database(sqlx::Error::RowNotFound).is_deadlock());
        assert!(!LedgerError::LopNotSupported.is_deadlock());
    }

    #[test]
    fn test_error_display() {
        let err = LedgerError::InsufficientBalance {
            requested: 5.0,
            remaining: 2.0,
        };
        assert_eq!(
            err.to_string(),
            "Not enough remaining leaves: requested 5, remaining 2"
        );

        let err = LedgerError::ApplicationNotPending {
            id: 3,
            status: ApplicationStatus::Approved,
        };
        assert_eq!(err.to_string(), "Leave application 3 is already approved");
    }
}
