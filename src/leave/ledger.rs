//! Leave balance ledger.
//!
//! Every operation is one read-modify-write transaction against MySQL. Balance
//! rows are read with `SELECT ... FOR UPDATE`, so concurrent debits of the same
//! row serialize on InnoDB's row lock and each guard sees the previous debit.
//! Returning early with `?` drops the open `Transaction`, which rolls it back.

use chrono::{Datelike, Utc};
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{debug, info, instrument, warn};

use crate::leave::error::LedgerError;
use crate::model::leave_application::ApplicationStatus;
use crate::model::remaining_leave::RemainingLeave;

pub const DEFAULT_LEAVE_TYPE: &str = "casual";

pub fn current_year() -> i32 {
    Utc::now().year()
}

/// Request to take `days_applied` days of `leave_type` from the current balance.
#[derive(Debug, Clone)]
pub struct ApplyLeave {
    pub employee_id: String,
    pub leave_type: String,
    pub days_applied: f64,
    /// Only `true` is supported: the request must be fully covered, nothing
    /// is left over as loss-of-pay.
    pub clear_lop: bool,
}

/// Provisioning request for one (employee, leave type, year) balance.
#[derive(Debug, Clone)]
pub struct BalanceUpsert {
    pub employee_id: String,
    pub leave_type: String,
    pub total_leaves: Option<f64>,
    pub remaining_leaves: Option<f64>,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BalanceWrite {
    Update(RemainingLeave),
    Insert(RemainingLeave),
}

impl RemainingLeave {
    /// Takes `days` off the remaining balance. On error nothing is changed.
    pub fn debit(&mut self, days: f64) -> Result<(), LedgerError> {
        if self.remaining_leaves < days {
            return Err(LedgerError::InsufficientBalance {
                requested: days,
                remaining: self.remaining_leaves,
            });
        }
        self.remaining_leaves -= days;
        Ok(())
    }

    /// Overwrites only the provided fields.
    pub fn apply_update(&mut self, total_leaves: Option<f64>, remaining_leaves: Option<f64>) {
        if let Some(total) = total_leaves {
            self.total_leaves = total;
        }
        if let Some(remaining) = remaining_leaves {
            self.remaining_leaves = remaining;
        }
    }
}

pub fn validate_days(days: f64) -> Result<(), LedgerError> {
    if days.is_finite() && days > 0.0 {
        Ok(())
    } else {
        Err(LedgerError::Validation(
            "days_applied must be a positive number".into(),
        ))
    }
}

/// Decides whether an upsert updates the locked row or inserts a new one.
pub fn plan_upsert(
    existing: Option<RemainingLeave>,
    leave_detail_id: u64,
    req: &BalanceUpsert,
) -> Result<BalanceWrite, LedgerError> {
    match existing {
        Some(mut balance) => {
            balance.apply_update(req.total_leaves, req.remaining_leaves);
            Ok(BalanceWrite::Update(balance))
        }
        None => match (req.total_leaves, req.remaining_leaves) {
            (Some(total_leaves), Some(remaining_leaves)) => {
                Ok(BalanceWrite::Insert(RemainingLeave {
                    id: 0,
                    leave_detail_id,
                    total_leaves,
                    remaining_leaves,
                    year: req.year,
                }))
            }
            _ => Err(LedgerError::Validation(
                "total_leaves and remaining_leaves are required to create a balance".into(),
            )),
        },
    }
}

pub(crate) async fn find_leave_detail_id(
    conn: &mut MySqlConnection,
    employee_id: &str,
    leave_type: &str,
) -> Result<Option<u64>, sqlx::Error> {
    sqlx::query_scalar::<_, u64>(
        r#"
        SELECT ld.id
        FROM leave_details ld
        JOIN leave_types lt ON lt.id = ld.leave_type_id
        WHERE ld.employee_id = ?
        AND lt.leave_type = ?
        "#,
    )
    .bind(employee_id)
    .bind(leave_type)
    .fetch_optional(conn)
    .await
}

async fn lock_balance(
    conn: &mut MySqlConnection,
    leave_detail_id: u64,
    year: i32,
) -> Result<Option<RemainingLeave>, sqlx::Error> {
    sqlx::query_as::<_, RemainingLeave>(
        r#"
        SELECT id, leave_detail_id, total_leaves, remaining_leaves, year
        FROM remaining_leaves
        WHERE leave_detail_id = ?
        AND year = ?
        FOR UPDATE
        "#,
    )
    .bind(leave_detail_id)
    .bind(year)
    .fetch_optional(conn)
    .await
}

/// Resolves, locks, guards and debits inside the caller's transaction.
async fn debit_in_tx(
    conn: &mut MySqlConnection,
    employee_id: &str,
    leave_type: &str,
    days: f64,
    year: i32,
) -> Result<RemainingLeave, LedgerError> {
    let leave_detail_id = find_leave_detail_id(&mut *conn, employee_id, leave_type)
        .await?
        .ok_or_else(|| LedgerError::LeaveDetailNotFound {
            employee_id: employee_id.to_string(),
            leave_type: leave_type.to_string(),
        })?;

    let mut balance = lock_balance(&mut *conn, leave_detail_id, year)
        .await?
        .ok_or_else(|| LedgerError::BalanceNotFound {
            employee_id: employee_id.to_string(),
            leave_type: leave_type.to_string(),
            year,
        })?;

    balance.debit(days)?;

    sqlx::query("UPDATE remaining_leaves SET remaining_leaves = ? WHERE id = ?")
        .bind(balance.remaining_leaves)
        .bind(balance.id)
        .execute(&mut *conn)
        .await?;

    Ok(balance)
}

#[instrument(
    name = "ledger_apply_leave",
    skip(pool, req),
    fields(employee_id = %req.employee_id, leave_type = %req.leave_type, days = req.days_applied)
)]
pub async fn apply_leave(
    pool: &MySqlPool,
    req: &ApplyLeave,
    year: i32,
) -> Result<RemainingLeave, LedgerError> {
    validate_days(req.days_applied)?;
    if !req.clear_lop {
        return Err(LedgerError::LopNotSupported);
    }

    let mut tx = pool.begin().await?;
    let balance = debit_in_tx(
        &mut tx,
        &req.employee_id,
        &req.leave_type,
        req.days_applied,
        year,
    )
    .await?;
    tx.commit().await?;

    info!(remaining = balance.remaining_leaves, "Leave debited");
    Ok(balance)
}

#[instrument(
    name = "ledger_upsert_balance",
    skip(pool, req),
    fields(employee_id = %req.employee_id, leave_type = %req.leave_type, year = req.year)
)]
pub async fn upsert_remaining_leave(
    pool: &MySqlPool,
    req: &BalanceUpsert,
) -> Result<RemainingLeave, LedgerError> {
    // Two first-time writers for the same (detail, year) share the gap lock
    // taken by `lock_balance`; InnoDB aborts one of them.
    match upsert_once(pool, req).await {
        Err(e) if e.is_deadlock() => {
            warn!("Balance upsert deadlocked, retrying once");
            upsert_once(pool, req).await
        }
        other => other,
    }
}

async fn upsert_once(
    pool: &MySqlPool,
    req: &BalanceUpsert,
) -> Result<RemainingLeave, LedgerError> {
    let mut tx = pool.begin().await?;

    let leave_detail_id = find_leave_detail_id(&mut tx, &req.employee_id, &req.leave_type)
        .await?
        .ok_or_else(|| LedgerError::LeaveDetailNotFound {
            employee_id: req.employee_id.clone(),
            leave_type: req.leave_type.clone(),
        })?;

    let existing = lock_balance(&mut tx, leave_detail_id, req.year).await?;

    let balance = match plan_upsert(existing, leave_detail_id, req)? {
        BalanceWrite::Update(balance) => {
            debug!(id = balance.id, "Updating existing balance");
            sqlx::query(
                "UPDATE remaining_leaves SET total_leaves = ?, remaining_leaves = ? WHERE id = ?",
            )
            .bind(balance.total_leaves)
            .bind(balance.remaining_leaves)
            .bind(balance.id)
            .execute(&mut *tx)
            .await?;
            balance
        }
        BalanceWrite::Insert(mut balance) => {
            debug!("Creating balance");
            // A row committed since `lock_balance` turns this into an update.
            let result = sqlx::query(
                r#"
                INSERT INTO remaining_leaves
                    (leave_detail_id, total_leaves, remaining_leaves, year)
                VALUES (?, ?, ?, ?)
                ON DUPLICATE KEY UPDATE
                    id = LAST_INSERT_ID(id),
                    total_leaves = VALUES(total_leaves),
                    remaining_leaves = VALUES(remaining_leaves)
                "#,
            )
            .bind(balance.leave_detail_id)
            .bind(balance.total_leaves)
            .bind(balance.remaining_leaves)
            .bind(balance.year)
            .execute(&mut *tx)
            .await?;
            balance.id = result.last_insert_id();
            balance
        }
    };

    tx.commit().await?;
    Ok(balance)
}

#[derive(sqlx::FromRow)]
struct ApplicationUnderReview {
    employee_id: String,
    leave_type: String,
    total_days: f64,
    #[sqlx(try_from = "String")]
    status: ApplicationStatus,
    start_date: chrono::NaiveDate,
}

/// Approves a pending application and debits its days from the balance of
/// the year the leave starts in, all in one transaction.
#[instrument(name = "ledger_approve_application", skip(pool))]
pub async fn approve_application(
    pool: &MySqlPool,
    application_id: u64,
    reviewer_id: &str,
) -> Result<RemainingLeave, LedgerError> {
    let mut tx = pool.begin().await?;

    let application = sqlx::query_as::<_, ApplicationUnderReview>(
        r#"
        SELECT la.employee_id, lt.leave_type, la.total_days, la.status, la.start_date
        FROM leave_applications la
        JOIN leave_types lt ON lt.id = la.leave_type_id
        WHERE la.id = ?
        FOR UPDATE
        "#,
    )
    .bind(application_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(LedgerError::ApplicationNotFound(application_id))?;

    if application.status != ApplicationStatus::Pending {
        return Err(LedgerError::ApplicationNotPending {
            id: application_id,
            status: application.status,
        });
    }

    let balance = debit_in_tx(
        &mut tx,
        &application.employee_id,
        &application.leave_type,
        application.total_days,
        application.start_date.year(),
    )
    .await?;

    sqlx::query("UPDATE leave_applications SET status = ?, done_by = ? WHERE id = ?")
        .bind(ApplicationStatus::Approved.as_ref())
        .bind(reviewer_id)
        .bind(application_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(
        employee_id = %application.employee_id,
        remaining = balance.remaining_leaves,
        "Leave application approved"
    );
    Ok(balance)
}

/// Rejects a pending application. The balance is not touched.
#[instrument(name = "ledger_reject_application", skip(pool, reason))]
pub async fn reject_application(
    pool: &MySqlPool,
    application_id: u64,
    reviewer_id: &str,
    reason: &str,
) -> Result<(), LedgerError> {
    if reason.trim().is_empty() {
        return Err(LedgerError::Validation(
            "A rejection reason is required".into(),
        ));
    }

    let mut tx = pool.begin().await?;

    let status = sqlx::query_scalar::<_, String>(
        "SELECT status FROM leave_applications WHERE id = ? FOR UPDATE",
    )
    .bind(application_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(LedgerError::ApplicationNotFound(application_id))?;

    let status = ApplicationStatus::try_from(status)
        .map_err(|e| LedgerError::Validation(format!("Unknown application status: {e}")))?;
    if status != ApplicationStatus::Pending {
        return Err(LedgerError::ApplicationNotPending {
            id: application_id,
            status,
        });
    }

    sqlx::query(
        r#"
        UPDATE leave_applications
        SET status = ?, done_by = ?, reason_if_rejected = ?
        WHERE id = ?
        "#,
    )
    .bind(ApplicationStatus::Rejected.as_ref())
    .bind(reviewer_id)
    .bind(reason.trim())
    .bind(application_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    info!("Leave application rejected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn balance(total: f64, remaining: f64) -> RemainingLeave {
        RemainingLeave {
            id: 1,
            leave_detail_id: 4,
            total_leaves: total,
            remaining_leaves: remaining,
            year: 2024,
        }
    }

    fn upsert(total: Option<f64>, remaining: Option<f64>) -> BalanceUpsert {
        BalanceUpsert {
            employee_id: "E1".into(),
            leave_type: "casual".into(),
            total_leaves: total,
            remaining_leaves: remaining,
            year: 2024,
        }
    }

    #[test]
    fn test_debit_then_overdraw_scenario() {
        let mut row = balance(12.0, 5.0);

        row.debit(3.0).unwrap();
        assert_eq!(row.remaining_leaves, 2.0);
        assert_eq!(row.total_leaves, 12.0);

        let err = row.debit(5.0).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance { requested, remaining }
                if requested == 5.0 && remaining == 2.0
        ));
        assert_eq!(row.remaining_leaves, 2.0);
    }

    #[test]
    fn test_debit_exact_balance_reaches_zero() {
        let mut row = balance(10.0, 2.5);
        row.debit(2.5).unwrap();
        assert_eq!(row.remaining_leaves, 0.0);
    }

    #[test]
    fn test_validate_days() {
        assert!(validate_days(0.5).is_ok());
        assert!(validate_days(3.0).is_ok());
        assert!(validate_days(0.0).is_err());
        assert!(validate_days(-1.0).is_err());
        assert!(validate_days(f64::NAN).is_err());
        assert!(validate_days(f64::INFINITY).is_err());
    }

    #[test]
    fn test_apply_update_only_overwrites_provided_fields() {
        let mut row = balance(12.0, 5.0);
        row.apply_update(None, Some(7.0));
        assert_eq!(row.total_leaves, 12.0);
        assert_eq!(row.remaining_leaves, 7.0);

        row.apply_update(Some(20.0), None);
        assert_eq!(row.total_leaves, 20.0);
        assert_eq!(row.remaining_leaves, 7.0);
    }

    #[test]
    fn test_plan_upsert_inserts_when_missing() {
        let plan = plan_upsert(None, 4, &upsert(Some(12.0), Some(12.0))).unwrap();
        assert_eq!(
            plan,
            BalanceWrite::Insert(RemainingLeave {
                id: 0,
                leave_detail_id: 4,
                total_leaves: 12.0,
                remaining_leaves: 12.0,
                year: 2024,
            })
        );
    }

    #[test]
    fn test_plan_upsert_insert_needs_both_amounts() {
        let err = plan_upsert(None, 4, &upsert(Some(12.0), None)).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_plan_upsert_is_idempotent() {
        let req = upsert(Some(15.0), Some(9.0));

        let first = match plan_upsert(Some(balance(12.0, 5.0)), 4, &req).unwrap() {
            BalanceWrite::Update(row) => row,
            other => panic!("expected update, got {other:?}"),
        };
        let second = match plan_upsert(Some(first.clone()), 4, &req).unwrap() {
            BalanceWrite::Update(row) => row,
            other => panic!("expected update, got {other:?}"),
        };

        assert_eq!(first, second);
        assert_eq!(second.id, 1);
        assert_eq!(second.total_leaves, 15.0);
        assert_eq!(second.remaining_leaves, 9.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_covered_debit_subtracts_exactly(
            total in 0u32..400,
            remaining_halves in 0u32..400,
            days_halves in 1u32..400,
        ) {
            let remaining = f64::from(remaining_halves) / 2.0;
            let days = f64::from(days_halves) / 2.0;
            prop_assume!(days <= remaining);

            let mut row = balance(f64::from(total), remaining);
            row.debit(days).unwrap();

            prop_assert_eq!(row.remaining_leaves, remaining - days);
            prop_assert_eq!(row.total_leaves, f64::from(total));
        }

        #[test]
        fn prop_overdraw_leaves_row_untouched(
            remaining_halves in 0u32..400,
            extra_halves in 1u32..400,
        ) {
            let remaining = f64::from(remaining_halves) / 2.0;
            let days = remaining + f64::from(extra_halves) / 2.0;

            let mut row = balance(30.0, remaining);
            let before = row.clone();

            let result = row.debit(days);
            let is_insufficient = matches!(result, Err(LedgerError::InsufficientBalance { .. }));
            prop_assert!(is_insufficient);
            prop_assert_eq!(row, before);
        }
    }
}
