//! Monthly leave report: approved leave taken per employee in a calendar
//! month, broken down by leave type, next to the employee's remaining balance.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

use crate::leave::error::LedgerError;

/// Approved days of one leave type taken by one employee in the month.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct LeaveTypeUsage {
    pub employee_id: String,
    pub employee_name: String,
    pub leave_type: String,
    pub days_taken: f64,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RemainingTotal {
    pub employee_id: String,
    pub remaining_leaves: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LeaveSummaryRow {
    #[schema(example = "E1")]
    pub employee_id: String,
    #[schema(example = "Jane Doe")]
    pub employee_name: String,
    #[schema(example = 3.0)]
    pub total_leaves_taken: f64,
    #[schema(example = 9.0)]
    pub remaining_leaves: f64,
    /// `leave_type:days` pairs joined with `", "`
    #[schema(example = "casual:1, sick:2")]
    pub leave_types: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaveSummaryPage {
    pub data: Vec<LeaveSummaryRow>,
    #[schema(example = 1)]
    pub total: usize,
}

/// First day of the month and first day of the following month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), LedgerError> {
    let invalid = || LedgerError::Validation(format!("Invalid month: {month}"));

    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;

    Ok((start, end))
}

/// Folds per-type usage into one row per employee. Employees without usage
/// produce no row; remaining totals default to 0.
pub fn summarize(usage: Vec<LeaveTypeUsage>, remaining: &[RemainingTotal]) -> Vec<LeaveSummaryRow> {
    let remaining: HashMap<&str, f64> = remaining
        .iter()
        .map(|r| (r.employee_id.as_str(), r.remaining_leaves))
        .collect();

    let mut grouped: BTreeMap<String, (String, Vec<(String, f64)>)> = BTreeMap::new();
    for row in usage {
        grouped
            .entry(row.employee_id)
            .or_insert_with(|| (row.employee_name, Vec::new()))
            .1
            .push((row.leave_type, row.days_taken));
    }

    grouped
        .into_iter()
        .map(|(employee_id, (employee_name, types))| {
            let total_leaves_taken: f64 = types.iter().map(|(_, days)| days).sum();
            let leave_types = types
                .iter()
                .map(|(name, days)| format!("{name}:{days}"))
                .collect::<Vec<_>>()
                .join(", ");
            let remaining_leaves = remaining
                .get(employee_id.as_str())
                .copied()
                .unwrap_or(0.0);

            LeaveSummaryRow {
                employee_id,
                employee_name,
                total_leaves_taken,
                remaining_leaves,
                leave_types,
            }
        })
        .collect()
}

/// Case-insensitive substring filter on id or name, then an
/// `[offset, offset + limit)` window. `total` counts the filtered rows.
pub fn search_and_paginate(
    rows: Vec<LeaveSummaryRow>,
    search: Option<&str>,
    limit: usize,
    offset: usize,
) -> LeaveSummaryPage {
    let needle = search.filter(|s| !s.is_empty()).map(str::to_lowercase);

    let filtered: Vec<LeaveSummaryRow> = match needle {
        Some(needle) => rows
            .into_iter()
            .filter(|row| {
                row.employee_id.to_lowercase().contains(&needle)
                    || row.employee_name.to_lowercase().contains(&needle)
            })
            .collect(),
        None => rows,
    };

    let total = filtered.len();
    let data = filtered.into_iter().skip(offset).take(limit).collect();

    LeaveSummaryPage { data, total }
}

#[tracing::instrument(name = "fetch_combined_leave_report", skip(pool))]
pub async fn fetch_combined_leave_report(
    pool: &MySqlPool,
    year: i32,
    month: u32,
) -> Result<Vec<LeaveSummaryRow>, LedgerError> {
    let (start, end) = month_bounds(year, month)?;

    let usage = sqlx::query_as::<_, LeaveTypeUsage>(
        r#"
        SELECT
            la.employee_id AS employee_id,
            u.name AS employee_name,
            lt.leave_type AS leave_type,
            SUM(la.total_days) AS days_taken
        FROM leave_applications la
        JOIN users u ON u.employee_id = la.employee_id
        JOIN leave_types lt ON lt.id = la.leave_type_id
        WHERE la.status = 'approved'
        AND la.start_date >= ?
        AND la.start_date < ?
        GROUP BY la.employee_id, u.name, lt.leave_type
        ORDER BY la.employee_id, lt.leave_type
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    if usage.is_empty() {
        return Ok(Vec::new());
    }

    let remaining = sqlx::query_as::<_, RemainingTotal>(
        r#"
        SELECT
            ld.employee_id AS employee_id,
            COALESCE(SUM(rl.remaining_leaves), 0) AS remaining_leaves
        FROM leave_details ld
        JOIN remaining_leaves rl ON rl.leave_detail_id = ld.id
        WHERE ld.employee_id IN (
            SELECT DISTINCT la.employee_id
            FROM leave_applications la
            WHERE la.status = 'approved'
            AND la.start_date >= ?
            AND la.start_date < ?
        )
        GROUP BY ld.employee_id
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let rows = summarize(usage, &remaining);
    tracing::debug!(rows = rows.len(), "Combined leave report built");
    Ok(rows)
}
