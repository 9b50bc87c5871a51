use crate::{
    auth::auth::AuthUser,
    error::AppError,
    leave::ledger::{self, BalanceUpsert, current_year},
    model::remaining_leave::LeaveBalance,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct UpsertRemainingLeave {
    #[schema(example = "E1")]
    pub employee_id: String,
    #[schema(example = "casual")]
    pub leave_type: String,
    #[schema(example = 12.0)]
    pub remaining_leaves: Option<f64>,
    #[schema(example = 12.0)]
    pub total_leaves: Option<f64>,
    /// Defaults to the current year
    #[schema(example = 2024)]
    pub year: Option<i32>,
}

impl UpsertRemainingLeave {
    fn into_upsert(self) -> Result<BalanceUpsert, AppError> {
        for (field, value) in [
            ("total_leaves", self.total_leaves),
            ("remaining_leaves", self.remaining_leaves),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(AppError::BadRequest(format!(
                        "{field} must be a non-negative number"
                    )));
                }
            }
        }

        Ok(BalanceUpsert {
            employee_id: self.employee_id,
            leave_type: self.leave_type,
            total_leaves: self.total_leaves,
            remaining_leaves: self.remaining_leaves,
            year: self.year.unwrap_or_else(current_year),
        })
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BalanceQuery {
    /// Defaults to the current year
    pub year: Option<i32>,
}

/// Create or update a leave balance (HR)
#[utoipa::path(
    post,
    path = "/remaining-leaves/",
    request_body = UpsertRemainingLeave,
    responses(
        (status = 200, description = "Balance after the upsert", body = crate::model::remaining_leave::RemainingLeave),
        (status = 400, description = "Invalid amounts, or both amounts missing for a new balance"),
        (status = 403, description = "HR only"),
        (status = 404, description = "Employee does not participate in the leave type")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Remaining leaves"
)]
pub async fn upsert_remaining_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<UpsertRemainingLeave>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr()?;

    let upsert = payload.into_inner().into_upsert()?;
    let balance = ledger::upsert_remaining_leave(pool.get_ref(), &upsert).await?;

    Ok(HttpResponse::Ok().json(balance))
}

/// Balances of one employee for a year
#[utoipa::path(
    get,
    path = "/remaining-leaves/{employee_id}",
    params(
        ("employee_id" = String, Path, description = "Employee whose balances to list"),
        BalanceQuery
    ),
    responses(
        (status = 200, description = "Balances by leave type", body = Vec<LeaveBalance>),
        (status = 403, description = "Not your balance")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Remaining leaves"
)]
pub async fn list_balances(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
    query: web::Query<BalanceQuery>,
) -> Result<HttpResponse, AppError> {
    let employee_id = path.into_inner();
    auth.require_self_or_reviewer(&employee_id)?;

    let year = query.year.unwrap_or_else(current_year);

    let balances = sqlx::query_as::<_, LeaveBalance>(
        r#"
        SELECT lt.leave_type, rl.total_leaves, rl.remaining_leaves, rl.year
        FROM remaining_leaves rl
        JOIN leave_details ld ON ld.id = rl.leave_detail_id
        JOIN leave_types lt ON lt.id = ld.leave_type_id
        WHERE ld.employee_id = ?
        AND rl.year = ?
        ORDER BY lt.leave_type
        "#,
    )
    .bind(&employee_id)
    .bind(year)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(balances))
}
