use crate::{
    auth::auth::AuthUser,
    error::AppError,
    leave::ledger::{self, ApplyLeave, DEFAULT_LEAVE_TYPE, current_year},
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::ToSchema;

fn default_leave_type() -> String {
    DEFAULT_LEAVE_TYPE.to_string()
}

fn default_clear_lop() -> bool {
    true
}

#[derive(Deserialize, ToSchema)]
pub struct ApplyLeaveRequest {
    #[schema(example = "E1")]
    pub employee_id: String,
    #[serde(default = "default_leave_type")]
    #[schema(example = "casual")]
    pub leave_type: String,
    #[schema(example = 3.0)]
    pub days_applied: f64,
    /// Must be true: the request has to be covered by the balance in full
    #[serde(default = "default_clear_lop")]
    #[schema(example = true)]
    pub clear_lop: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ApplyLeaveResponse {
    #[schema(example = "Leave applied successfully")]
    pub message: String,
    #[schema(example = 2.0)]
    pub remaining_leaves: f64,
    #[schema(example = 12.0)]
    pub total_leaves: f64,
}

/// Debit leave days from the current year's balance
#[utoipa::path(
    post,
    path = "/api/leaves/apply-leave",
    request_body = ApplyLeaveRequest,
    responses(
        (status = 200, description = "Balance debited", body = ApplyLeaveResponse),
        (status = 400, description = "No participation or balance, insufficient balance, or invalid days"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not your leave")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave operations"
)]
pub async fn apply_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ApplyLeaveRequest>,
) -> Result<HttpResponse, AppError> {
    let payload = payload.into_inner();
    auth.require_self_or_reviewer(&payload.employee_id)?;

    let request = ApplyLeave {
        employee_id: payload.employee_id,
        leave_type: payload.leave_type,
        days_applied: payload.days_applied,
        clear_lop: payload.clear_lop,
    };

    // Missing participation or balance is a client error on this route.
    let balance = ledger::apply_leave(pool.get_ref(), &request, current_year())
        .await
        .map_err(|e| {
            if e.is_not_found() {
                AppError::BadRequest(e.to_string())
            } else {
                AppError::from(e)
            }
        })?;

    Ok(HttpResponse::Ok().json(ApplyLeaveResponse {
        message: "Leave applied successfully".to_string(),
        remaining_leaves: balance.remaining_leaves,
        total_leaves: balance.total_leaves,
    }))
}
