use crate::{
    auth::auth::AuthUser,
    error::{AppError, is_foreign_key_violation, is_unique_violation},
    model::leave_detail::LeaveDetail,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateLeaveDetail {
    #[schema(example = "E1")]
    pub employee_id: String,
    #[schema(example = 1)]
    pub leave_type_id: u64,
}

/// Enrol an employee in a leave type (HR)
#[utoipa::path(
    post,
    path = "/leave-details",
    request_body = CreateLeaveDetail,
    responses(
        (status = 201, description = "Participation recorded", body = LeaveDetail),
        (status = 403, description = "HR only"),
        (status = 404, description = "Unknown employee or leave type"),
        (status = 409, description = "Employee already has this leave type")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave details"
)]
pub async fn create_leave_detail(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeaveDetail>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr()?;

    let payload = payload.into_inner();

    let result = sqlx::query("INSERT INTO leave_details (employee_id, leave_type_id) VALUES (?, ?)")
        .bind(&payload.employee_id)
        .bind(payload.leave_type_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Leave detail already exists".into())
            } else if is_foreign_key_violation(&e) {
                AppError::NotFound("Unknown employee or leave type".into())
            } else {
                e.into()
            }
        })?;

    Ok(HttpResponse::Created().json(LeaveDetail {
        id: result.last_insert_id(),
        employee_id: payload.employee_id,
        leave_type_id: payload.leave_type_id,
    }))
}
