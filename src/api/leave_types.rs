use crate::{
    auth::auth::AuthUser,
    error::{AppError, is_unique_violation},
    model::leave_type::LeaveType,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateLeaveType {
    #[schema(example = "casual")]
    pub name: String,
    #[schema(example = "Casual leave for personal matters")]
    pub description: Option<String>,
}

/// Create a leave type (HR)
#[utoipa::path(
    post,
    path = "/leave-types",
    request_body = CreateLeaveType,
    responses(
        (status = 201, description = "Leave type created", body = LeaveType),
        (status = 400, description = "Name missing"),
        (status = 403, description = "HR only"),
        (status = 409, description = "Leave type already exists")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave types"
)]
pub async fn create_leave_type(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeaveType>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr()?;

    let name = payload.name.trim().to_lowercase();
    if name.is_empty() {
        return Err(AppError::BadRequest("Leave type name is required".into()));
    }
    let description = payload.description.clone().unwrap_or_default();

    let result = sqlx::query("INSERT INTO leave_types (leave_type, leave_description) VALUES (?, ?)")
        .bind(&name)
        .bind(&description)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Leave type {name} already exists"))
            } else {
                e.into()
            }
        })?;

    tracing::info!(leave_type = %name, by = %auth.employee_id, "Leave type created");

    Ok(HttpResponse::Created().json(LeaveType {
        id: result.last_insert_id(),
        leave_type: name,
        leave_description: description,
    }))
}

/// List leave types
#[utoipa::path(
    get,
    path = "/leave-types",
    responses(
        (status = 200, description = "All leave types", body = Vec<LeaveType>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave types"
)]
pub async fn list_leave_types(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let types = sqlx::query_as::<_, LeaveType>(
        "SELECT id, leave_type, leave_description FROM leave_types ORDER BY leave_type",
    )
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(types))
}
