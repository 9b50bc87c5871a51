use crate::{
    auth::auth::AuthUser,
    error::AppError,
    leave::report::{fetch_combined_leave_report, search_and_paginate},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::IntoParams;

fn default_limit() -> usize {
    10
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CombinedQuery {
    /// Calendar year, e.g. 2024
    pub year: i32,
    /// 1-12
    pub month: u32,
    /// Case-insensitive match on employee id or name
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    #[param(default = 10)]
    pub limit: usize,
    #[serde(default)]
    #[param(default = 0)]
    pub offset: usize,
}

/// Monthly approved leave per employee with remaining balance
#[utoipa::path(
    get,
    path = "/combined/all_leave_details",
    params(CombinedQuery),
    responses(
        (status = 200, description = "Filtered page of the monthly report", body = crate::leave::report::LeaveSummaryPage),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Manager/HR only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Reports"
)]
pub async fn all_leave_details(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<CombinedQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_reviewer()?;

    let query = query.into_inner();
    let rows = fetch_combined_leave_report(pool.get_ref(), query.year, query.month).await?;
    let page = search_and_paginate(rows, query.search.as_deref(), query.limit, query.offset);

    Ok(HttpResponse::Ok().json(page))
}
