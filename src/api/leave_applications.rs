use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::{AppError, is_foreign_key_violation},
    leave::ledger,
    model::leave_application::{APPLICATION_COLUMNS, ApplicationStatus, LeaveApplication},
};
use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const MAX_FILENAME_LEN: usize = 100;

/// Multipart body of `POST /leave-applications`. Documentation only.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct LeaveApplicationUpload {
    #[schema(example = "E1")]
    employee_id: String,
    #[schema(example = 1)]
    leave_type_id: u64,
    #[schema(example = "2024-03-04", format = "date")]
    start_date: String,
    #[schema(example = "2024-03-05", format = "date")]
    end_date: String,
    #[schema(example = "M1")]
    manager_id: String,
    #[schema(example = 2.0)]
    total_days: f64,
    #[schema(example = "Family function")]
    reason: String,
    #[schema(format = "binary")]
    file: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct RejectLeave {
    #[schema(example = "Team is short-staffed that week")]
    pub reason: String,
}

#[derive(Serialize, ToSchema)]
pub struct ApprovalResponse {
    #[schema(example = "Leave approved")]
    pub message: String,
    #[schema(example = 3.0)]
    pub remaining_leaves: f64,
    #[schema(example = 12.0)]
    pub total_leaves: f64,
}

/// Text fields collected from the multipart stream.
#[derive(Debug, Default)]
pub struct LeaveApplicationForm {
    employee_id: Option<String>,
    leave_type_id: Option<u64>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    manager_id: Option<String>,
    total_days: Option<f64>,
    reason: Option<String>,
}

#[derive(Debug, PartialEq)]
pub struct NewLeaveApplication {
    pub employee_id: String,
    pub leave_type_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub manager_id: String,
    pub total_days: f64,
    pub reason: String,
}

fn parse_field<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid value for {name}: {value:?}")))
}

fn parse_date(name: &str, value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("{name} must be a YYYY-MM-DD date")))
}

fn required<T>(name: &str, value: Option<T>) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::BadRequest(format!("{name} is required")))
}

impl LeaveApplicationForm {
    /// Unknown field names are ignored.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), AppError> {
        match name {
            "employee_id" => self.employee_id = Some(value.trim().to_string()),
            "leave_type_id" => self.leave_type_id = Some(parse_field(name, value)?),
            "start_date" => self.start_date = Some(parse_date(name, value)?),
            "end_date" => self.end_date = Some(parse_date(name, value)?),
            "manager_id" => self.manager_id = Some(value.trim().to_string()),
            "total_days" => self.total_days = Some(parse_field(name, value)?),
            "reason" => self.reason = Some(value.trim().to_string()),
            _ => {}
        }
        Ok(())
    }

    pub fn into_new(self) -> Result<NewLeaveApplication, AppError> {
        let app = NewLeaveApplication {
            employee_id: required("employee_id", self.employee_id)?,
            leave_type_id: required("leave_type_id", self.leave_type_id)?,
            start_date: required("start_date", self.start_date)?,
            end_date: required("end_date", self.end_date)?,
            manager_id: required("manager_id", self.manager_id)?,
            total_days: required("total_days", self.total_days)?,
            reason: required("reason", self.reason)?,
        };

        if app.start_date > app.end_date {
            return Err(AppError::BadRequest(
                "start_date cannot be after end_date".into(),
            ));
        }
        if !app.total_days.is_finite() || app.total_days <= 0.0 {
            return Err(AppError::BadRequest(
                "total_days must be a positive number".into(),
            ));
        }
        if app.reason.is_empty() {
            return Err(AppError::BadRequest("reason is required".into()));
        }
        Ok(app)
    }
}

/// Keeps the last path component and replaces anything outside
/// `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.chars().take(MAX_FILENAME_LEN).collect()
    }
}

struct UploadedFile {
    filename: String,
    bytes: Vec<u8>,
}

async fn read_multipart(
    mut payload: Multipart,
) -> Result<(LeaveApplicationForm, Option<UploadedFile>), AppError> {
    let bad_multipart = |e: actix_multipart::MultipartError| {
        AppError::BadRequest(format!("Invalid multipart body: {e}"))
    };

    let mut form = LeaveApplicationForm::default();
    let mut upload = None;

    while let Some(mut field) = payload.try_next().await.map_err(bad_multipart)? {
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or_default().to_string();
        let filename = disposition.get_filename().map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(bad_multipart)? {
            if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(AppError::BadRequest("Uploaded file is too large".into()));
            }
            bytes.extend_from_slice(&chunk);
        }

        match (name.as_str(), filename) {
            ("file", Some(filename)) => {
                if !bytes.is_empty() {
                    upload = Some(UploadedFile { filename, bytes });
                }
            }
            _ => {
                let value = String::from_utf8(bytes)
                    .map_err(|_| AppError::BadRequest(format!("{name} must be UTF-8 text")))?;
                form.set(&name, &value)?;
            }
        }
    }

    Ok((form, upload))
}

/// Writes the upload under `dir` and returns the stored path.
async fn store_upload(dir: &str, upload: UploadedFile) -> Result<String, AppError> {
    let stored_name = format!("{}_{}", Uuid::new_v4(), sanitize_filename(&upload.filename));
    let dir = PathBuf::from(dir);
    let path = dir.join(&stored_name);
    let target = path.clone();

    web::block(move || {
        std::fs::create_dir_all(&dir)?;
        std::fs::write(&target, &upload.bytes)
    })
    .await
    .map_err(|e| AppError::Internal(format!("upload task failed: {e}")))?
    .map_err(|e| {
        error!(error = %e, "Failed to store upload");
        AppError::Internal(format!("failed to store upload: {e}"))
    })?;

    Ok(path_to_string(&path))
}

/// Best-effort removal of a stored upload.
async fn discard_upload(path: String) {
    let target = path.clone();
    match web::block(move || std::fs::remove_file(target)).await {
        Ok(Ok(())) => debug!(path = %path, "Discarded orphaned upload"),
        Ok(Err(e)) => warn!(path = %path, error = %e, "Failed to discard upload"),
        Err(e) => warn!(path = %path, error = %e, "Upload cleanup task failed"),
    }
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

async fn fetch_application(pool: &MySqlPool, id: u64) -> Result<LeaveApplication, AppError> {
    sqlx::query_as::<_, LeaveApplication>(&format!(
        "SELECT {APPLICATION_COLUMNS} FROM leave_applications WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Leave application {id} not found")))
}

/// Submit a leave application
#[utoipa::path(
    post,
    path = "/leave-applications",
    request_body(
        content = LeaveApplicationUpload,
        description = "Application fields with an optional supporting file",
        content_type = "multipart/form-data"
    ),
    responses(
        (status = 201, description = "Application stored as pending", body = LeaveApplication),
        (status = 400, description = "Missing or invalid fields"),
        (status = 403, description = "Applications can only be filed for yourself"),
        (status = 404, description = "Unknown leave type or manager")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave applications"
)]
pub async fn create_application(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let (form, upload) = read_multipart(payload).await?;
    let app = form.into_new()?;

    if app.employee_id != auth.employee_id {
        return Err(AppError::Forbidden(
            "You can only apply for your own leave".into(),
        ));
    }

    let (file_path, number_of_files) = match upload {
        Some(upload) => (Some(store_upload(&config.upload_dir, upload).await?), 1),
        None => (None, 0),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO leave_applications
            (employee_id, leave_type_id, start_date, end_date, manager_id,
             total_days, status, reason, file_path, number_of_files)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&app.employee_id)
    .bind(app.leave_type_id)
    .bind(app.start_date)
    .bind(app.end_date)
    .bind(&app.manager_id)
    .bind(app.total_days)
    .bind(ApplicationStatus::Pending.as_ref())
    .bind(&app.reason)
    .bind(&file_path)
    .bind(number_of_files)
    .execute(pool.get_ref())
    .await;

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            // no row will reference the stored file
            if let Some(path) = file_path {
                discard_upload(path).await;
            }
            if is_foreign_key_violation(&e) {
                return Err(AppError::NotFound("Unknown leave type or manager".into()));
            }
            return Err(e.into());
        }
    };

    info!(
        id = result.last_insert_id(),
        employee_id = %app.employee_id,
        "Leave application submitted"
    );

    let stored = fetch_application(pool.get_ref(), result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(stored))
}

/// The caller's own leave applications
#[utoipa::path(
    get,
    path = "/leave-applications",
    responses(
        (status = 200, description = "Newest first", body = Vec<LeaveApplication>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave applications"
)]
pub async fn list_my_applications(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let applications = sqlx::query_as::<_, LeaveApplication>(&format!(
        "SELECT {APPLICATION_COLUMNS} FROM leave_applications \
         WHERE employee_id = ? ORDER BY date_of_application DESC, id DESC"
    ))
    .bind(&auth.employee_id)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(applications))
}

/// Approve a pending application and debit the balance
#[utoipa::path(
    put,
    path = "/leave-applications/{id}/approve",
    params(
        ("id" = u64, Path, description = "Leave application ID")
    ),
    responses(
        (status = 200, description = "Approved; balance debited", body = ApprovalResponse),
        (status = 400, description = "Not pending, or insufficient balance"),
        (status = 403, description = "Manager/HR only"),
        (status = 404, description = "Application, participation or balance missing")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave applications"
)]
pub async fn approve_application(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_reviewer()?;

    let balance =
        ledger::approve_application(pool.get_ref(), path.into_inner(), &auth.employee_id).await?;

    Ok(HttpResponse::Ok().json(ApprovalResponse {
        message: "Leave approved".to_string(),
        remaining_leaves: balance.remaining_leaves,
        total_leaves: balance.total_leaves,
    }))
}

/// Reject a pending application
#[utoipa::path(
    put,
    path = "/leave-applications/{id}/reject",
    params(
        ("id" = u64, Path, description = "Leave application ID")
    ),
    request_body = RejectLeave,
    responses(
        (status = 200, description = "Rejected", body = Object, example = json!({
            "message": "Leave rejected"
        })),
        (status = 400, description = "Not pending, or reason missing"),
        (status = 403, description = "Manager/HR only"),
        (status = 404, description = "Application not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave applications"
)]
pub async fn reject_application(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<RejectLeave>,
) -> Result<HttpResponse, AppError> {
    auth.require_reviewer()?;

    ledger::reject_application(
        pool.get_ref(),
        path.into_inner(),
        &auth.employee_id,
        &payload.reason,
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Leave rejected"
    })))
}
