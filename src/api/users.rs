use crate::{
    auth::{auth::AuthUser, password::hash_password},
    error::{AppError, is_unique_violation},
    model::{
        employee::{EMPLOYEE_COLUMNS, Employee},
        role::Role,
    },
    utils::email_index,
};
use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{error, info, instrument};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateUser {
    #[schema(example = "E1")]
    pub employee_id: String,
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "Software Engineer")]
    pub designation: String,
    #[schema(example = "active")]
    pub status: String,
    pub role: Role,
    #[schema(example = "jane@company.com", format = "email")]
    pub email: String,
    #[schema(example = "s3cret-pass")]
    pub password: String,
    #[schema(example = "M1")]
    pub manager_id: Option<String>,
}

impl CreateUser {
    fn validate(&self) -> Result<(), AppError> {
        if self.employee_id.trim().is_empty() || self.name.trim().is_empty() {
            return Err(AppError::BadRequest(
                "employee_id and name must not be empty".into(),
            ));
        }
        if !self.email.contains('@') {
            return Err(AppError::BadRequest("A valid email is required".into()));
        }
        if self.password.len() < 6 {
            return Err(AppError::BadRequest(
                "Password must be at least 6 characters".into(),
            ));
        }
        Ok(())
    }
}

/// Employee as returned by the API. Never carries the password hash.
#[derive(Serialize, ToSchema)]
pub struct EmployeeResponse {
    #[schema(example = "E1")]
    pub employee_id: String,
    #[schema(example = "Jane Doe")]
    pub name: String,
    pub designation: String,
    pub status: String,
    pub role: Role,
    pub email: String,
    pub manager_id: Option<String>,
    pub is_active: bool,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<Employee> for EmployeeResponse {
    fn from(e: Employee) -> Self {
        Self {
            employee_id: e.employee_id,
            name: e.name,
            designation: e.designation,
            status: e.status,
            role: e.role,
            email: e.email,
            manager_id: e.manager_id,
            is_active: e.is_active,
            created_at: e.created_at,
        }
    }
}

async fn fetch_employee(pool: &MySqlPool, employee_id: &str) -> Result<Employee, AppError> {
    sqlx::query_as::<_, Employee>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM users WHERE employee_id = ?"
    ))
    .bind(employee_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Employee {employee_id} not found")))
}

/// Register an employee account
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "Employee registered", body = EmployeeResponse),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Employee ID or email already registered")
    ),
    tag = "Users"
)]
#[instrument(
    name = "register_user",
    skip(pool, payload),
    fields(employee_id = %payload.employee_id)
)]
pub async fn create_user(
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateUser>,
) -> Result<HttpResponse, AppError> {
    payload.validate()?;

    let email = email_index::normalize(&payload.email);
    if email_index::is_known_taken(&email).await {
        info!("Registration refused: email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let hashed = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        AppError::Internal("password hashing failed".into())
    })?;

    let result = sqlx::query(
        r#"
        INSERT INTO users
            (employee_id, name, designation, status, role, email, password, manager_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_id.trim())
    .bind(payload.name.trim())
    .bind(&payload.designation)
    .bind(&payload.status)
    .bind(payload.role.as_ref())
    .bind(&email)
    .bind(&hashed)
    .bind(&payload.manager_id)
    .execute(pool.get_ref())
    .await;

    if let Err(e) = result {
        if is_unique_violation(&e) {
            if violates_email_key(&e) {
                email_index::remember(&email).await;
                return Err(AppError::Conflict("Email already registered".into()));
            }
            return Err(AppError::Conflict("Employee ID already registered".into()));
        }
        return Err(e.into());
    }

    email_index::remember(&email).await;
    info!("Employee registered");

    let employee = fetch_employee(pool.get_ref(), payload.employee_id.trim()).await?;
    Ok(HttpResponse::Created().json(EmployeeResponse::from(employee)))
}

/// MySQL names the violated key only in the message:
/// `Duplicate entry '..' for key 'users.uq_users_email'`.
fn names_email_key(message: &str) -> bool {
    message.contains("'uq_users_email'") || message.contains(".uq_users_email'")
}

fn violates_email_key(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => names_email_key(db_err.message()),
        _ => false,
    }
}

/// The authenticated employee
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Current employee", body = EmployeeResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Employee no longer exists")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Users"
)]
pub async fn me(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let employee = fetch_employee(pool.get_ref(), &auth.employee_id).await?;
    Ok(HttpResponse::Ok().json(EmployeeResponse::from(employee)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::lazy_pool;
    use actix_web::{
        App,
        http::StatusCode,
        test::{TestRequest, call_service, init_service},
        web::Data,
    };
    use serde_json::json;

    fn payload(email: &str, password: &str) -> serde_json::Value {
        json!({
            "employee_id": "E1",
            "name": "Jane Doe",
            "designation": "Engineer",
            "status": "active",
            "role": "employee",
            "email": email,
            "password": password,
        })
    }

    #[actix_web::test]
    async fn test_invalid_registration_is_bad_request() {
        let app = init_service(
            App::new()
                .app_data(Data::new(lazy_pool()))
                .route("/users", web::post().to(create_user)),
        )
        .await;

        for body in [payload("no-at-sign", "long-enough"), payload("e1@company.com", "123")] {
            let req = TestRequest::post()
                .uri("/users")
                .set_json(body)
                .to_request();
            let resp = call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[actix_web::test]
    async fn test_known_email_is_conflict_without_database() {
        email_index::remember("taken.register@company.com").await;

        let app = init_service(
            App::new()
                .app_data(Data::new(lazy_pool()))
                .route("/users", web::post().to(create_user)),
        )
        .await;

        let req = TestRequest::post()
            .uri("/users")
            .set_json(payload("Taken.Register@company.com", "long-enough"))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_only_the_email_key_marks_an_email_taken() {
        assert!(names_email_key(
            "Duplicate entry 'a@company.com' for key 'users.uq_users_email'"
        ));
        assert!(names_email_key(
            "Duplicate entry 'a@company.com' for key 'uq_users_email'"
        ));
        // employee_id collision leaves the email free for a later registration
        assert!(!names_email_key("Duplicate entry 'E1' for key 'users.PRIMARY'"));
        assert!(!names_email_key("Duplicate entry 'E1' for key 'PRIMARY'"));
        assert!(!violates_email_key(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn test_response_hides_password() {
        let employee = Employee {
            employee_id: "E1".into(),
            name: "Jane".into(),
            designation: "Engineer".into(),
            status: "active".into(),
            role: Role::Employee,
            email: "e1@company.com".into(),
            password: "$argon2id$secret".into(),
            manager_id: None,
            is_active: true,
            created_at: None,
            updated_at: None,
        };

        let body = serde_json::to_value(EmployeeResponse::from(employee)).unwrap();
        assert!(body.get("password").is_none());
        assert_eq!(body["role"], "employee");
    }
}
