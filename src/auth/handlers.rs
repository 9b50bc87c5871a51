use crate::{
    auth::{
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::verify_password,
    },
    config::Config,
    error::AppError,
    model::employee::{EMPLOYEE_COLUMNS, Employee},
    models::{LoginReqDto, RefreshTokenRequest, TokenResponse, TokenSubject, TokenType, UserInfo},
};
use actix_web::{HttpResponse, web};
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{debug, info, instrument};

#[derive(sqlx::FromRow)]
struct RefreshRecord {
    id: u64,
    employee_id: String,
    revoked: bool,
}

fn token_error(e: jsonwebtoken::errors::Error) -> AppError {
    AppError::Internal(format!("token encoding failed: {e}"))
}

async fn find_employee_by_email(
    conn: &mut MySqlConnection,
    email: &str,
) -> Result<Option<Employee>, sqlx::Error> {
    sqlx::query_as::<_, Employee>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM users WHERE email = ?"
    ))
    .bind(email)
    .fetch_optional(conn)
    .await
}

async fn find_employee_by_id(
    conn: &mut MySqlConnection,
    employee_id: &str,
) -> Result<Option<Employee>, sqlx::Error> {
    sqlx::query_as::<_, Employee>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM users WHERE employee_id = ?"
    ))
    .bind(employee_id)
    .fetch_optional(conn)
    .await
}

/// Signs an access/refresh pair for `employee` and records the refresh `jti`.
async fn issue_token_pair(
    conn: &mut MySqlConnection,
    employee: &Employee,
    config: &Config,
) -> Result<TokenResponse, AppError> {
    let subject = TokenSubject {
        email: employee.email.clone(),
        role: employee.role,
        employee_id: employee.employee_id.clone(),
    };

    let access_token =
        generate_access_token(&subject, &config.jwt_secret, config.access_token_ttl)
            .map_err(token_error)?;
    let (refresh_token, refresh_claims) =
        generate_refresh_token(&subject, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(token_error)?;

    debug!(jti = %refresh_claims.jti, "Storing refresh token");
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (employee_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(&employee.employee_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(conn)
    .await?;

    Ok(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        refresh_token,
        role: employee.role,
        user_info: UserInfo {
            employee_id: employee.employee_id.clone(),
            name: employee.name.clone(),
            role: employee.role,
        },
    })
}

#[utoipa::path(
    post,
    path = "/auth/token",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Access and refresh tokens", body = TokenResponse),
        (status = 400, description = "Email or password missing"),
        (status = 401, description = "Invalid credentials or inactive account")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(email = %user.email)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    let email = user.email.trim();
    if email.is_empty() || user.password.is_empty() {
        return Err(AppError::BadRequest("Email and password are required".into()));
    }

    let mut conn = pool.acquire().await?;

    let Some(employee) = find_employee_by_email(&mut conn, email).await? else {
        info!("Invalid credentials: unknown email");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    };

    if !verify_password(&user.password, &employee.password) {
        info!("Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    if !employee.is_active {
        info!(employee_id = %employee.employee_id, "Login refused: inactive account");
        return Err(AppError::Unauthorized("Account is inactive".into()));
    }

    let tokens = issue_token_pair(&mut conn, &employee, &config).await?;

    info!(employee_id = %employee.employee_id, "Login successful");
    Ok(HttpResponse::Ok().json(tokens))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Rotated token pair", body = TokenResponse),
        (status = 401, description = "Refresh token invalid, expired or revoked")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_refresh", skip_all)]
pub async fn refresh_token(
    body: web::Json<RefreshTokenRequest>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let claims = verify_token(&body.refresh_token, &config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired refresh token".into()))?;

    if claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized("Refresh token required".into()));
    }

    let mut tx = pool.begin().await?;

    let record = sqlx::query_as::<_, RefreshRecord>(
        r#"
        SELECT id, employee_id, revoked
        FROM refresh_tokens
        WHERE jti = ?
        FOR UPDATE
        "#,
    )
    .bind(&claims.jti)
    .fetch_optional(&mut *tx)
    .await?;

    let record = match record {
        Some(r) if !r.revoked && r.employee_id == claims.employee_id => r,
        _ => {
            info!(jti = %claims.jti, "Refresh refused: unknown or revoked token");
            return Err(AppError::Unauthorized("Refresh token revoked".into()));
        }
    };

    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ?")
        .bind(record.id)
        .execute(&mut *tx)
        .await?;

    // Role or status may have changed since the token was issued.
    let employee = match find_employee_by_id(&mut tx, &record.employee_id).await? {
        Some(e) if e.is_active => e,
        _ => return Err(AppError::Unauthorized("Account is inactive".into())),
    };

    let tokens = issue_token_pair(&mut tx, &employee, &config).await?;
    tx.commit().await?;

    info!(employee_id = %employee.employee_id, "Refresh token rotated");
    Ok(HttpResponse::Ok().json(tokens))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = RefreshTokenRequest,
    responses(
        (status = 204, description = "Refresh token revoked (idempotent)")
    ),
    tag = "Auth"
)]
pub async fn logout(
    body: web::Json<RefreshTokenRequest>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    // Anything that is not a valid refresh token has nothing to revoke.
    let Ok(claims) = verify_token(&body.refresh_token, &config.jwt_secret) else {
        return Ok(HttpResponse::NoContent().finish());
    };
    if claims.token_type != TokenType::Refresh {
        return Ok(HttpResponse::NoContent().finish());
    }

    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await?;

    debug!(jti = %claims.jti, "Refresh token revoked");
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_access_token;
    use crate::db::lazy_pool;
    use crate::model::role::Role;
    use actix_web::{App, http::StatusCode, test, web::Data};

    fn subject() -> TokenSubject {
        TokenSubject {
            email: "e1@company.com".into(),
            role: Role::Employee,
            employee_id: "E1".into(),
        }
    }

    #[actix_web::test]
    async fn test_login_requires_email_and_password() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(lazy_pool()))
                .app_data(Data::new(Config::for_tests()))
                .route("/auth/token", web::post().to(login)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/auth/token")
            .set_json(serde_json::json!({ "email": "  ", "password": "" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_refresh_rejects_access_and_garbage_tokens() {
        let config = Config::for_tests();
        let access = generate_access_token(&subject(), &config.jwt_secret, 900).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(Data::new(lazy_pool()))
                .app_data(Data::new(config))
                .route("/auth/refresh", web::post().to(refresh_token)),
        )
        .await;

        for token in [access.as_str(), "garbage"] {
            let req = test::TestRequest::post()
                .uri("/auth/refresh")
                .set_json(serde_json::json!({ "refresh_token": token }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[actix_web::test]
    async fn test_logout_with_unusable_token_is_no_content() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(lazy_pool()))
                .app_data(Data::new(Config::for_tests()))
                .route("/auth/logout", web::post().to(logout)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/auth/logout")
            .set_json(serde_json::json!({ "refresh_token": "not-a-token" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }
}
