use crate::auth::auth::AuthUser;
use crate::config::Config;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;

/// Verifies the bearer access token and stores the caller as an [`AuthUser`]
/// request extension for the handlers behind it.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let auth_user = match AuthUser::from_bearer(header, &config.jwt_secret) {
        Ok(user) => user,
        Err(e) => {
            tracing::debug!(path = %req.path(), reason = %e, "Rejected unauthenticated request");
            let resp = HttpResponse::Unauthorized().json(json!({ "message": e.to_string() }));
            return Ok(req.into_response(resp.map_into_boxed_body()));
        }
    };

    tracing::debug!(
        employee_id = %auth_user.employee_id,
        email = %auth_user.email,
        role = %auth_user.role,
        "Authenticated request"
    );
    req.extensions_mut().insert(auth_user);

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use crate::model::role::Role;
    use crate::models::TokenSubject;
    use actix_web::{App, HttpResponse, http::StatusCode, middleware::from_fn, test, web};

    async fn whoami(user: AuthUser) -> HttpResponse {
        HttpResponse::Ok().body(user.employee_id)
    }

    fn subject() -> TokenSubject {
        TokenSubject {
            email: "m1@company.com".into(),
            role: Role::Manager,
            employee_id: "M1".into(),
        }
    }

    #[actix_web::test]
    async fn test_valid_token_reaches_handler() {
        let config = Config::for_tests();
        let token = generate_access_token(&subject(), &config.jwt_secret, 900).unwrap();
        let app = test::init_service(
            App::new().app_data(Data::new(config)).service(
                web::scope("/p")
                    .wrap(from_fn(auth_middleware))
                    .route("/me", web::get().to(whoami)),
            ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/p/me")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert_eq!(body, "M1");
    }

    #[actix_web::test]
    async fn test_missing_and_wrong_tokens_are_rejected() {
        let config = Config::for_tests();
        let (refresh, _) = generate_refresh_token(&subject(), &config.jwt_secret, 900).unwrap();
        let app = test::init_service(
            App::new().app_data(Data::new(config)).service(
                web::scope("/p")
                    .wrap(from_fn(auth_middleware))
                    .route("/me", web::get().to(whoami)),
            ),
        )
        .await;

        let req = test::TestRequest::get().uri("/p/me").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/p/me")
            .insert_header(("Authorization", format!("Bearer {refresh}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/p/me")
            .insert_header(("Authorization", "Bearer nonsense"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
