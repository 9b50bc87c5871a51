use crate::{
    auth::jwt::verify_token,
    config::Config,
    error::AppError,
    model::role::Role,
    models::{Claims, TokenType},
};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub email: String,
    pub role: Role,
    pub employee_id: String,
}

impl AuthUser {
    /// Accepts access tokens only.
    pub fn from_claims(claims: Claims) -> Result<Self, AppError> {
        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }

        Ok(Self {
            email: claims.sub,
            role: claims.role,
            employee_id: claims.employee_id,
        })
    }

    pub fn from_bearer(header: Option<&str>, secret: &str) -> Result<Self, AppError> {
        let header =
            header.ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Unauthorized("Authorization header must start with Bearer".into())
        })?;

        let claims = verify_token(token, secret)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

        Self::from_claims(claims)
    }

    pub fn require_hr(&self) -> Result<(), AppError> {
        if self.role.is_hr() {
            Ok(())
        } else {
            Err(AppError::Forbidden("HR only".into()))
        }
    }

    pub fn require_reviewer(&self) -> Result<(), AppError> {
        if self.role.can_review_leave() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Manager/HR only".into()))
        }
    }

    /// Employees may act on their own records; managers and HR on anyone's.
    pub fn require_self_or_reviewer(&self, employee_id: &str) -> Result<(), AppError> {
        if self.employee_id == employee_id || self.role.can_review_leave() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You can only act on your own leave".into(),
            ))
        }
    }

    pub fn require_self_or_hr(&self, employee_id: &str) -> Result<(), AppError> {
        if self.employee_id == employee_id || self.role.is_hr() {
            Ok(())
        } else {
            Err(AppError::Forbidden("You can only edit your own profile".into()))
        }
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Already verified by auth_middleware on protected scopes.
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let Some(config) = req.app_data::<Data<Config>>() else {
            return ready(Err(AppError::Internal("Config missing".into())));
        };

        let header = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok());

        ready(Self::from_bearer(header, &config.jwt_secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use crate::models::TokenSubject;
    use actix_web::test::TestRequest;

    fn subject(role: Role) -> TokenSubject {
        TokenSubject {
            email: "e1@company.com".into(),
            role,
            employee_id: "E1".into(),
        }
    }

    fn user(role: Role) -> AuthUser {
        AuthUser {
            email: "e1@company.com".into(),
            role,
            employee_id: "E1".into(),
        }
    }

    #[actix_web::test]
    async fn test_extracts_user_from_bearer_token() {
        let config = Config::for_tests();
        let token =
            generate_access_token(&subject(Role::Employee), &config.jwt_secret, 900).unwrap();

        let req = TestRequest::default()
            .app_data(Data::new(config))
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_http_request();

        let user = AuthUser::extract(&req).await.unwrap();
        assert_eq!(user.employee_id, "E1");
        assert_eq!(user.role, Role::Employee);
    }

    #[actix_web::test]
    async fn test_prefers_user_stored_by_middleware() {
        let req = TestRequest::default().to_http_request();
        req.extensions_mut().insert(user(Role::HrManager));

        // no header and no config: only the extension can satisfy it
        let extracted = AuthUser::extract(&req).await.unwrap();
        assert_eq!(extracted.employee_id, "E1");
        assert_eq!(extracted.role, Role::HrManager);
    }

    #[actix_web::test]
    async fn test_missing_header_is_unauthorized() {
        let req = TestRequest::default()
            .app_data(Data::new(Config::for_tests()))
            .to_http_request();

        let err = AuthUser::extract(&req).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[actix_web::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let config = Config::for_tests();
        let (token, _) =
            generate_refresh_token(&subject(Role::Hr), &config.jwt_secret, 900).unwrap();

        let req = TestRequest::default()
            .app_data(Data::new(config))
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_http_request();

        let err = AuthUser::extract(&req).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_bearer_prefix_required() {
        let err = AuthUser::from_bearer(Some("Token abc"), "s").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_role_guards() {
        assert!(user(Role::Hr).require_hr().is_ok());
        assert!(user(Role::Manager).require_hr().is_err());
        assert!(user(Role::Manager).require_reviewer().is_ok());
        assert!(user(Role::Employee).require_reviewer().is_err());

        assert!(user(Role::Employee).require_self_or_reviewer("E1").is_ok());
        assert!(user(Role::Employee).require_self_or_reviewer("E2").is_err());
        assert!(user(Role::Manager).require_self_or_reviewer("E2").is_ok());

        assert!(user(Role::Employee).require_self_or_hr("E1").is_ok());
        assert!(user(Role::Manager).require_self_or_hr("E2").is_err());
        assert!(user(Role::HrManager).require_self_or_hr("E2").is_ok());
    }
}
