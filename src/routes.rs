use crate::{
    api::{
        combined, leave_applications, leave_details, leave_operations, leave_types, profile,
        remaining_leaves, users,
    },
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

/// Per-client-IP limiter allowing `requests_per_min` with an equal burst.
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(requests_per_min)).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/token")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter)
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::logout)),
            ),
    );

    cfg.service(
        web::scope("/users")
            // registration stays public
            .service(
                web::resource("")
                    .wrap(register_limiter)
                    .route(web::post().to(users::create_user)),
            )
            .service(
                web::resource("/me")
                    .wrap(from_fn(auth_middleware))
                    .wrap(protected_limiter.clone())
                    .route(web::get().to(users::me)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope("/leave-types")
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter.clone())
            .service(
                web::resource("")
                    .route(web::get().to(leave_types::list_leave_types))
                    .route(web::post().to(leave_types::create_leave_type)),
            ),
    );

    cfg.service(
        web::scope("/leave-details")
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter.clone())
            .service(
                web::resource("").route(web::post().to(leave_details::create_leave_detail)),
            ),
    );

    cfg.service(
        web::scope("/remaining-leaves")
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter.clone())
            // /remaining-leaves/ (trailing slash trimmed by NormalizePath)
            .service(
                web::resource("")
                    .route(web::post().to(remaining_leaves::upsert_remaining_leave)),
            )
            .service(
                web::resource("/{employee_id}")
                    .route(web::get().to(remaining_leaves::list_balances)),
            ),
    );

    cfg.service(
        web::scope("/leave-applications")
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter.clone())
            .service(
                web::resource("")
                    .route(web::get().to(leave_applications::list_my_applications))
                    .route(web::post().to(leave_applications::create_application)),
            )
            .service(
                web::resource("/{id}/approve")
                    .route(web::put().to(leave_applications::approve_application)),
            )
            .service(
                web::resource("/{id}/reject")
                    .route(web::put().to(leave_applications::reject_application)),
            ),
    );

    cfg.service(
        web::scope("/combined")
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter.clone())
            .service(
                web::resource("/all_leave_details")
                    .route(web::get().to(combined::all_leave_details)),
            ),
    );

    cfg.service(
        web::scope("/profile")
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter.clone())
            .service(web::resource("/{employee_id}").route(web::get().to(profile::get_profile)))
            .service(
                web::resource("/update/{employee_id}")
                    .route(web::post().to(profile::update_profile)),
            ),
    );

    cfg.service(
        web::scope("/api/leaves")
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(
                web::resource("/apply-leave")
                    .route(web::post().to(leave_operations::apply_leave)),
            ),
    );
}

// LOGIN  POST /auth/token
//  ├─ access_token  (ACCESS_TOKEN_TTL, 15 min)
//  └─ refresh_token (REFRESH_TOKEN_TTL, 7 days, jti stored)
//
// API REQUEST
//  └─ Authorization: Bearer access_token
//
// ACCESS EXPIRED
//  └─ POST /auth/refresh {refresh_token}
//       └─ old jti revoked, new pair returned

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{bearer, service_config};
    use crate::model::role::Role;
    use actix_web::{App, http::StatusCode, test};

    fn peer() -> std::net::SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[actix_web::test]
    async fn test_protected_scopes_require_a_token() {
        let app = test::init_service(
            App::new()
                .configure(service_config)
                .configure(|cfg| configure(cfg, Config::for_tests())),
        )
        .await;

        for (method, uri) in [
            ("GET", "/leave-types"),
            ("POST", "/leave-details"),
            ("POST", "/remaining-leaves"),
            ("GET", "/remaining-leaves/E1"),
            ("GET", "/leave-applications"),
            ("PUT", "/leave-applications/1/approve"),
            ("GET", "/combined/all_leave_details?year=2024&month=3"),
            ("GET", "/profile/E1"),
            ("POST", "/api/leaves/apply-leave"),
            ("GET", "/users/me"),
        ] {
            let req = test::TestRequest::default()
                .method(method.parse().unwrap())
                .uri(uri)
                .peer_addr(peer())
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }

    #[actix_web::test]
    async fn test_role_checked_behind_middleware() {
        let app = test::init_service(
            App::new()
                .configure(service_config)
                .configure(|cfg| configure(cfg, Config::for_tests())),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/combined/all_leave_details?year=2024&month=3")
            .insert_header(("Authorization", bearer(Role::Employee, "E1")))
            .peer_addr(peer())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_limiter_rejects_burst_overflow() {
        let mut config = Config::for_tests();
        config.rate_protected_per_min = 1;
        let app = test::init_service(
            App::new()
                .configure(service_config)
                .configure(move |cfg| configure(cfg, config)),
        )
        .await;

        let mut statuses = Vec::new();
        for _ in 0..2 {
            let req = test::TestRequest::get()
                .uri("/profile/E1")
                .peer_addr(peer())
                .to_request();
            // the limiter answers with an error rather than a response
            let status = match test::try_call_service(&app, req).await {
                Ok(resp) => resp.status(),
                Err(e) => e.as_response_error().status_code(),
            };
            statuses.push(status);
        }
        assert_eq!(statuses, vec![StatusCode::UNAUTHORIZED, StatusCode::TOO_MANY_REQUESTS]);
    }
}
