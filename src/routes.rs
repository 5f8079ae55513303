use crate::{
    api::{dashboard, employee, leave_request, public_holiday, report, special_leave},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Context, Result};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Result<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        60_000 / requests_per_min as u64
    };
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms.max(1))
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .context("Invalid rate limit configuration")?;
    Ok(Governor::new(&cfg))
}

/// Per-endpoint rate limiters, built once at startup and shared by every worker.
#[derive(Clone)]
pub struct Limiters {
    login: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
    register: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
    refresh: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
    protected: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
}

impl Limiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: Arc::new(build_limiter(config.rate_login_per_min)?),
            register: Arc::new(build_limiter(config.rate_register_per_min)?),
            refresh: Arc::new(build_limiter(config.rate_refresh_per_min)?),
            protected: Arc::new(build_limiter(config.rate_protected_per_min)?),
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(limiters.register.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(limiters.protected.clone()) // rate limiting
            .service(
                web::scope("/employee")
                    // /employee
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    // /employee/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(employee::update_employee))
                            .route(web::get().to(employee::get_employee)),
                    )
                    .service(
                        web::resource("/{id}/remaining")
                            .route(web::get().to(employee::remaining_holidays)),
                    )
                    .service(
                        web::resource("/{id}/total/{year}")
                            .route(web::get().to(employee::total_holidays)),
                    ),
            )
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::leave_list))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    // before /{id} so they are not parsed as ids
                    .service(web::resource("/mine").route(web::get().to(leave_request::my_leave)))
                    .service(
                        web::resource("/existing")
                            .route(web::get().to(leave_request::existing_leave)),
                    )
                    // /leave/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(leave_request::get_leave))
                            .route(web::delete().to(leave_request::delete_leave)),
                    )
                    // /leave/{id}/approve
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(leave_request::approve_leave)),
                    )
                    // /leave/{id}/reject
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(leave_request::reject_leave)),
                    ),
            )
            .service(
                web::scope("/special-leave")
                    .service(
                        web::resource("/types")
                            .route(web::get().to(special_leave::list_types))
                            .route(web::post().to(special_leave::create_type)),
                    )
                    .service(web::resource("/usage").route(web::get().to(special_leave::own_usage)))
                    .service(
                        web::resource("/report").route(web::get().to(special_leave::usage_report)),
                    ),
            )
            .service(
                web::scope("/public-holidays")
                    .service(
                        web::resource("")
                            .route(web::get().to(public_holiday::list_holidays))
                            .route(web::post().to(public_holiday::create_holiday)),
                    )
                    .service(
                        web::resource("/import")
                            .route(web::post().to(public_holiday::import_holidays)),
                    ),
            )
            .service(
                web::scope("/reports")
                    .service(web::resource("/export").route(web::get().to(report::export_holidays)))
                    .service(web::resource("/calendar").route(web::get().to(report::calendar)))
                    .service(web::resource("/approved").route(web::get().to(report::approved))),
            )
            .service(web::resource("/dashboard").route(web::get().to(dashboard::dashboard)))
            .service(web::resource("/rollover").route(web::post().to(dashboard::run_rollover))),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token + refresh_token, old one revoked

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test, web::Data};

    #[actix_web::test]
    async fn api_scope_rejects_anonymous_requests() {
        let config = Config::for_tests();
        let limiters = Limiters::from_config(&config).unwrap();
        let app = test::init_service(
            App::new()
                .app_data(Data::new(config.clone()))
                .configure(|cfg| configure(cfg, &config, &limiters)),
        )
        .await;

        for uri in ["/api/leave/mine", "/api/dashboard", "/api/employee/1"] {
            let req = test::TestRequest::get()
                .uri(uri)
                .peer_addr("127.0.0.1:8080".parse().unwrap())
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[actix_web::test]
    async fn zero_rate_still_builds_a_limiter() {
        assert!(build_limiter(0).is_ok());
    }
}
