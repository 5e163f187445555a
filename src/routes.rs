use crate::{
    api::{attendance, cron, leave_request, settings},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Per-route limiter; a zero rate is treated as one request per minute,
// rates above one per millisecond are capped there
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request((60_000 / requests_per_min as u64).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .expect("period and burst size are non-zero");
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));
    let trigger_limiter = Arc::new(build_limiter(config.rate_trigger_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Scheduler trigger: shared secret or admin token, checked in the handler
    cfg.service(
        web::scope("/cron").service(
            web::resource("/mark-absent")
                .wrap(trigger_limiter)
                .route(web::get().to(cron::mark_absent))
                .route(web::post().to(cron::mark_absent)),
        ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("").route(web::get().to(attendance::list_attendance)),
                    )
                    .service(
                        web::resource("/check-in").route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/check-out").route(web::put().to(attendance::check_out)),
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
                    // /leave/{id}
                    .service(web::resource("/{id}").route(web::get().to(leave_request::get_leave)))
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
                web::scope("/settings")
                    .service(
                        web::resource("/work-schedule")
                            .route(web::get().to(settings::get_work_schedule))
                            .route(web::put().to(settings::update_work_schedule)),
                    )
                    .service(
                        web::resource("/holidays")
                            .route(web::get().to(settings::list_holidays))
                            .route(web::post().to(settings::create_holiday)),
                    )
                    .service(
                        web::resource("/holidays/{id}")
                            .route(web::delete().to(settings::delete_holiday)),
                    )
                    .service(
                        web::resource("/special-days")
                            .route(web::get().to(settings::list_special_days))
                            .route(web::post().to(settings::create_special_day)),
                    )
                    .service(
                        web::resource("/special-days/{id}")
                            .route(web::delete().to(settings::delete_special_day)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token

// DAILY
//  └─ scheduler → GET /cron/mark-absent, Authorization: Bearer CRON_SECRET

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_builds_for_any_configured_rate() {
        for rate in [0, 1, 10, 1000, 60_000, 1_000_000] {
            let _ = build_limiter(rate);
        }
    }
}
