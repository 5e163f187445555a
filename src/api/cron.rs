use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{error, warn};

use crate::{
    auth::auth::{AuthUser, bearer_token},
    config::Config,
    error::ApiError,
    jobs::mark_absent::{MarkAbsentJob, ReconcileSummary},
};

/// The scheduler's shared secret, or an admin access token, may trigger jobs.
pub fn authorize_trigger(req: &HttpRequest, config: &Config) -> Result<(), ApiError> {
    let token = bearer_token(req).ok_or_else(|| ApiError::Unauthorized("Unauthorized".into()))?;

    if let Some(secret) = config.cron_secret.as_deref() {
        if bool::from(token.as_bytes().ct_eq(secret.as_bytes())) {
            return Ok(());
        }
    }

    match AuthUser::from_token(token, &config.jwt_secret) {
        Ok(user) => user.require_admin(),
        Err(_) => Err(ApiError::Unauthorized("Unauthorized".into())),
    }
}

/// Daily attendance reconciliation, called by an external scheduler
#[utoipa::path(
    post,
    path = "/cron/mark-absent",
    responses(
        (status = 200, description = "Reconciliation summary", body = ReconcileSummary),
        (status = 401, description = "Missing or invalid trigger credentials"),
        (status = 403, description = "Token is not an admin token"),
        (status = 500, description = "Store failure", body = Object, example = json!({
            "message": "Failed to mark absent users"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Jobs"
)]
pub async fn mark_absent(
    req: HttpRequest,
    config: web::Data<Config>,
    job: web::Data<MarkAbsentJob>,
) -> Result<HttpResponse, ApiError> {
    if let Err(e) = authorize_trigger(&req, &config) {
        warn!(peer = ?req.peer_addr(), "Rejected mark-absent trigger");
        return Err(e);
    }

    match job.run(Utc::now()).await {
        Ok(summary) => Ok(HttpResponse::Ok().json(summary)),
        Err(e) => {
            error!(error = %e, "Mark-absent job failed");
            Ok(HttpResponse::InternalServerError().json(json!({
                "success": false,
                "message": "Failed to mark absent users"
            })))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_access_token;
    use crate::model::role::Role;
    use crate::store::memory::MemoryStore;
    use crate::store::ReconcileStore;
    use actix_web::{App, http::StatusCode, test as actix_test};
    use chrono::FixedOffset;
    use std::sync::Arc;

    fn job(store: Arc<MemoryStore>) -> web::Data<MarkAbsentJob> {
        let store: Arc<dyn ReconcileStore> = store;
        web::Data::new(MarkAbsentJob::new(store, FixedOffset::east_opt(0).unwrap()))
    }

    fn today_start() -> chrono::DateTime<Utc> {
        crate::calendar::DayWindow::containing(Utc::now(), FixedOffset::east_opt(0).unwrap())
            .unwrap()
            .start
    }

    fn token(role: Role) -> String {
        generate_access_token(1, "someone", role.id(), &Config::for_tests().jwt_secret, 60).unwrap()
    }

    fn request(bearer: Option<&str>) -> HttpRequest {
        let mut req = actix_test::TestRequest::default();
        if let Some(bearer) = bearer {
            req = req.insert_header(("Authorization", format!("Bearer {bearer}")));
        }
        req.to_http_request()
    }

    #[test]
    fn trigger_accepts_secret_or_admin_token() {
        let config = Config::for_tests();

        assert!(authorize_trigger(&request(Some("cron-secret")), &config).is_ok());
        assert!(authorize_trigger(&request(Some(&token(Role::Admin))), &config).is_ok());

        assert!(matches!(
            authorize_trigger(&request(Some(&token(Role::Hr))), &config),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            authorize_trigger(&request(Some("cron-secre")), &config),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(authorize_trigger(&request(None), &config).is_err());
    }

    #[test]
    fn without_configured_secret_only_admins_trigger() {
        let config = Config {
            cron_secret: None,
            ..Config::for_tests()
        };
        assert!(authorize_trigger(&request(Some("cron-secret")), &config).is_err());
        assert!(authorize_trigger(&request(Some(&token(Role::Admin))), &config).is_ok());
    }

    #[actix_web::test]
    async fn endpoint_returns_summary() {
        // a special working day today makes any weekday a working day
        let store = Arc::new(
            MemoryStore::new()
                .with_user(1, "Alice")
                .with_special_day(today_start()),
        );
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(Config::for_tests()))
                .app_data(job(store.clone()))
                .service(
                    web::resource("/cron/mark-absent")
                        .route(web::get().to(mark_absent))
                        .route(web::post().to(mark_absent)),
                ),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/cron/mark-absent")
            .insert_header(("Authorization", "Bearer cron-secret"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["isWorkingDay"], true);
        assert_eq!(body["markedAbsent"], 1);
        assert_eq!(body["markedLeave"], 0);
        assert_eq!(body["absentUsers"][0]["id"], 1);
        assert_eq!(body["absentUsers"][0]["name"], "Alice");
        assert_eq!(body["leaveUsers"], serde_json::json!([]));

        let written = store.attendance();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].user_id, 1);
        assert_eq!(written[0].status, crate::model::attendance::AttendanceStatus::Absent);
    }

    #[actix_web::test]
    async fn endpoint_rejects_missing_credentials() {
        let store = Arc::new(MemoryStore::new().with_user(1, "Alice"));
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(Config::for_tests()))
                .app_data(job(store.clone()))
                .route("/cron/mark-absent", web::get().to(mark_absent)),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/cron/mark-absent").to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(store.insert_calls(), 0);
    }

    #[actix_web::test]
    async fn store_failure_is_a_generic_500() {
        // a special working day today guarantees the write path on any weekday
        let store = Arc::new(
            MemoryStore::new()
                .with_user(1, "Alice")
                .with_special_day(today_start())
                .failing_inserts(),
        );
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(Config::for_tests()))
                .app_data(job(store))
                .route("/cron/mark-absent", web::get().to(mark_absent)),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/cron/mark-absent")
            .insert_header(("Authorization", "Bearer cron-secret"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["message"], "Failed to mark absent users");
    }
}
