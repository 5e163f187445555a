use std::sync::Arc;
use std::time::Duration;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;

mod api;
mod auth;
mod calendar;
mod config;
mod db;
mod docs;
mod error;
mod jobs;
mod model;
mod models;
mod routes;
mod store;
mod utils;

use config::Config;
use db::{init_db, run_migrations};

use crate::docs::ApiDoc;
use crate::jobs::mark_absent::MarkAbsentJob;
use crate::store::{ReconcileStore, mysql::MySqlStore};
use crate::utils::activity::ActivityTracker;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "HR attendance service"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url)
        .await
        .context("failed to connect to database")?;

    if config.run_migrations {
        run_migrations(&pool).await.context("failed to run migrations")?;
    }

    auth::handlers::ensure_bootstrap_admin(&pool, &config).await?;

    let store: Arc<dyn ReconcileStore> = Arc::new(MySqlStore::new(pool.clone()));
    let job = Data::new(MarkAbsentJob::new(store, config.utc_offset));
    let activity = Data::new(ActivityTracker::new(Duration::from_secs(
        config.activity_debounce_secs,
    )));

    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        let config_data = config.clone();
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(job.clone())
            .app_data(activity.clone())
            .service(index)
            // auth, trigger and protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
