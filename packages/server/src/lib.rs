#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the traffic reporter.
//!
//! Exposes report submission, lookup, removal, and map queries over a
//! JSON REST API under `/api`. All storage work goes through a single
//! [`ReportService`], which owns the `DuckDB` connection.

mod handlers;

use std::path::PathBuf;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use traffic_reporter_database::{causes, db};
use traffic_reporter_service::ReportService;

/// Shared application state.
pub struct AppState {
    /// Report operations over the shared store.
    pub service: ReportService,
}

/// Registers the `/api` routes.
///
/// Callers must register a `web::Data<AppState>` on the same app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/causes", web::get().to(handlers::causes))
            .route("/report", web::post().to(handlers::add_report))
            .route("/report", web::get().to(handlers::list_reports))
            .route("/report/{id}", web::get().to(handlers::get_report))
            .route("/report/{id}", web::delete().to(handlers::remove_report)),
    );
}

/// Starts the traffic reporter API server.
///
/// Opens the database named by `DATABASE_PATH`, loads the cause table from
/// `CAUSE_CONFIG` (or the built-in defaults), and serves on
/// `BIND_ADDR:PORT`. The caller provides the async runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Error` if the store cannot be opened, the cause
/// configuration is invalid, or the HTTP server fails to bind or run.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    log::info!("Opening report database...");
    let conn = db::open_from_env().map_err(std::io::Error::other)?;

    let cause_config_path = std::env::var("CAUSE_CONFIG").ok().map(PathBuf::from);
    let cause_config =
        causes::load_cause_config(cause_config_path.as_deref()).map_err(std::io::Error::other)?;
    log::info!("Loaded {} cause definitions", cause_config.len());

    let service = ReportService::new(conn, &cause_config).map_err(std::io::Error::other)?;
    let state = web::Data::new(AppState { service });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
