#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the restaurant inspection map.
//!
//! Every request is answered live: filters are turned into a SoQL query,
//! rows are fetched from the upstream Socrata dataset, grouped into
//! restaurants, and optionally aggregated. Nothing is cached.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use inspection_map_source::InspectionSource;
use inspection_map_source::dataset::DatasetDefinition;
use inspection_map_source::socrata::SocrataClient;

/// Shared application state.
pub struct AppState {
    /// Where inspection rows come from.
    pub source: Arc<dyn InspectionSource>,
    /// Dataset metadata and query defaults.
    pub dataset: DatasetDefinition,
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(web::QueryConfig::default().error_handler(handlers::query_error))
            .route("/health", web::get().to(handlers::health))
            .route("/restaurants", web::get().to(handlers::restaurants))
            .route("/restaurants/{camis}", web::get().to(handlers::restaurant))
            .route("/trends", web::get().to(handlers::trends))
            .route("/stats", web::get().to(handlers::stats))
            .route("/datasets", web::get().to(handlers::datasets)),
    );
}

/// Starts the inspection map API server.
///
/// Builds a [`SocrataClient`] from the environment (`SOCRATA_API_URL`,
/// `SOCRATA_APP_TOKEN`) and serves on `BIND_ADDR:PORT`
/// (default `127.0.0.1:8080`). The caller provides the async runtime.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the dataset configuration is
/// invalid, the HTTP server fails to bind, or it hits a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    let _ = pretty_env_logger::try_init_custom_env("RUST_LOG");

    let client = SocrataClient::from_env().map_err(std::io::Error::other)?;
    let dataset = client.dataset().clone();
    log::info!("Serving dataset {} from {}", dataset.id, dataset.api_url);

    let state = web::Data::new(AppState {
        source: Arc::new(client),
        dataset,
    });

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
