use std::sync::Arc;

use actix_files::Files;
use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use dotenvy::dotenv;

mod api;
mod attendance;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod realtime;
mod routes;
mod utils;

use attendance::{
    evidence::{EvidencePipeline, LocalEvidenceStore, load_font},
    geofence::{GeoCoordinate, GeofenceValidator},
    service::AttendanceService,
    store::MySqlAttendanceStore,
};
use config::Config;
use db::{ensure_schema, init_db};
use realtime::{
    hub::{Hub, HubHandle},
    server::EventFeedServer,
};

use crate::docs::ApiDoc;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index(hub: Data<HubHandle>) -> impl Responder {
    actix_web::HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "subscribers": hub.subscriber_count().await
    }))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
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
        .context("Failed to connect to database")?;
    ensure_schema(&pool).await.context("Failed to prepare schema")?;

    let hub = Hub::spawn(config.hub_inbox_capacity);

    // Evidence
    let evidence_store = LocalEvidenceStore::new(&config.upload_dir, &config.public_base_url);
    std::fs::create_dir_all(evidence_store.root()).with_context(|| {
        format!("Failed to create upload dir {}", config.upload_dir.display())
    })?;
    let mut pipeline = EvidencePipeline::new(evidence_store, config.max_upload_bytes);
    if config.overlay_enabled {
        match config.overlay_font_path.as_deref().map(load_font) {
            Some(Ok(font)) => pipeline = pipeline.with_overlay_font(font),
            Some(Err(e)) => warn!(error = %e, "Overlay disabled: font could not be loaded"),
            None => warn!("Overlay disabled: OVERLAY_FONT_PATH is not set"),
        }
    }

    let geofence = GeofenceValidator::new(
        GeoCoordinate::new(config.office_latitude, config.office_longitude),
        config.office_radius_meters,
    );
    info!(
        office = ?geofence.office(),
        radius_meters = geofence.radius_meters(),
        "Geofence configured"
    );

    let service = Data::new(AttendanceService::new(
        MySqlAttendanceStore::new(pool.clone()),
        pipeline,
        geofence,
        hub.clone(),
        config.evidence_store_timeout,
    ));

    // Live event feed on its own listener
    let feed = Arc::new(EventFeedServer::new(
        config.ws_addr.clone(),
        hub.clone(),
        config.jwt_secret.clone(),
        config.subscriber_queue_capacity,
    ));
    actix_web::rt::spawn(async move {
        if let Err(e) = feed.run().await {
            error!(error = %e, "Event feed stopped");
        }
    });

    let protected_limiter = routes::build_limiter(config.rate_protected_per_min)?;

    // Clone values for the closure (avoid move issues)
    let server_addr = config.server_addr.clone();
    let upload_dir = config.upload_dir.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(hub.clone()))
            .app_data(service.clone())
            .service(index)
            .service(Files::new("/uploads", upload_dir.clone()))
            // Protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, &config, protected_limiter.clone()))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
