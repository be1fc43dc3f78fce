//! ccv-art - Art Resolution Service
//!
//! Answers (decade, region, art form) queries by fanning out to several
//! independent LLM sources, reconciling them by majority vote, synthesizing
//! final entries, enriching them with best-effort media lookups, and caching
//! the result in SQLite.

use anyhow::Result;
use axum::http::HeaderValue;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ccv_art::services::ArtService;
use ccv_art::AppState;
use ccv_common::config::ServiceConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting ccv-art (Art Resolution) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::load()?;

    let db_pool = ccv_art::db::init_database_pool(&config.database_path).await?;
    info!("Database: {}", config.database_path.display());

    let store = ccv_art::db::ArtCacheStore::new(db_pool);
    let art_service = Arc::new(ArtService::from_config(&config, store)?);
    let state = AppState::new(art_service);

    let app = ccv_art::build_router(state)
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("Listening on http://{}:{}", config.host, config.port);
    info!("Health check: http://{}:{}/health", config.host, config.port);

    axum::serve(listener, app).await?;

    Ok(())
}

/// CORS from configured origins; "*" allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(parsed)
}
