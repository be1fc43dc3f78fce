//! ccv-art library interface
//!
//! Exposes the resolution pipeline and router for the binary and for
//! integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::services::ArtService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// The resolution orchestrator
    pub art_service: Arc<ArtService>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(art_service: Arc<ArtService>) -> Self {
        Self {
            art_service,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::art_routes())
        .merge(api::health_routes())
        .with_state(state)
}
