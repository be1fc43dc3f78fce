//! Art resolution endpoints
//!
//! Inputs are sanitized at this boundary (trim, length cap, control-character
//! strip); the core treats the sanitized values as opaque identifiers.

use axum::{
    extract::{Query, State},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use ccv_common::sanitize::validate_query;

use crate::error::{ApiError, ApiResult};
use crate::models::{ArtDataResponse, ArtKey};
use crate::AppState;

/// Query parameters for the art endpoints
#[derive(Debug, Deserialize)]
pub struct ArtQuery {
    pub decade: String,
    pub region: String,
    #[serde(rename = "artForm")]
    pub art_form: String,
}

impl ArtQuery {
    fn into_key(self) -> ApiResult<ArtKey> {
        let (decade, region, art_form) = validate_query(&self.decade, &self.region, &self.art_form)
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        Ok(ArtKey::new(decade, region, art_form))
    }
}

/// GET /api/art?decade=&region=&artForm=
///
/// Resolve art data for a key: served from cache or computed through the
/// full pipeline. `found` is false only when resolution failed terminally.
pub async fn get_art(
    State(state): State<AppState>,
    Query(query): Query<ArtQuery>,
) -> ApiResult<Json<ArtDataResponse>> {
    let key = query.into_key()?;
    let data = state.art_service.resolve(&key).await;
    let found = data.is_some();

    Ok(Json(ArtDataResponse { data, found }))
}

/// Response for a single invalidation
#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub deleted: bool,
}

/// DELETE /api/art?decade=&region=&artForm=
pub async fn invalidate_art(
    State(state): State<AppState>,
    Query(query): Query<ArtQuery>,
) -> ApiResult<Json<InvalidateResponse>> {
    let key = query.into_key()?;
    let deleted = state.art_service.invalidate(&key).await;
    info!(key = %key, deleted, "Cache invalidation requested");

    Ok(Json(InvalidateResponse { deleted }))
}

/// Response for a full cache clear
#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    #[serde(rename = "deletedCount")]
    pub deleted_count: i64,
}

/// DELETE /api/art/cache
pub async fn clear_art_cache(State(state): State<AppState>) -> Json<ClearCacheResponse> {
    let deleted_count = state.art_service.clear_cache().await;
    info!(deleted_count, "Cache cleared");

    Json(ClearCacheResponse { deleted_count })
}

/// Build art resolution routes
pub fn art_routes() -> Router<AppState> {
    Router::new()
        .route("/api/art", get(get_art).delete(invalidate_art))
        .route("/api/art/cache", delete(clear_art_cache))
}
