//! Cache statistics endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use cas_cache::CacheStats;

use crate::state::AppState;

/// Handle GET /_cache/stats.
pub(crate) async fn get_cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.cache.stats())
}
