//! Application state.
//!
//! Shared state for all request handlers.

use std::sync::Arc;

use cas_cache::AssetCache;

use crate::asset_handler::AssetHandler;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Asset request handler.
    pub(crate) handler: AssetHandler,
    /// Cache the handler reads through, for stats reporting.
    pub(crate) cache: Arc<dyn AssetCache>,
}
