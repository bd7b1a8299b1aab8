//! HTTP server for course static assets.
//!
//! This crate serves files uploaded to courses (images, PDFs, thumbnails)
//! over axum:
//! - Legacy, canonical and versioned asset URLs
//! - Access control for locked assets
//! - Conditional GET and single byte ranges
//! - An in-process LRU cache of small assets
//!
//! The serving logic lives in [`AssetHandler`], which has no dependency on
//! the router; [`run_server`] wires it to the filesystem backend and axum.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::path::PathBuf;
//! use cas_server::{ServerConfig, run_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig {
//!         storage_root: PathBuf::from("assets"),
//!         ..ServerConfig::default()
//!     };
//!
//!     run_server(config).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Client/CDN ──HTTP──► axum router (cas-server)
//!                        │
//!                        ├─► asset middleware ──► AssetHandler
//!                        │                          ├─► AssetCache (LRU)
//!                        │                          ├─► AssetBackend (fs)
//!                        │                          └─► AccessGate
//!                        │
//!                        └─► /healthz, /_cache/stats
//! ```

mod access;
mod app;
mod asset_handler;
mod clock;
mod error;
mod handlers;
mod middleware;
mod range;
mod reload;
mod response;
mod state;

pub use access::{Access, AccessGate, Principal};
pub use asset_handler::{AssetHandler, AssetRequest, HandlerError};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::ServerError;
pub use range::{RangeResolution, resolve as resolve_range};
pub use reload::PolicyReload;
pub use response::{AssetResponse, HTTP_DATE_FORMAT, ResponseBody, http_date};

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use cas_cache::{AssetCache, LruAssetCache, NullAssetCache};
use cas_config::{CliSettings, ServingPolicy, SharedPolicy};
use cas_storage::FsBackend;
use state::AppState;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Root directory of the filesystem backend.
    pub storage_root: PathBuf,
    /// LRU capacity in entries (`None` disables caching).
    pub cache_capacity: Option<NonZeroUsize>,
    /// Serving policy at startup.
    pub policy: ServingPolicy,
    /// Source of policy reloads on SIGHUP.
    pub policy_reload: Option<PolicyReload>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8089,
            storage_root: PathBuf::from("assets"),
            cache_capacity: Some(cas_cache::DEFAULT_CAPACITY),
            policy: ServingPolicy::default(),
            policy_reload: None,
        }
    }
}

impl ServerConfig {
    /// Reload the serving policy from `config_path` on SIGHUP.
    ///
    /// `cli_settings` are applied again on every reload.
    #[must_use]
    pub fn with_policy_reload(mut self, config_path: PathBuf, cli_settings: CliSettings) -> Self {
        self.policy_reload = Some(PolicyReload {
            config_path,
            cli_settings,
        });
        self
    }
}

/// Run the server.
///
/// # Errors
///
/// Returns an error if the address is invalid or the listener fails.
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let backend = Arc::new(FsBackend::new(config.storage_root.clone()));

    let cache: Arc<dyn AssetCache> = match config.cache_capacity {
        Some(capacity) => Arc::new(LruAssetCache::new(capacity)),
        None => Arc::new(NullAssetCache),
    };

    let policy = Arc::new(SharedPolicy::new(config.policy.clone()));
    if let Some(source) = config.policy_reload.clone() {
        reload::spawn_on_hangup(Arc::clone(&policy), source);
    }

    let handler = AssetHandler::new(
        Arc::clone(&cache),
        backend,
        policy,
        Arc::new(SystemClock),
        AccessGate,
    );
    let state = Arc::new(AppState { handler, cache });

    let app = app::create_router(state);

    let addr = SocketAddr::from_str(&format!("{}:{}", config.host, config.port))?;
    tracing::info!(
        address = %addr,
        root = %config.storage_root.display(),
        cache_capacity = config.cache_capacity.map(NonZeroUsize::get),
        cache_ttl_seconds = config.policy.cache_ttl_seconds,
        "Starting server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}

/// Create server configuration from the loaded config file.
#[must_use]
pub fn server_config_from_config(config: &cas_config::Config) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        storage_root: config.storage_resolved.root.clone(),
        cache_capacity: if config.cache.enabled {
            config.cache.capacity()
        } else {
            None
        },
        policy: config.serving_policy(),
        policy_reload: None,
    }
}
