//! `cas serve` command implementation.

use std::path::PathBuf;

use cas_config::{CliSettings, Config};
use cas_server::{ServerConfig, run_server, server_config_from_config};
use clap::Args;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover cas.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Asset storage root (overrides config).
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Seconds CDNs and browsers may cache unlocked assets (overrides config).
    #[arg(long)]
    ttl: Option<u32>,

    /// Enable verbose output (request-level logs).
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable the in-memory asset cache (default: enabled).
    #[arg(long)]
    cache: Option<bool>,

    /// Disable the in-memory asset cache.
    #[arg(long, conflicts_with = "cache")]
    no_cache: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = self.cli_settings();
        tracing::debug!(?cli_settings, "Applying command-line overrides");
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        if let Some(path) = &config.config_path {
            output.info(&format!("Config: {}", path.display()));
        }
        output.info(&format!(
            "Starting server on {}:{}",
            config.server.host, config.server.port
        ));
        output.info(&format!(
            "Storage root: {}",
            config.storage_resolved.root.display()
        ));
        if !config.storage_resolved.root.is_dir() {
            output.warning("Storage root does not exist yet; every asset will be 404");
        }

        if config.cache.enabled {
            output.info(&format!("Cache: {} entries", config.cache.capacity));
        } else {
            output.info("Cache: disabled");
        }

        match config.assets.cache_ttl_seconds {
            0 => output.info("CDN caching: disabled (cache_ttl_seconds = 0)"),
            ttl => output.info(&format!("CDN caching: {ttl}s")),
        }

        if config.config_path.is_some() {
            output.info("Send SIGHUP to reload [assets] settings");
        }

        let server_config = server_config(&config, cli_settings);
        run_server(server_config)
            .await
            .map_err(|e| CliError::Server(e.to_string()))?;

        Ok(())
    }

    fn cli_settings(&self) -> CliSettings {
        CliSettings {
            host: self.host.clone(),
            port: self.port,
            storage_root: self.root.clone(),
            cache_enabled: self.resolve_cache_enabled(),
            cache_ttl_seconds: self.ttl,
        }
    }

    /// Resolve `cache_enabled` from --cache/--no-cache flags.
    fn resolve_cache_enabled(&self) -> Option<bool> {
        self.no_cache.then_some(false).or(self.cache)
    }
}

/// Server config with policy reload attached when a config file was loaded.
fn server_config(config: &Config, cli_settings: CliSettings) -> ServerConfig {
    let server_config = server_config_from_config(config);
    match &config.config_path {
        Some(path) => server_config.with_policy_reload(path.clone(), cli_settings),
        None => server_config,
    }
}
