//! Serving policy reload.
//!
//! The config file is re-read on SIGHUP and the new `[assets]` policy is
//! swapped into the running handler. Command-line overrides are applied
//! again on every reload.

use std::path::PathBuf;
use std::sync::Arc;

use cas_config::{CliSettings, Config, ConfigError, SharedPolicy};

/// Where a reloaded policy comes from.
#[derive(Clone, Debug)]
pub struct PolicyReload {
    /// Config file to re-read.
    pub config_path: PathBuf,
    /// Overrides applied on top of the file.
    pub cli_settings: CliSettings,
}

impl PolicyReload {
    /// Re-read the config file and install its serving policy.
    ///
    /// On error the current policy stays in place.
    pub fn apply(&self, policy: &SharedPolicy) -> Result<(), ConfigError> {
        let config = Config::load(Some(&self.config_path), Some(&self.cli_settings))?;
        policy.replace(config.serving_policy());
        Ok(())
    }
}

/// Reload the serving policy on every SIGHUP until the process exits.
#[cfg(unix)]
pub(crate) fn spawn_on_hangup(policy: Arc<SharedPolicy>, reload: PolicyReload) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(hangups) => hangups,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGHUP handler, policy reload disabled");
            return;
        }
    };

    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            match reload.apply(&policy) {
                Ok(()) => tracing::info!(
                    path = %reload.config_path.display(),
                    "Reloaded serving policy"
                ),
                Err(e) => tracing::error!(
                    error = %e,
                    path = %reload.config_path.display(),
                    "Failed to reload serving policy, keeping the current one"
                ),
            }
        }
    });
}

#[cfg(not(unix))]
pub(crate) fn spawn_on_hangup(_policy: Arc<SharedPolicy>, _reload: PolicyReload) {
    tracing::debug!("Policy reload is only available on unix");
}
