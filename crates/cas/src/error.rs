//! CLI error types.

use cas_config::ConfigError;
use cas_key::KeyError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Key(#[from] KeyError),

    #[error("{0}")]
    Server(String),
}
