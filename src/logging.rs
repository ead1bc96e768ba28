//! Logging setup.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;
use crate::error::{GantryError, Result};

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured level when set.
///
/// # Errors
///
/// Returns an error if the level is invalid or a subscriber is already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|e| {
            GantryError::internal(format!("Invalid log level '{}': {e}", settings.level))
        })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let installed = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| GantryError::internal(format!("Failed to install logger: {e}")))
}
