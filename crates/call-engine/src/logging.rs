use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogConfig;
use crate::error::{CallCenterError, Result};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Calling this twice
/// returns a config error instead of panicking.
pub fn setup_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| CallCenterError::config(format!("Invalid log level {}: {}", config.level, e)))?;

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| CallCenterError::config(format!("Logging already initialised: {}", e)))
}

/// Log a welcome message with version info
pub fn log_welcome(app_name: &str, version: &str) {
    tracing::info!("🚀 Starting {} v{}", app_name, version);
}
