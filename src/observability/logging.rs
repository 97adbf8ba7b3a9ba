//! # Logging
//!
//! Installs the global `tracing` subscriber. `RUST_LOG` takes precedence
//! over the `LOG_LEVEL` setting.

use crate::config::{LogFormat, OperatorSettings};
use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, falling back to `default_level`
pub fn env_filter(default_level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("Failed to initialize log filter: {e}"))
}

/// Initialize the tracing subscriber in the configured format
pub fn init_logging(settings: &OperatorSettings) -> Result<()> {
    let filter = env_filter(&settings.log_level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = match settings.log_format()? {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    result.map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))
}
