use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

/// Installs the global JSON subscriber writing to stdout.
pub fn init(log_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(log_level)
        .map_err(|_| ConfigError::InvalidLogLevel(log_level.to_string()))?;

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .with_current_span(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}
