use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::cache::CacheSettings;
use crate::constants::{
    DEFAULT_GROUP_INACTIVITY_SECS, DEFAULT_METRICS_NAMESPACE, DEFAULT_OFFSETS_CHANNEL_SIZE,
    DEFAULT_SWEEP_INTERVAL_SECS, DEFAULT_WATERMARKS_CHANNEL_SIZE,
};
use crate::error::ConfigError;

/// Consumer group lag exporter.
///
/// Every option can also be set through the environment variable shown.
#[derive(Debug, Clone, Parser)]
#[command(name = "lagkeeper", version, about)]
pub struct Config {
    /// Port of the metrics endpoint.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// tracing filter directive, e.g. `info` or `lagkeeper=debug`.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "OFFSETS_CHANNEL_SIZE", default_value_t = DEFAULT_OFFSETS_CHANNEL_SIZE)]
    pub offsets_channel_size: usize,

    #[arg(long, env = "WATERMARKS_CHANNEL_SIZE", default_value_t = DEFAULT_WATERMARKS_CHANNEL_SIZE)]
    pub watermarks_channel_size: usize,

    /// Seconds without a commit after which a consumer group is dropped.
    #[arg(long, env = "GROUP_INACTIVITY_SECS", default_value_t = DEFAULT_GROUP_INACTIVITY_SECS)]
    pub group_inactivity_secs: u64,

    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = DEFAULT_SWEEP_INTERVAL_SECS)]
    pub sweep_interval_secs: u64,

    #[arg(long, env = "METRICS_NAMESPACE", default_value = DEFAULT_METRICS_NAMESPACE)]
    pub metrics_namespace: String,

    /// Newline-delimited JSON events to feed into the cache.
    #[arg(long, env = "REPLAY_FILE")]
    pub replay_file: Option<PathBuf>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.offsets_channel_size == 0 {
            return Err(ConfigError::MustBePositive("offsets channel size"));
        }
        if self.watermarks_channel_size == 0 {
            return Err(ConfigError::MustBePositive("watermarks channel size"));
        }
        if self.group_inactivity_secs == 0 {
            return Err(ConfigError::MustBePositive("group inactivity threshold"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::MustBePositive("sweep interval"));
        }
        if self.metrics_namespace.trim().is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }
        Ok(())
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            offsets_channel_size: self.offsets_channel_size,
            watermarks_channel_size: self.watermarks_channel_size,
            group_inactivity: Duration::from_secs(self.group_inactivity_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }
}
