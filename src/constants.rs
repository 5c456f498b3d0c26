use std::time::Duration;

// channel bounds, matching what a single cluster's commit rate usually needs
pub const DEFAULT_OFFSETS_CHANNEL_SIZE: usize = 1000;
pub const DEFAULT_WATERMARKS_CHANNEL_SIZE: usize = 200;

// commands are rare (evictions, flush barriers)
pub const COMMANDS_CHANNEL_SIZE: usize = 256;

pub const DEFAULT_GROUP_INACTIVITY_SECS: u64 = 600;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

pub const DEFAULT_METRICS_NAMESPACE: &str = "lagkeeper";

// upper bound on request line + headers for the metrics endpoint
pub const MAX_REQUEST_SIZE: usize = 8 * 1024;

pub const METRICS_PATH: &str = "/metrics";
pub const HEALTHCHECK_PATH: &str = "/healthcheck";

// pause after a failed accept (fd exhaustion, aborted handshakes) before retrying
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);
