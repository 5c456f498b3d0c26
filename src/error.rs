use thiserror::Error;

use crate::constants::MAX_REQUEST_SIZE;

/// Reasons an incoming event is dropped before it reaches the state store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("empty topic name")]
    EmptyTopic,

    #[error("empty consumer group id")]
    EmptyGroup,

    #[error("negative partition index {0}")]
    NegativePartition(i32),

    #[error("negative offset {0}")]
    NegativeOffset(i64),

    #[error("low watermark {low} is above high watermark {high}")]
    InvalidWaterMarks { low: i64, high: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("metrics namespace must not be empty")]
    EmptyNamespace,

    #[error("invalid log level '{0}'")]
    InvalidLogLevel(String),
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read replay feed: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug)]
pub enum ServerError {
    IoError(std::io::Error),
    RequestTooLarge(usize),
    MalformedRequest(String),
    MetricsError(prometheus::Error),
}

impl From<std::io::Error> for ServerError {
    fn from(error: std::io::Error) -> Self {
        ServerError::IoError(error)
    }
}

impl From<prometheus::Error> for ServerError {
    fn from(error: prometheus::Error) -> Self {
        ServerError::MetricsError(error)
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::IoError(e) => write!(f, "IO error: {}", e),
            ServerError::RequestTooLarge(size) => {
                write!(f, "Request too large: {} bytes (max: {})", size, MAX_REQUEST_SIZE)
            }
            ServerError::MalformedRequest(reason) => write!(f, "Malformed request: {}", reason),
            ServerError::MetricsError(e) => write!(f, "Metrics error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {}
