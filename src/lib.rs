//! In-memory cache of consumer group offsets and partition watermarks,
//! exposing per-partition lag as Prometheus metrics.

pub mod cache;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod exposition;
pub mod lifecycle;
pub mod network;
pub mod replay;
pub mod telemetry;

pub use crate::cache::{CacheInputs, CacheSettings, OffsetCache};
pub use crate::core::{ConsumerPartitionOffset, LagRow, LagSnapshot, PartitionWaterMark};
