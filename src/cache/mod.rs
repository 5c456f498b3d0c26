//! Channel and task wiring around the state store.
//!
//! ```text
//! watcher  ──watermarks──┐
//!                        ├──> IngestionLoop ──> StateStore <── snapshot() ── exporter
//! consumer ──offsets─────┘          ^
//!                                   └── commands ── ExpirySweeper
//! ```

mod ingest;
mod sweeper;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::constants::{
    COMMANDS_CHANNEL_SIZE, DEFAULT_GROUP_INACTIVITY_SECS, DEFAULT_OFFSETS_CHANNEL_SIZE,
    DEFAULT_SWEEP_INTERVAL_SECS, DEFAULT_WATERMARKS_CHANNEL_SIZE,
};
use crate::core::clock::Clock;
use crate::core::event::{ConsumerPartitionOffset, PartitionWaterMark};
use crate::core::snapshot::LagSnapshot;
use crate::core::state::{shared_store, StateReader};

pub use ingest::IngestionLoop;
pub use sweeper::ExpirySweeper;

/// Requests drained by the ingestion loop alongside the event streams.
#[derive(Debug)]
pub enum Command {
    /// Evict the group unless it was active after `observed_activity`.
    Evict {
        group_id: String,
        observed_activity: DateTime<Utc>,
    },
    /// Drain everything already queued on the input channels, then ack.
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub offsets_channel_size: usize,
    pub watermarks_channel_size: usize,
    pub group_inactivity: Duration,
    pub sweep_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            offsets_channel_size: DEFAULT_OFFSETS_CHANNEL_SIZE,
            watermarks_channel_size: DEFAULT_WATERMARKS_CHANNEL_SIZE,
            group_inactivity: Duration::from_secs(DEFAULT_GROUP_INACTIVITY_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

/// Producer side of the two input streams.
///
/// Dropping both senders (and all their clones) starts the graceful shutdown
/// of the ingestion loop.
#[derive(Debug, Clone)]
pub struct CacheInputs {
    pub offsets: mpsc::Sender<ConsumerPartitionOffset>,
    pub watermarks: mpsc::Sender<PartitionWaterMark>,
}

pub struct OffsetCache {
    reader: StateReader,
    sweeper: ExpirySweeper,
    commands: mpsc::Sender<Command>,
    ingest_task: JoinHandle<()>,
    sweeper_task: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl OffsetCache {
    /// Spawns the ingestion loop and the expiry sweeper on the current runtime.
    pub fn start(settings: &CacheSettings, clock: Arc<dyn Clock>) -> (OffsetCache, CacheInputs) {
        let (offsets_tx, offsets_rx) = mpsc::channel(settings.offsets_channel_size);
        let (watermarks_tx, watermarks_rx) = mpsc::channel(settings.watermarks_channel_size);
        let (commands_tx, commands_rx) = mpsc::channel(COMMANDS_CHANNEL_SIZE);

        let (writer, reader) = shared_store(Arc::clone(&clock));
        let ingest = IngestionLoop::new(offsets_rx, watermarks_rx, commands_rx, writer, clock);
        let ingest_task = tokio::spawn(ingest.run());

        let shutdown = CancellationToken::new();
        let sweeper = ExpirySweeper::new(
            reader.clone(),
            commands_tx.clone(),
            settings.group_inactivity,
            settings.sweep_interval,
        );
        let sweeper_task = tokio::spawn(sweeper.clone().run(shutdown.child_token()));

        info!(
            offsets_channel_size = settings.offsets_channel_size,
            watermarks_channel_size = settings.watermarks_channel_size,
            group_inactivity_secs = settings.group_inactivity.as_secs(),
            sweep_interval_secs = settings.sweep_interval.as_secs(),
            "offset cache started"
        );

        let cache = OffsetCache {
            reader,
            sweeper,
            commands: commands_tx,
            ingest_task,
            sweeper_task,
            shutdown,
        };
        let inputs = CacheInputs {
            offsets: offsets_tx,
            watermarks: watermarks_tx,
        };
        (cache, inputs)
    }

    /// Consistent view of the current state. Keeps working after shutdown.
    pub fn snapshot(&self) -> LagSnapshot {
        self.reader.snapshot()
    }

    pub fn reader(&self) -> StateReader {
        self.reader.clone()
    }

    /// Waits until every event already sent on either input has been applied.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Flush(ack_tx)).await.is_err() {
            return;
        }
        let _ = ack_rx.await;
    }

    /// Runs one expiry pass now instead of waiting for the next tick.
    pub async fn sweep_now(&self) -> usize {
        self.sweeper.sweep_once().await
    }

    /// Stops the sweeper and waits for the ingestion loop to drain.
    ///
    /// The loop only finishes once every [`CacheInputs`] sender is dropped.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.sweeper_task.await {
            warn!(error = %e, "expiry sweeper task failed");
        }
        if let Err(e) = self.ingest_task.await {
            warn!(error = %e, "ingestion loop task failed");
        }
        info!("offset cache stopped");
    }
}
