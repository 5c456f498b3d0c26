use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::cache::Command;
use crate::core::clock::Clock;
use crate::core::event::{ConsumerPartitionOffset, PartitionWaterMark};
use crate::core::state::{OffsetOutcome, StateWriter};

/// Sole mutator of the state store.
///
/// Services both input channels with no priority between them, plus the
/// command channel used by the sweeper and flush barriers. Exits once both
/// input channels are closed and drained.
pub struct IngestionLoop {
    offsets: mpsc::Receiver<ConsumerPartitionOffset>,
    watermarks: mpsc::Receiver<PartitionWaterMark>,
    commands: mpsc::Receiver<Command>,
    writer: StateWriter,
    clock: Arc<dyn Clock>,
    offsets_open: bool,
    watermarks_open: bool,
}

impl IngestionLoop {
    pub fn new(
        offsets: mpsc::Receiver<ConsumerPartitionOffset>,
        watermarks: mpsc::Receiver<PartitionWaterMark>,
        commands: mpsc::Receiver<Command>,
        writer: StateWriter,
        clock: Arc<dyn Clock>,
    ) -> Self {
        IngestionLoop {
            offsets,
            watermarks,
            commands,
            writer,
            clock,
            offsets_open: true,
            watermarks_open: true,
        }
    }

    pub async fn run(mut self) {
        info!("ingestion loop started");

        while self.offsets_open || self.watermarks_open {
            tokio::select! {
                maybe = self.offsets.recv(), if self.offsets_open => match maybe {
                    Some(event) => self.on_offset(event),
                    None => {
                        info!("offset channel closed");
                        self.offsets_open = false;
                    }
                },
                maybe = self.watermarks.recv(), if self.watermarks_open => match maybe {
                    Some(event) => self.on_watermark(event),
                    None => {
                        info!("watermark channel closed");
                        self.watermarks_open = false;
                    }
                },
                Some(command) = self.commands.recv() => self.on_command(command),
            }
        }

        // evictions or flushes that raced the closing producers
        while let Ok(command) = self.commands.try_recv() {
            self.on_command(command);
        }

        info!("ingestion loop stopped");
    }

    fn on_offset(&mut self, event: ConsumerPartitionOffset) {
        if let Err(e) = event.validate() {
            warn!(
                group = %event.group,
                topic = %event.topic,
                partition = event.partition,
                error = %e,
                "dropping malformed offset commit"
            );
            self.writer.record_rejected();
            return;
        }

        let now = self.clock.now();
        if self.writer.apply_offset(&event, now) == OffsetOutcome::Stale {
            debug!(
                group = %event.group,
                topic = %event.topic,
                partition = event.partition,
                committed_at = %event.committed_at,
                "discarding stale offset commit"
            );
        }
    }

    fn on_watermark(&mut self, event: PartitionWaterMark) {
        if let Err(e) = event.validate() {
            warn!(
                topic = %event.topic,
                partition = event.partition,
                error = %e,
                "dropping malformed watermark"
            );
            self.writer.record_rejected();
            return;
        }
        self.writer.apply_watermark(&event);
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Evict {
                group_id,
                observed_activity,
            } => {
                if self.writer.evict_group_if_idle(&group_id, observed_activity) {
                    info!(group = %group_id, last_activity = %observed_activity, "evicted inactive consumer group");
                } else {
                    debug!(group = %group_id, "skipping eviction, group active again or already gone");
                }
            }
            Command::Flush(ack) => {
                self.drain_pending();
                let _ = ack.send(());
            }
        }
    }

    fn drain_pending(&mut self) {
        while self.offsets_open {
            match self.offsets.try_recv() {
                Ok(event) => self.on_offset(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("offset channel closed");
                    self.offsets_open = false;
                }
            }
        }
        while self.watermarks_open {
            match self.watermarks.try_recv() {
                Ok(event) => self.on_watermark(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("watermark channel closed");
                    self.watermarks_open = false;
                }
            }
        }
    }
}
