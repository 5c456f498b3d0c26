use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::Command;
use crate::core::state::StateReader;

/// Finds consumer groups idle for longer than the threshold and asks the
/// ingestion loop to evict them. Never mutates the store itself.
#[derive(Clone)]
pub struct ExpirySweeper {
    reader: StateReader,
    commands: mpsc::Sender<Command>,
    inactivity_threshold: chrono::Duration,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(
        reader: StateReader,
        commands: mpsc::Sender<Command>,
        inactivity_threshold: Duration,
        interval: Duration,
    ) -> Self {
        ExpirySweeper {
            reader,
            commands,
            inactivity_threshold: chrono::Duration::from_std(inactivity_threshold)
                .unwrap_or(chrono::TimeDelta::MAX),
            interval,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
            }
        }
        debug!("expiry sweeper stopped");
    }

    /// One pass over the groups. Returns how many evictions were requested.
    pub async fn sweep_once(&self) -> usize {
        let idle = self.reader.idle_groups(self.inactivity_threshold);
        let mut requested = 0;

        for (group_id, observed_activity) in idle {
            let command = Command::Evict {
                group_id,
                observed_activity,
            };
            if self.commands.send(command).await.is_err() {
                warn!("ingestion loop is gone, abandoning sweep");
                break;
            }
            requested += 1;
        }

        if requested > 0 {
            info!(groups = requested, "requested eviction of inactive consumer groups");
        }
        requested
    }
}
