use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::core::clock::Clock;
use crate::core::event::{ConsumerPartitionOffset, PartitionWaterMark, TopicPartition};
use crate::core::snapshot::LagSnapshot;

/// Latest watermark reported for a (topic, partition).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPartitionState {
    pub high_offset: i64,
    pub low_offset: Option<i64>,
    pub observed_at: DateTime<Utc>,
}

/// Committed position of one group on one (topic, partition).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPartitionState {
    pub offset: i64,
    pub committed_at: DateTime<Utc>,
    /// Wall-clock time of the last commit seen for this key, accepted or not.
    pub last_seen: DateTime<Utc>,
    /// Number of commits accepted for this key.
    pub commit_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerGroupEntry {
    pub partitions: HashMap<TopicPartition, GroupPartitionState>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub offsets_accepted: u64,
    pub offsets_stale: u64,
    pub watermarks_applied: u64,
    pub events_rejected: u64,
    pub groups_evicted: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetOutcome {
    Accepted,
    /// Older than what is stored; only the group's liveness was refreshed.
    Stale,
}

/// Owned copy of the store taken under one read lock.
#[derive(Debug, Clone)]
pub struct StoreCopy {
    pub watermarks: HashMap<TopicPartition, TopicPartitionState>,
    pub groups: HashMap<String, ConsumerGroupEntry>,
    pub stats: IngestStats,
}

/// Watermarks and per-group committed offsets.
///
/// Purely in-memory; every method is a map operation with no I/O.
#[derive(Debug, Default)]
pub struct StateStore {
    watermarks: HashMap<TopicPartition, TopicPartitionState>,
    groups: HashMap<String, ConsumerGroupEntry>,
    stats: IngestStats,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest arrival wins, regardless of how it compares to what was stored.
    pub fn apply_watermark(&mut self, event: &PartitionWaterMark) {
        self.watermarks.insert(
            event.key(),
            TopicPartitionState {
                high_offset: event.high_offset,
                low_offset: event.low_offset,
                observed_at: event.observed_at,
            },
        );
        self.stats.watermarks_applied += 1;
    }

    /// Stores the commit unless an entry with a newer commit timestamp exists.
    ///
    /// The group's liveness is refreshed to `now` either way.
    pub fn apply_offset(&mut self, event: &ConsumerPartitionOffset, now: DateTime<Utc>) -> OffsetOutcome {
        let group = self
            .groups
            .entry(event.group.clone())
            .or_insert_with(|| ConsumerGroupEntry {
                partitions: HashMap::new(),
                last_activity: now,
            });
        if now > group.last_activity {
            group.last_activity = now;
        }

        let outcome = match group.partitions.get_mut(&event.key()) {
            Some(current) => {
                if now > current.last_seen {
                    current.last_seen = now;
                }
                if event.committed_at < current.committed_at {
                    OffsetOutcome::Stale
                } else {
                    current.offset = event.offset;
                    current.committed_at = event.committed_at;
                    current.commit_count += 1;
                    OffsetOutcome::Accepted
                }
            }
            None => {
                group.partitions.insert(
                    event.key(),
                    GroupPartitionState {
                        offset: event.offset,
                        committed_at: event.committed_at,
                        last_seen: now,
                        commit_count: 1,
                    },
                );
                OffsetOutcome::Accepted
            }
        };

        match outcome {
            OffsetOutcome::Accepted => self.stats.offsets_accepted += 1,
            OffsetOutcome::Stale => self.stats.offsets_stale += 1,
        }
        outcome
    }

    pub fn evict_group(&mut self, group_id: &str) -> bool {
        let removed = self.groups.remove(group_id).is_some();
        if removed {
            self.stats.groups_evicted += 1;
        }
        removed
    }

    /// Evicts only if the group has seen no activity after `observed_activity`.
    pub fn evict_group_if_idle(&mut self, group_id: &str, observed_activity: DateTime<Utc>) -> bool {
        match self.groups.get(group_id) {
            Some(entry) if entry.last_activity <= observed_activity => self.evict_group(group_id),
            _ => false,
        }
    }

    pub fn record_rejected(&mut self) {
        self.stats.events_rejected += 1;
    }

    /// Groups whose last activity is older than `threshold` at `now`.
    pub fn idle_groups(&self, now: DateTime<Utc>, threshold: Duration) -> Vec<(String, DateTime<Utc>)> {
        self.groups
            .iter()
            .filter(|(_, entry)| now - entry.last_activity > threshold)
            .map(|(id, entry)| (id.clone(), entry.last_activity))
            .collect()
    }

    pub fn copy(&self) -> StoreCopy {
        StoreCopy {
            watermarks: self.watermarks.clone(),
            groups: self.groups.clone(),
            stats: self.stats,
        }
    }

    pub fn watermark(&self, key: &TopicPartition) -> Option<&TopicPartitionState> {
        self.watermarks.get(key)
    }

    pub fn group(&self, group_id: &str) -> Option<&ConsumerGroupEntry> {
        self.groups.get(group_id)
    }

    pub fn group_partition(&self, group_id: &str, key: &TopicPartition) -> Option<&GroupPartitionState> {
        self.groups.get(group_id)?.partitions.get(key)
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }
}

/// The only handle able to mutate a shared [`StateStore`]. Not `Clone`.
#[derive(Debug)]
pub struct StateWriter {
    inner: Arc<RwLock<StateStore>>,
}

/// Read-only access to a shared [`StateStore`].
#[derive(Clone)]
pub struct StateReader {
    inner: Arc<RwLock<StateStore>>,
    clock: Arc<dyn Clock>,
}

/// Splits a fresh store into its single writer and a reader.
pub fn shared_store(clock: Arc<dyn Clock>) -> (StateWriter, StateReader) {
    let inner = Arc::new(RwLock::new(StateStore::new()));
    (
        StateWriter {
            inner: Arc::clone(&inner),
        },
        StateReader { inner, clock },
    )
}

impl StateWriter {
    pub fn apply_watermark(&mut self, event: &PartitionWaterMark) {
        self.inner.write().apply_watermark(event);
    }

    pub fn apply_offset(&mut self, event: &ConsumerPartitionOffset, now: DateTime<Utc>) -> OffsetOutcome {
        self.inner.write().apply_offset(event, now)
    }

    pub fn evict_group_if_idle(&mut self, group_id: &str, observed_activity: DateTime<Utc>) -> bool {
        self.inner.write().evict_group_if_idle(group_id, observed_activity)
    }

    pub fn record_rejected(&mut self) {
        self.inner.write().record_rejected();
    }
}

impl StateReader {
    /// Copies the store under a short read lock, then computes lag outside it.
    pub fn snapshot(&self) -> LagSnapshot {
        let copy = self.inner.read().copy();
        LagSnapshot::build(copy, self.clock.now())
    }

    pub fn idle_groups(&self, threshold: Duration) -> Vec<(String, DateTime<Utc>)> {
        let now = self.clock.now();
        self.inner.read().idle_groups(now, threshold)
    }
}
