use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::state::{IngestStats, StoreCopy};

/// Lag of one group on one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LagRow {
    pub group: String,
    pub topic: String,
    pub partition: i32,
    pub committed_offset: i64,
    pub committed_at: DateTime<Utc>,
    pub commit_count: u64,
    pub high_water_mark: Option<i64>,
    pub low_water_mark: Option<i64>,
    /// `None` when no watermark is known for the partition.
    pub lag: Option<i64>,
    /// Committed offset lies below the oldest retained offset.
    pub below_retention: bool,
    pub group_last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionRow {
    pub topic: String,
    pub partition: i32,
    pub high_water_mark: i64,
    pub low_water_mark: Option<i64>,
    pub observed_at: DateTime<Utc>,
}

impl PartitionRow {
    pub fn message_count(&self) -> Option<i64> {
        self.low_water_mark.map(|low| self.high_water_mark - low)
    }
}

/// Point-in-time view of the cache for one metrics pass.
#[derive(Debug, Clone, Serialize)]
pub struct LagSnapshot {
    pub taken_at: DateTime<Utc>,
    pub rows: Vec<LagRow>,
    pub partitions: Vec<PartitionRow>,
    pub stats: IngestStats,
}

pub fn compute_lag(high_water_mark: Option<i64>, committed_offset: i64) -> Option<i64> {
    high_water_mark.map(|high| (high - committed_offset).max(0))
}

impl LagSnapshot {
    pub fn build(copy: StoreCopy, taken_at: DateTime<Utc>) -> Self {
        let StoreCopy {
            watermarks,
            groups,
            stats,
        } = copy;

        let mut rows = Vec::new();
        for (group_id, entry) in &groups {
            for (key, state) in &entry.partitions {
                let watermark = watermarks.get(key);
                let high = watermark.map(|w| w.high_offset);
                let low = watermark.and_then(|w| w.low_offset);

                rows.push(LagRow {
                    group: group_id.clone(),
                    topic: key.topic.clone(),
                    partition: key.partition,
                    committed_offset: state.offset,
                    committed_at: state.committed_at,
                    commit_count: state.commit_count,
                    high_water_mark: high,
                    low_water_mark: low,
                    lag: compute_lag(high, state.offset),
                    below_retention: low.map_or(false, |low| state.offset < low),
                    group_last_activity: entry.last_activity,
                });
            }
        }
        rows.sort_by(|a, b| {
            (&a.group, &a.topic, a.partition).cmp(&(&b.group, &b.topic, b.partition))
        });

        let mut partitions: Vec<PartitionRow> = watermarks
            .into_iter()
            .map(|(key, state)| PartitionRow {
                topic: key.topic,
                partition: key.partition,
                high_water_mark: state.high_offset,
                low_water_mark: state.low_offset,
                observed_at: state.observed_at,
            })
            .collect();
        partitions.sort_by(|a, b| (&a.topic, a.partition).cmp(&(&b.topic, b.partition)));

        LagSnapshot {
            taken_at,
            rows,
            partitions,
            stats,
        }
    }

    pub fn row(&self, group: &str, topic: &str, partition: i32) -> Option<&LagRow> {
        self.rows
            .iter()
            .find(|r| r.group == group && r.topic == topic && r.partition == partition)
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.rows.iter().any(|r| r.group == group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::{ConsumerPartitionOffset, PartitionWaterMark};
    use crate::core::state::StateStore;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn commit(group: &str, partition: i32, offset: i64) -> ConsumerPartitionOffset {
        ConsumerPartitionOffset {
            group: group.to_string(),
            topic: "t".to_string(),
            partition,
            offset,
            committed_at: at(10),
        }
    }

    fn watermark(partition: i32, high: i64, low: Option<i64>) -> PartitionWaterMark {
        PartitionWaterMark {
            topic: "t".to_string(),
            partition,
            high_offset: high,
            low_offset: low,
            observed_at: at(20),
        }
    }

    #[test]
    fn lag_is_clamped_at_zero() {
        assert_eq!(compute_lag(Some(150), 100), Some(50));
        assert_eq!(compute_lag(Some(90), 100), Some(0));
        assert_eq!(compute_lag(None, 100), None);
    }

    #[test]
    fn rows_join_watermarks_when_present() {
        let mut store = StateStore::new();
        store.apply_offset(&commit("g1", 0, 100), at(30));
        store.apply_offset(&commit("g1", 1, 7), at(30));
        store.apply_watermark(&watermark(0, 150, Some(10)));

        let snapshot = LagSnapshot::build(store.copy(), at(40));

        let joined = snapshot.row("g1", "t", 0).unwrap();
        assert_eq!(joined.lag, Some(50));
        assert_eq!(joined.high_water_mark, Some(150));
        assert_eq!(joined.group_last_activity, at(30));

        let unjoined = snapshot.row("g1", "t", 1).unwrap();
        assert_eq!(unjoined.lag, None);
        assert_eq!(unjoined.high_water_mark, None);
    }

    #[test]
    fn watermark_alone_produces_no_lag_row() {
        let mut store = StateStore::new();
        store.apply_watermark(&watermark(1, 500, None));

        let snapshot = LagSnapshot::build(store.copy(), at(40));
        assert!(snapshot.rows.is_empty());
        assert_eq!(snapshot.partitions.len(), 1);
        assert_eq!(snapshot.partitions[0].message_count(), None);
    }

    #[test]
    fn flags_offsets_below_retention() {
        let mut store = StateStore::new();
        store.apply_offset(&commit("g1", 0, 5), at(30));
        store.apply_watermark(&watermark(0, 100, Some(40)));

        let snapshot = LagSnapshot::build(store.copy(), at(40));
        let row = snapshot.row("g1", "t", 0).unwrap();
        assert!(row.below_retention);
        assert_eq!(row.lag, Some(95));
        assert_eq!(snapshot.partitions[0].message_count(), Some(60));
    }

    #[test]
    fn rows_are_sorted_by_key() {
        let mut store = StateStore::new();
        store.apply_offset(&commit("b", 1, 1), at(30));
        store.apply_offset(&commit("a", 2, 1), at(30));
        store.apply_offset(&commit("a", 0, 1), at(30));

        let snapshot = LagSnapshot::build(store.copy(), at(40));
        let keys: Vec<_> = snapshot
            .rows
            .iter()
            .map(|r| (r.group.as_str(), r.partition))
            .collect();
        assert_eq!(keys, vec![("a", 0), ("a", 2), ("b", 1)]);
    }
}
