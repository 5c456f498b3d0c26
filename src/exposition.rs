//! Prometheus collector over the offset cache.
//!
//! Every `collect()` takes one snapshot and rebuilds the metric families from
//! it, so a scrape never mixes state from two different instants.

use std::collections::BTreeMap;

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use tracing::warn;

use crate::core::snapshot::LagSnapshot;
use crate::core::state::StateReader;

const GROUP_PARTITION_LABELS: &[&str] = &["group", "topic", "partition"];
const PARTITION_LABELS: &[&str] = &["topic", "partition"];

struct Families {
    partition_lag: IntGaugeVec,
    topic_lag: IntGaugeVec,
    committed_offset: IntGaugeVec,
    commit_count: IntCounterVec,
    last_commit: IntGaugeVec,
    below_retention: IntGaugeVec,
    group_last_activity: IntGaugeVec,
    high_water_mark: IntGaugeVec,
    low_water_mark: IntGaugeVec,
    message_count: IntGaugeVec,
    offset_commits: IntCounterVec,
    watermarks: IntCounter,
    events_rejected: IntCounter,
    groups_evicted: IntCounter,
}

impl Families {
    fn new(namespace: &str) -> prometheus::Result<Self> {
        let opts = |name: &str, help: &str| Opts::new(name, help).namespace(namespace);

        Ok(Families {
            partition_lag: IntGaugeVec::new(
                opts("group_topic_partition_lag", "Offsets between the high watermark and the group's committed offset"),
                GROUP_PARTITION_LABELS,
            )?,
            topic_lag: IntGaugeVec::new(
                opts("group_topic_lag", "Sum of known partition lags of a group on a topic"),
                &["group", "topic"],
            )?,
            committed_offset: IntGaugeVec::new(
                opts("group_topic_partition_offset", "Latest committed offset of a group on a partition"),
                GROUP_PARTITION_LABELS,
            )?,
            commit_count: IntCounterVec::new(
                opts("group_topic_partition_commit_count", "Offset commits accepted for a group on a partition"),
                GROUP_PARTITION_LABELS,
            )?,
            last_commit: IntGaugeVec::new(
                opts("group_topic_partition_last_commit", "Commit timestamp of the stored offset in unix milliseconds"),
                GROUP_PARTITION_LABELS,
            )?,
            below_retention: IntGaugeVec::new(
                opts(
                    "group_topic_partition_offset_below_retention",
                    "1 if the committed offset is below the partition's low watermark",
                ),
                GROUP_PARTITION_LABELS,
            )?,
            group_last_activity: IntGaugeVec::new(
                opts(
                    "group_last_activity_seconds",
                    "Wall-clock time a commit was last seen for the group, in unix seconds",
                ),
                &["group"],
            )?,
            high_water_mark: IntGaugeVec::new(
                opts("topic_partition_high_water_mark", "Next offset to be written to the partition"),
                PARTITION_LABELS,
            )?,
            low_water_mark: IntGaugeVec::new(
                opts("topic_partition_low_water_mark", "Oldest offset still retained in the partition"),
                PARTITION_LABELS,
            )?,
            message_count: IntGaugeVec::new(
                opts("topic_partition_message_count", "Messages retained in the partition"),
                PARTITION_LABELS,
            )?,
            offset_commits: IntCounterVec::new(
                opts("internal_offset_commits_total", "Offset commits processed by the cache"),
                &["outcome"],
            )?,
            watermarks: IntCounter::with_opts(opts(
                "internal_watermarks_total",
                "Partition watermarks applied by the cache",
            ))?,
            events_rejected: IntCounter::with_opts(opts(
                "internal_events_rejected_total",
                "Malformed events dropped before reaching the cache",
            ))?,
            groups_evicted: IntCounter::with_opts(opts(
                "internal_groups_evicted_total",
                "Consumer groups evicted for inactivity",
            ))?,
        })
    }

    fn collectors(&self) -> [&dyn Collector; 14] {
        [
            &self.partition_lag,
            &self.topic_lag,
            &self.committed_offset,
            &self.commit_count,
            &self.last_commit,
            &self.below_retention,
            &self.group_last_activity,
            &self.high_water_mark,
            &self.low_water_mark,
            &self.message_count,
            &self.offset_commits,
            &self.watermarks,
            &self.events_rejected,
            &self.groups_evicted,
        ]
    }

    /// Unknown lags produce no sample and are left out of the topic sums.
    fn observe(&self, snapshot: &LagSnapshot) {
        let mut topic_lag: BTreeMap<(&str, &str), i64> = BTreeMap::new();

        for row in &snapshot.rows {
            let partition = row.partition.to_string();
            let labels = [row.group.as_str(), row.topic.as_str(), partition.as_str()];

            if let Some(lag) = row.lag {
                self.partition_lag.with_label_values(&labels).set(lag);
                *topic_lag.entry((row.group.as_str(), row.topic.as_str())).or_insert(0) += lag;
            }
            self.committed_offset.with_label_values(&labels).set(row.committed_offset);
            self.commit_count.with_label_values(&labels).inc_by(row.commit_count);
            self.last_commit
                .with_label_values(&labels)
                .set(row.committed_at.timestamp_millis());
            if row.low_water_mark.is_some() {
                self.below_retention
                    .with_label_values(&labels)
                    .set(i64::from(row.below_retention));
            }
            self.group_last_activity
                .with_label_values(&[row.group.as_str()])
                .set(row.group_last_activity.timestamp());
        }

        for ((group, topic), lag) in topic_lag {
            self.topic_lag.with_label_values(&[group, topic]).set(lag);
        }

        for p in &snapshot.partitions {
            let partition = p.partition.to_string();
            let labels = [p.topic.as_str(), partition.as_str()];

            self.high_water_mark.with_label_values(&labels).set(p.high_water_mark);
            if let Some(low) = p.low_water_mark {
                self.low_water_mark.with_label_values(&labels).set(low);
            }
            if let Some(count) = p.message_count() {
                self.message_count.with_label_values(&labels).set(count);
            }
        }

        let stats = &snapshot.stats;
        self.offset_commits.with_label_values(&["accepted"]).inc_by(stats.offsets_accepted);
        self.offset_commits.with_label_values(&["stale"]).inc_by(stats.offsets_stale);
        self.watermarks.inc_by(stats.watermarks_applied);
        self.events_rejected.inc_by(stats.events_rejected);
        self.groups_evicted.inc_by(stats.groups_evicted);
    }
}

/// Reads a fresh snapshot of the cache on every scrape.
pub struct LagCollector {
    reader: StateReader,
    namespace: String,
    // registered descriptors; samples come from a fresh set per collect
    template: Families,
}

impl LagCollector {
    pub fn new(reader: StateReader, namespace: &str) -> prometheus::Result<Self> {
        Ok(LagCollector {
            reader,
            namespace: namespace.to_string(),
            template: Families::new(namespace)?,
        })
    }
}

impl Collector for LagCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.template
            .collectors()
            .into_iter()
            .flat_map(|c| c.desc())
            .collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let families = match Families::new(&self.namespace) {
            Ok(families) => families,
            Err(e) => {
                warn!(error = %e, "failed to build metric families");
                return Vec::new();
            }
        };
        families.observe(&self.reader.snapshot());

        families
            .collectors()
            .into_iter()
            .flat_map(|c| c.collect())
            .collect()
    }
}

/// Registry holding the cache collector under `namespace`.
pub fn registry(reader: StateReader, namespace: &str) -> prometheus::Result<Registry> {
    let registry = Registry::new();
    registry.register(Box::new(LagCollector::new(reader, namespace)?))?;
    Ok(registry)
}

pub fn encode(registry: &Registry) -> prometheus::Result<String> {
    let mut buffer = String::new();
    TextEncoder::new().encode_utf8(&registry.gather(), &mut buffer)?;
    Ok(buffer)
}
