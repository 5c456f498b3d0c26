use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EventError;

/// (topic, partition) key shared by watermark and group state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        TopicPartition {
            topic: topic.into(),
            partition,
        }
    }
}

fn validate_key(topic: &str, partition: i32) -> Result<(), EventError> {
    if topic.is_empty() {
        return Err(EventError::EmptyTopic);
    }
    if partition < 0 {
        return Err(EventError::NegativePartition(partition));
    }
    Ok(())
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.topic, self.partition)
    }
}

/// Broker-reported boundaries of a partition, emitted by the watermark watcher.
///
/// Not monotonic: retention and compaction may move either value backwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionWaterMark {
    pub topic: String,
    pub partition: i32,
    /// Next offset to be written.
    pub high_offset: i64,
    /// Oldest retained offset, when the watcher reports it.
    #[serde(default)]
    pub low_offset: Option<i64>,
    pub observed_at: DateTime<Utc>,
}

impl PartitionWaterMark {
    pub fn key(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }

    pub fn validate(&self) -> Result<(), EventError> {
        validate_key(&self.topic, self.partition)?;
        if self.high_offset < 0 {
            return Err(EventError::NegativeOffset(self.high_offset));
        }
        match self.low_offset {
            Some(low) if low < 0 => Err(EventError::NegativeOffset(low)),
            Some(low) if low > self.high_offset => Err(EventError::InvalidWaterMarks {
                low,
                high: self.high_offset,
            }),
            _ => Ok(()),
        }
    }
}

/// One observed offset commit from the broker's internal offsets log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerPartitionOffset {
    pub group: String,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Broker-side commit time; orders commits for the same key.
    pub committed_at: DateTime<Utc>,
}

impl ConsumerPartitionOffset {
    pub fn key(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }

    pub fn validate(&self) -> Result<(), EventError> {
        if self.group.is_empty() {
            return Err(EventError::EmptyGroup);
        }
        validate_key(&self.topic, self.partition)?;
        if self.offset < 0 {
            return Err(EventError::NegativeOffset(self.offset));
        }
        Ok(())
    }
}
