//! Feeds recorded events into the cache from newline-delimited JSON.
//!
//! ```text
//! {"type":"watermark","topic":"t","partition":0,"high_offset":150,"low_offset":0,"observed_at":"2024-05-01T10:00:00Z"}
//! {"type":"offset","group":"g1","topic":"t","partition":0,"offset":100,"committed_at":"2024-05-01T10:00:00Z"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::path::Path;

use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::cache::CacheInputs;
use crate::core::event::{ConsumerPartitionOffset, PartitionWaterMark};
use crate::error::ReplayError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    Offset(ConsumerPartitionOffset),
    Watermark(PartitionWaterMark),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedSummary {
    pub offsets: usize,
    pub watermarks: usize,
    pub skipped: usize,
}

pub fn parse_line(line: &str, number: usize) -> Result<Option<FeedEvent>, ReplayError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|source| ReplayError::Decode { line: number, source })
}

/// Sends every decodable line; undecodable lines are logged and skipped.
///
/// Consumes `inputs`, so the senders are dropped once the feed is exhausted.
pub async fn feed<R>(reader: R, inputs: CacheInputs) -> Result<FeedSummary, ReplayError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut summary = FeedSummary::default();
    let mut number = 0;

    while let Some(line) = lines.next_line().await? {
        number += 1;
        let event = match parse_line(&line, number) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "skipping replay line");
                summary.skipped += 1;
                continue;
            }
        };

        let sent = match event {
            FeedEvent::Offset(offset) => {
                summary.offsets += 1;
                inputs.offsets.send(offset).await.is_ok()
            }
            FeedEvent::Watermark(watermark) => {
                summary.watermarks += 1;
                inputs.watermarks.send(watermark).await.is_ok()
            }
        };
        if !sent {
            warn!(line = number, "cache stopped accepting events, ending replay");
            break;
        }
    }

    info!(
        offsets = summary.offsets,
        watermarks = summary.watermarks,
        skipped = summary.skipped,
        "replay feed finished"
    );
    Ok(summary)
}

pub async fn feed_file(path: &Path, inputs: CacheInputs) -> Result<FeedSummary, ReplayError> {
    let file = File::open(path).await?;
    info!(path = %path.display(), "replaying events");
    feed(BufReader::new(file), inputs).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_event_kinds() {
        let offset = parse_line(
            r#"{"type":"offset","group":"g1","topic":"t","partition":0,"offset":100,"committed_at":"2024-05-01T10:00:00Z"}"#,
            1,
        )
        .unwrap();
        assert!(matches!(offset, Some(FeedEvent::Offset(ref o)) if o.offset == 100 && o.group == "g1"));

        let watermark = parse_line(
            r#"{"type":"watermark","topic":"t","partition":3,"high_offset":150,"observed_at":"2024-05-01T10:00:00Z"}"#,
            2,
        )
        .unwrap();
        assert!(matches!(watermark, Some(FeedEvent::Watermark(ref w)) if w.partition == 3 && w.low_offset.is_none()));
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        assert!(parse_line("   ", 1).unwrap().is_none());
        assert!(parse_line("# recorded 2024-05-01", 2).unwrap().is_none());
    }

    #[test]
    fn reports_line_number_on_decode_failure() {
        match parse_line(r#"{"type":"offset","group":"g1"}"#, 7) {
            Err(ReplayError::Decode { line, .. }) => assert_eq!(line, 7),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
