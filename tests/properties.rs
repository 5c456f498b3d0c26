use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use lagkeeper::core::{StateStore, TopicPartition};
use lagkeeper::{ConsumerPartitionOffset, LagSnapshot, PartitionWaterMark};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn commit(offset: i64, committed_at: i64) -> ConsumerPartitionOffset {
    ConsumerPartitionOffset {
        group: "g".to_string(),
        topic: "t".to_string(),
        partition: 0,
        offset,
        committed_at: at(committed_at),
    }
}

proptest! {
    #[test]
    fn stored_offset_comes_from_newest_commit(
        commits in prop::collection::vec((0i64..10_000, 0i64..50), 1..64)
    ) {
        let mut store = StateStore::new();
        for (i, (offset, ts)) in commits.iter().enumerate() {
            store.apply_offset(&commit(*offset, *ts), at(1_000 + i as i64));
        }

        let newest = commits.iter().map(|(_, ts)| *ts).max().unwrap();
        // ties go to the last arrival among the newest commits
        let expected = commits.iter().rev().find(|(_, ts)| *ts == newest).map(|(o, _)| *o).unwrap();

        let state = store.group_partition("g", &TopicPartition::new("t", 0)).unwrap();
        prop_assert_eq!(state.offset, expected);
        prop_assert_eq!(state.committed_at, at(newest));
    }

    #[test]
    fn stored_watermark_is_last_arrival(highs in prop::collection::vec(0i64..1_000_000, 1..64)) {
        let mut store = StateStore::new();
        for high in &highs {
            store.apply_watermark(&PartitionWaterMark {
                topic: "t".to_string(),
                partition: 0,
                high_offset: *high,
                low_offset: None,
                observed_at: at(0),
            });
        }
        let state = store.watermark(&TopicPartition::new("t", 0)).unwrap();
        prop_assert_eq!(state.high_offset, *highs.last().unwrap());
    }

    #[test]
    fn lag_is_non_negative_or_unknown(
        offset in 0i64..1_000_000,
        high in prop::option::of(0i64..1_000_000),
    ) {
        let mut store = StateStore::new();
        store.apply_offset(&commit(offset, 1), at(1));
        if let Some(high) = high {
            store.apply_watermark(&PartitionWaterMark {
                topic: "t".to_string(),
                partition: 0,
                high_offset: high,
                low_offset: None,
                observed_at: at(0),
            });
        }

        let snapshot = LagSnapshot::build(store.copy(), at(2));
        let row = snapshot.row("g", "t", 0).unwrap();
        match high {
            Some(high) => prop_assert_eq!(row.lag, Some((high - offset).max(0))),
            None => prop_assert_eq!(row.lag, None),
        }
    }

    #[test]
    fn last_activity_is_monotonic(nows in prop::collection::vec(0i64..10_000, 1..32)) {
        let mut store = StateStore::new();
        let mut previous = None;
        for (i, now) in nows.iter().enumerate() {
            store.apply_offset(&commit(i as i64, i as i64), at(*now));
            let activity = store.group("g").unwrap().last_activity;
            if let Some(previous) = previous {
                prop_assert!(activity >= previous);
            }
            previous = Some(activity);
        }
        prop_assert_eq!(previous, nows.iter().max().map(|n| at(*n)));
    }
}
