//! Candidate selection scenarios for the newest-segment-first search.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use strata_compaction::{CompactionSegmentSearchPolicy, NewestSegmentFirstPolicy};
use strata_core::{
    parse_instant, parse_period, DataSegment, DataSourceCompactionConfig, Interval,
    SegmentTimeline, ShardSpec,
};

const DATA_SOURCE: &str = "dataSource";
const SEGMENT_SIZE: u64 = 1000;
const SHARDS_PER_INTERVAL: u32 = 4;

fn interval(text: &str) -> Interval {
    Interval::parse(text).unwrap()
}

/// Hourly intervals of every range, newest first.
fn hours_newest_first(ranges: &[&str]) -> Vec<Interval> {
    let mut ranges: Vec<Interval> = ranges.iter().map(|r| interval(r)).collect();
    ranges.sort();
    ranges.reverse();

    let mut hours = Vec::new();
    for range in ranges {
        let mut end = range.end();
        while end > range.start() {
            let hour = Interval::with_period_ending(end, Duration::hours(1)).unwrap();
            hours.push(hour);
            end = hour.start();
        }
    }
    hours
}

fn create_timeline(data_source: &str, ranges: &[&str], shards: u32) -> Arc<SegmentTimeline> {
    let version = "2017-11-20T00:00:00.000Z";
    let segments = hours_newest_first(ranges).into_iter().flat_map(|hour| {
        (0..shards).map(move |i| {
            DataSegment::new(
                data_source,
                hour,
                version,
                ShardSpec::numbered(i, shards).unwrap(),
                SEGMENT_SIZE,
            )
        })
    });
    Arc::new(SegmentTimeline::from_segments(data_source, segments).unwrap())
}

fn create_config(data_source: &str, target: i64, skip_offset: &str) -> DataSourceCompactionConfig {
    DataSourceCompactionConfig::builder(data_source)
        .target_compaction_size_bytes(target)
        .skip_offset_from_latest(parse_period(skip_offset).unwrap())
        .build()
        .unwrap()
}

fn reset(
    policy: &mut NewestSegmentFirstPolicy,
    configs: Vec<DataSourceCompactionConfig>,
    timelines: Vec<Arc<SegmentTimeline>>,
) {
    let configs: HashMap<String, DataSourceCompactionConfig> = configs
        .into_iter()
        .map(|c| (c.data_source().to_string(), c))
        .collect();
    let timelines: HashMap<String, Arc<SegmentTimeline>> = timelines
        .into_iter()
        .map(|t| (t.data_source().to_string(), t))
        .collect();
    policy.reset(&configs, &timelines);
}

/// Intervals of a two-hour batch as the policy orders them: older hour's
/// shards first, then the newer hour's.
fn expected_pair(newer: Interval, older: Interval) -> Vec<Interval> {
    let mut expected = vec![older; SHARDS_PER_INTERVAL as usize];
    expected.extend(vec![newer; SHARDS_PER_INTERVAL as usize]);
    expected
}

fn batch_intervals(segments: &[DataSegment]) -> Vec<Interval> {
    segments.iter().map(|s| s.interval).collect()
}

const RANGES: [&str; 2] = [
    "2017-11-16T20:00:00/2017-11-17T04:00:00",
    "2017-11-14T00:00:00/2017-11-16T07:00:00",
];

#[test]
fn test_large_offset_and_small_segment_interval() {
    let mut policy = NewestSegmentFirstPolicy::new();
    reset(
        &mut policy,
        vec![create_config(DATA_SOURCE, 10_000, "P1D")],
        vec![create_timeline(DATA_SOURCE, &RANGES, SHARDS_PER_INTERVAL)],
    );

    // Everything ending after 2017-11-16T04:00 is inside the skip window.
    let eligible: Vec<Interval> = hours_newest_first(&RANGES)
        .into_iter()
        .filter(|hour| hour.end() <= parse_instant("2017-11-16T04:00:00").unwrap())
        .collect();
    assert_eq!(eligible[0], interval("2017-11-16T03:00:00/2017-11-16T04:00:00"));

    let mut last_interval = None;
    for pair in eligible.chunks(2) {
        let batch = policy.next_segments().expect("batch expected");
        assert_eq!(batch.segments.len(), 8);
        assert_eq!(batch.total_size_bytes, 8 * SEGMENT_SIZE);
        assert_eq!(batch_intervals(&batch.segments), expected_pair(pair[0], pair[1]));
        last_interval = Some(batch.segments[0].interval);
    }

    assert!(policy.next_segments().is_none());
    assert_eq!(
        last_interval,
        Some(interval("2017-11-14T00:00:00/2017-11-14T01:00:00"))
    );
}

#[test]
fn test_small_offset_and_large_segment_interval() {
    let mut policy = NewestSegmentFirstPolicy::new();
    reset(
        &mut policy,
        vec![create_config(DATA_SOURCE, 10_000, "PT1M")],
        vec![create_timeline(DATA_SOURCE, &RANGES, SHARDS_PER_INTERVAL)],
    );

    // Only the newest hour ends inside the one minute window.
    let eligible: Vec<Interval> = hours_newest_first(&RANGES).into_iter().skip(1).collect();
    assert_eq!(eligible[0], interval("2017-11-17T02:00:00/2017-11-17T03:00:00"));

    let mut batches = Vec::new();
    while let Some(batch) = policy.next_segments() {
        batches.push(batch);
    }
    assert_eq!(batches.len(), eligible.len() / 2);

    for (batch, pair) in batches.iter().zip(eligible.chunks(2)) {
        assert_eq!(batch.segments.len(), 8);
        assert_eq!(batch_intervals(&batch.segments), expected_pair(pair[0], pair[1]));
    }

    // The walk crosses the gap: one batch holds the boundary hours of both ranges.
    let across_gap = &batches[3];
    assert_eq!(
        batch_intervals(&across_gap.segments),
        expected_pair(
            interval("2017-11-16T20:00:00/2017-11-16T21:00:00"),
            interval("2017-11-16T06:00:00/2017-11-16T07:00:00"),
        )
    );
    assert_eq!(
        across_gap.interval,
        interval("2017-11-16T06:00:00/2017-11-16T21:00:00")
    );
    assert_eq!(
        across_gap.covered_intervals,
        vec![
            interval("2017-11-16T06:00:00/2017-11-16T07:00:00"),
            interval("2017-11-16T20:00:00/2017-11-16T21:00:00"),
        ]
    );

    let oldest = batches.last().unwrap();
    assert_eq!(
        oldest.segments[0].interval,
        interval("2017-11-14T00:00:00/2017-11-14T01:00:00")
    );
}

#[test]
fn test_newest_data_source_is_served_first() {
    let mut policy = NewestSegmentFirstPolicy::new();
    reset(
        &mut policy,
        vec![
            create_config("a", SEGMENT_SIZE as i64, "PT0S"),
            create_config("b", SEGMENT_SIZE as i64, "PT0S"),
        ],
        vec![
            create_timeline("a", &["2017-11-14T22:00:00/2017-11-15T00:00:00"], 1),
            create_timeline("b", &["2017-11-14T23:00:00/2017-11-15T01:00:00"], 1),
        ],
    );

    let order: Vec<(String, Interval)> = policy
        .by_ref()
        .map(|batch| (batch.data_source, batch.interval))
        .collect();
    assert_eq!(
        order,
        vec![
            ("b".to_string(), interval("2017-11-15T00:00:00/2017-11-15T01:00:00")),
            ("a".to_string(), interval("2017-11-14T23:00:00/2017-11-15T00:00:00")),
            ("b".to_string(), interval("2017-11-14T23:00:00/2017-11-15T00:00:00")),
            ("a".to_string(), interval("2017-11-14T22:00:00/2017-11-14T23:00:00")),
        ]
    );
}

#[test]
fn test_data_source_without_config_is_skipped() {
    let mut policy = NewestSegmentFirstPolicy::new();
    reset(
        &mut policy,
        vec![create_config("other", 10_000, "PT0S")],
        vec![create_timeline(DATA_SOURCE, &RANGES, SHARDS_PER_INTERVAL)],
    );

    assert!(policy.next_segments().is_none());
}

#[test]
fn test_empty_timeline_is_immediately_exhausted() {
    let mut policy = NewestSegmentFirstPolicy::new();
    reset(
        &mut policy,
        vec![create_config(DATA_SOURCE, 10_000, "PT0S")],
        vec![Arc::new(SegmentTimeline::empty(DATA_SOURCE))],
    );

    assert!(policy.next_segments().is_none());
}

#[test]
fn test_history_inside_skip_window_yields_nothing() {
    let mut policy = NewestSegmentFirstPolicy::new();
    reset(
        &mut policy,
        vec![create_config(DATA_SOURCE, 10_000, "P30D")],
        vec![create_timeline(DATA_SOURCE, &RANGES, SHARDS_PER_INTERVAL)],
    );

    assert!(policy.next_segments().is_none());
}

#[test]
fn test_exhaustion_is_idempotent() {
    let mut policy = NewestSegmentFirstPolicy::new();
    reset(
        &mut policy,
        vec![create_config(DATA_SOURCE, 1_000_000, "PT0S")],
        vec![create_timeline(
            DATA_SOURCE,
            &["2017-11-14T00:00:00/2017-11-14T03:00:00"],
            SHARDS_PER_INTERVAL,
        )],
    );

    let batch = policy.next_segments().unwrap();
    assert_eq!(batch.segments.len(), 12);
    for _ in 0..3 {
        assert!(policy.next_segments().is_none());
    }
}

#[test]
fn test_oversized_interval_is_never_split() {
    let mut policy = NewestSegmentFirstPolicy::new();
    reset(
        &mut policy,
        vec![create_config(DATA_SOURCE, 1_500, "PT0S")],
        vec![create_timeline(
            DATA_SOURCE,
            &["2017-11-14T00:00:00/2017-11-14T02:00:00"],
            SHARDS_PER_INTERVAL,
        )],
    );

    let sizes: Vec<usize> = policy.by_ref().map(|batch| batch.segments.len()).collect();
    assert_eq!(sizes, vec![4, 4]);
}

#[test]
fn test_only_newest_version_is_selected() {
    let hour = interval("2017-11-14T00:00:00/2017-11-14T01:00:00");
    let old = DataSegment::new(DATA_SOURCE, hour, "v1", ShardSpec::numbered(0, 1).unwrap(), 10);
    let new = DataSegment::new(DATA_SOURCE, hour, "v2", ShardSpec::numbered(0, 1).unwrap(), 20);
    let timeline = SegmentTimeline::from_segments(DATA_SOURCE, vec![old, new]).unwrap();

    let mut policy = NewestSegmentFirstPolicy::new();
    reset(
        &mut policy,
        vec![create_config(DATA_SOURCE, 10_000, "PT0S")],
        vec![Arc::new(timeline)],
    );

    let batch = policy.next_segments().unwrap();
    assert_eq!(batch.segments.len(), 1);
    assert_eq!(batch.segments[0].version, "v2");
    assert!(policy.next_segments().is_none());
}

#[test]
fn test_skip_offset_larger_than_all_history_yields_nothing() {
    let mut policy = NewestSegmentFirstPolicy::new();
    reset(
        &mut policy,
        vec![create_config(DATA_SOURCE, 10_000, "P200000000D")],
        vec![create_timeline(
            DATA_SOURCE,
            &["2017-11-14T00:00:00/2017-11-14T01:00:00"],
            SHARDS_PER_INTERVAL,
        )],
    );

    assert_eq!(policy.remaining_data_sources(), 0);
    assert!(policy.next_segments().is_none());
}

#[test]
fn test_partially_replaced_version_is_still_compacted() {
    let day = interval("2017-11-14T00:00:00/2017-11-15T00:00:00");
    let patch = interval("2017-11-14T05:00:00/2017-11-14T06:00:00");
    let mut segments: Vec<DataSegment> = (0..3)
        .map(|i| DataSegment::new(DATA_SOURCE, day, "v1", ShardSpec::numbered(i, 3).unwrap(), 10))
        .collect();
    segments.push(DataSegment::new(
        DATA_SOURCE,
        patch,
        "v2",
        ShardSpec::numbered(0, 1).unwrap(),
        99,
    ));
    let timeline = Arc::new(SegmentTimeline::from_segments(DATA_SOURCE, segments).unwrap());
    assert!(timeline.overshadowed().is_empty());

    let mut policy = NewestSegmentFirstPolicy::new();
    reset(
        &mut policy,
        vec![create_config(DATA_SOURCE, 10_000, "PT0S")],
        vec![Arc::clone(&timeline)],
    );

    let batch = policy.next_segments().unwrap();
    assert_eq!(batch.interval, day);
    assert_eq!(batch.total_size_bytes, 129);
    let versions: Vec<&str> = batch.segments.iter().map(|s| s.version.as_str()).collect();
    assert_eq!(versions, vec!["v1", "v1", "v1", "v2"]);
    assert!(policy.next_segments().is_none());

    // A target smaller than the day splits the older version around the patch.
    reset(
        &mut policy,
        vec![create_config(DATA_SOURCE, 50, "PT0S")],
        vec![timeline],
    );
    let batches: Vec<(Interval, u64)> = policy
        .by_ref()
        .map(|batch| (batch.interval, batch.total_size_bytes))
        .collect();
    assert_eq!(
        batches,
        vec![
            (interval("2017-11-14T06:00:00/2017-11-15T00:00:00"), 30),
            (patch, 99),
            (interval("2017-11-14T00:00:00/2017-11-14T05:00:00"), 30),
        ]
    );
}
