//! Coordinator startup tests over manifest and config files on disk

use std::io::Write;
use std::path::Path;

use chrono::Duration;
use strata_coordinator::{bootstrap, load_compaction_configs, load_segment_manifest};
use strata_core::{parse_instant, CoreError, DataSegment, Interval, ShardSpec, StrataConfig};
use tempfile::{NamedTempFile, TempDir};

fn hourly_segments(data_source: &str, hours: i64, shards: u32) -> Vec<DataSegment> {
    let base = parse_instant("2017-11-14").unwrap();
    let mut segments = Vec::new();
    for hour in 0..hours {
        let interval = Interval::with_period_starting(
            base + Duration::hours(hour),
            Duration::hours(1),
        )
        .unwrap();
        for p in 0..shards {
            segments.push(DataSegment::new(
                data_source,
                interval,
                "2017-11-20",
                ShardSpec::numbered(p, shards).unwrap(),
                1000,
            ));
        }
    }
    segments
}

fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[tokio::test]
async fn test_bootstrap_runs_a_cycle_over_seeded_state() {
    let dir = TempDir::new().unwrap();
    let segments = write_file(
        &dir,
        "segments.json",
        &serde_json::to_vec(&hourly_segments("wikipedia", 6, 2)).unwrap(),
    );
    let compaction = write_file(
        &dir,
        "compaction.json",
        br#"[{"dataSource": "wikipedia", "targetCompactionSizeBytes": 4000, "taskPriority": 50}]"#,
    );

    let coordinator = bootstrap(
        &StrataConfig::default(),
        Some(segments.as_path()),
        Some(compaction.as_path()),
    )
    .await
    .unwrap();

    assert_eq!(coordinator.metadata.data_sources(), vec!["wikipedia".to_string()]);
    assert_eq!(coordinator.metadata.segments("wikipedia").len(), 12);
    assert_eq!(coordinator.configs.current().compaction_configs().len(), 1);

    let stats = coordinator.compactor.run_compaction_cycle().await.unwrap();
    assert_eq!(stats.candidates, 3);
    assert_eq!(stats.submitted, 3);
    assert_eq!(coordinator.submitter.submitted(), 3);
    assert_eq!(coordinator.submitter.segments(), 12);
}

#[tokio::test]
async fn test_skip_offset_is_read_as_a_period() {
    let dir = TempDir::new().unwrap();
    let segments = write_file(
        &dir,
        "segments.json",
        &serde_json::to_vec(&hourly_segments("wikipedia", 6, 2)).unwrap(),
    );
    let compaction = write_file(
        &dir,
        "compaction.json",
        br#"[{"dataSource": "wikipedia", "targetCompactionSizeBytes": 4000, "skipOffsetFromLatest": "PT2H"}]"#,
    );

    let coordinator = bootstrap(
        &StrataConfig::default(),
        Some(segments.as_path()),
        Some(compaction.as_path()),
    )
    .await
    .unwrap();

    let stats = coordinator.compactor.run_compaction_cycle().await.unwrap();
    assert_eq!(stats.submitted, 2);
    assert_eq!(coordinator.submitter.segments(), 8);
}

#[tokio::test]
async fn test_bootstrap_without_seed_files_is_idle() {
    let coordinator = bootstrap(&StrataConfig::default(), None, None)
        .await
        .unwrap();

    assert!(coordinator.metadata.data_sources().is_empty());
    let stats = coordinator.compactor.run_compaction_cycle().await.unwrap();
    assert_eq!(stats.candidates, 0);
    assert_eq!(coordinator.submitter.submitted(), 0);
}

#[tokio::test]
async fn test_manifest_in_wire_format() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(
        br#"[
            {
                "dataSource": "wikipedia",
                "interval": "2017-11-14T00:00:00.000Z/2017-11-14T01:00:00.000Z",
                "version": "2017-11-20",
                "shardSpec": {"type": "numbered", "partitionNum": 1, "partitions": 2},
                "sizeBytes": 1000
            },
            {
                "dataSource": "wikipedia",
                "interval": "2017-11-14T00:00:00.000Z/2017-11-14T01:00:00.000Z",
                "version": "2017-11-20",
                "sizeBytes": 500
            }
        ]"#,
    )
    .unwrap();

    let segments = load_segment_manifest(file.path()).await.unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].partition_num(), 1);
    assert_eq!(segments[1].shard_spec, ShardSpec::None);
    assert_eq!(segments[1].size_bytes, 500);
}

#[tokio::test]
async fn test_missing_and_malformed_files_are_rejected() {
    let missing = load_segment_manifest(Path::new("/nonexistent/segments.json")).await;
    assert!(matches!(missing, Err(CoreError::IoError(_))));

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"{not json").unwrap();
    let malformed = load_segment_manifest(file.path()).await;
    assert!(matches!(malformed, Err(CoreError::DeserializationError(_))));

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(br#"[{"dataSource": "wikipedia", "targetCompactionSizeBytes": 0}]"#)
        .unwrap();
    let invalid = load_compaction_configs(file.path()).await;
    assert!(matches!(invalid, Err(CoreError::DeserializationError(_))));
}

#[tokio::test]
async fn test_duplicate_segments_fail_bootstrap() {
    let dir = TempDir::new().unwrap();
    let mut segments = hourly_segments("wikipedia", 1, 1);
    segments.push(segments[0].clone());
    let manifest = write_file(&dir, "segments.json", &serde_json::to_vec(&segments).unwrap());

    let result = bootstrap(&StrataConfig::default(), Some(manifest.as_path()), None).await;
    assert!(matches!(result, Err(CoreError::AlreadyExists { .. })));
}
