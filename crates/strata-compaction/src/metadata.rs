use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use strata_core::{CoreError, CoreResult, DataSegment, SegmentTimeline, SegmentTimelineSource};

/// Process local store of published segments.
///
/// Segments are keyed by data source and segment id. Each snapshot rebuilds
/// the timelines, so later publications never leak into a running cycle.
#[derive(Debug, Default)]
pub struct InMemorySegmentMetadata {
    segments: RwLock<HashMap<String, BTreeMap<String, DataSegment>>>,
}

impl InMemorySegmentMetadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes one segment.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if the segment is malformed
    /// - `AlreadyExists` if a segment with the same id is already published
    pub fn publish(&self, segment: DataSegment) -> CoreResult<()> {
        segment.validate()?;
        let id = segment.id();

        let mut segments = self.segments.write();
        let by_id = segments.entry(segment.data_source.clone()).or_default();
        if by_id.contains_key(&id) {
            return Err(CoreError::already_exists("segment", id));
        }
        by_id.insert(id, segment);
        Ok(())
    }

    /// Publishes every segment, stopping at the first rejected one.
    pub fn publish_all(&self, segments: impl IntoIterator<Item = DataSegment>) -> CoreResult<usize> {
        let mut published = 0;
        for segment in segments {
            self.publish(segment)?;
            published += 1;
        }
        Ok(published)
    }

    /// Removes a segment by id and returns it.
    pub fn remove(&self, data_source: &str, segment_id: &str) -> CoreResult<DataSegment> {
        let mut segments = self.segments.write();
        let by_id = segments
            .get_mut(data_source)
            .ok_or_else(|| CoreError::not_found("dataSource", data_source))?;
        let removed = by_id
            .remove(segment_id)
            .ok_or_else(|| CoreError::not_found("segment", segment_id))?;
        if by_id.is_empty() {
            segments.remove(data_source);
        }
        Ok(removed)
    }

    /// Data sources with at least one published segment, sorted.
    #[must_use]
    pub fn data_sources(&self) -> Vec<String> {
        let mut names: Vec<String> = self.segments.read().keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn segments(&self, data_source: &str) -> Vec<DataSegment> {
        self.segments
            .read()
            .get(data_source)
            .map(|by_id| by_id.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Builds the current timeline of one data source.
    pub fn timeline(&self, data_source: &str) -> CoreResult<SegmentTimeline> {
        SegmentTimeline::from_segments(data_source, self.segments(data_source))
    }
}

#[async_trait]
impl SegmentTimelineSource for InMemorySegmentMetadata {
    async fn snapshot(&self) -> CoreResult<HashMap<String, Arc<SegmentTimeline>>> {
        let published: Vec<(String, Vec<DataSegment>)> = self
            .segments
            .read()
            .iter()
            .map(|(name, by_id)| (name.clone(), by_id.values().cloned().collect()))
            .collect();

        let mut timelines = HashMap::with_capacity(published.len());
        for (data_source, segments) in published {
            match SegmentTimeline::from_segments(data_source.as_str(), segments) {
                Ok(timeline) => {
                    timelines.insert(data_source, Arc::new(timeline));
                }
                Err(e) => {
                    tracing::error!(
                        data_source = %data_source,
                        error = %e,
                        "Inconsistent segment metadata, data source left out of snapshot"
                    );
                }
            }
        }
        Ok(timelines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{Interval, ShardSpec};

    fn segment(ds: &str, interval: &str, partition: u32, partitions: u32) -> DataSegment {
        DataSegment::new(
            ds,
            Interval::parse(interval).unwrap(),
            "2017-11-20",
            ShardSpec::numbered(partition, partitions).unwrap(),
            100,
        )
    }

    #[test]
    fn test_publish_and_remove() {
        let store = InMemorySegmentMetadata::new();
        let first = segment("wiki", "2017-11-14T00:00:00/2017-11-14T01:00:00", 0, 1);
        store.publish(first.clone()).unwrap();

        assert!(matches!(
            store.publish(first.clone()),
            Err(CoreError::AlreadyExists { .. })
        ));
        assert_eq!(store.data_sources(), vec!["wiki".to_string()]);

        let removed = store.remove("wiki", &first.id()).unwrap();
        assert_eq!(removed, first);
        assert!(store.data_sources().is_empty());
        assert!(matches!(
            store.remove("wiki", &first.id()),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_snapshot_is_isolated_from_later_publications() {
        let store = InMemorySegmentMetadata::new();
        store
            .publish(segment("wiki", "2017-11-14T00:00:00/2017-11-14T01:00:00", 0, 1))
            .unwrap();

        let snapshot = store.snapshot().await.unwrap();
        store
            .publish(segment("wiki", "2017-11-14T01:00:00/2017-11-14T02:00:00", 0, 1))
            .unwrap();

        assert_eq!(snapshot["wiki"].segments().count(), 1);
        assert_eq!(store.timeline("wiki").unwrap().segments().count(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_skips_inconsistent_data_source() {
        let store = InMemorySegmentMetadata::new();
        store
            .publish(segment("wiki", "2017-11-14T00:00:00/2017-11-14T01:00:00", 0, 2))
            .unwrap();
        store
            .publish(segment("wiki", "2017-11-14T00:00:00/2017-11-14T01:00:00", 1, 3))
            .unwrap();
        store
            .publish(segment("logs", "2017-11-14T00:00:00/2017-11-14T01:00:00", 0, 1))
            .unwrap();

        let snapshot = store.snapshot().await.unwrap();
        assert!(!snapshot.contains_key("wiki"));
        assert!(snapshot.contains_key("logs"));
    }
}
