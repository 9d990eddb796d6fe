//! Compaction candidate search.
//!
//! [`NewestSegmentFirstPolicy`] walks each data source's timeline backward
//! from the newest eligible interval and groups whole intervals into batches
//! no larger than the configured target size.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use strata_core::{DataSegment, DataSourceCompactionConfig, Interval, SegmentTimeline};

/// One batch of segments that should be merged by a single task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentsToCompact {
    pub data_source: String,
    /// Umbrella interval spanning every segment in the batch.
    pub interval: Interval,
    /// The sub-ranges actually covered, ascending; gaps are left out.
    pub covered_intervals: Vec<Interval>,
    /// All shards of the covered intervals, ordered by interval start then shard.
    pub segments: Vec<DataSegment>,
    pub total_size_bytes: u64,
}

impl SegmentsToCompact {
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Stateful search over the compactable history of every data source.
///
/// One instance is driven by one caller per duty cycle: `reset` once, then
/// `next_segments` until it returns `None`.
pub trait CompactionSegmentSearchPolicy: Send {
    /// Discards all prior state and prepares a new search.
    ///
    /// Data sources that have a timeline but no config are skipped.
    fn reset(
        &mut self,
        configs: &HashMap<String, DataSourceCompactionConfig>,
        timelines: &HashMap<String, Arc<SegmentTimeline>>,
    );

    /// Next candidate batch, or `None` once every data source is exhausted.
    fn next_segments(&mut self) -> Option<SegmentsToCompact>;
}

/// Per data source search position.
///
/// A cursor only lives in the queue while it still has an interval to visit;
/// exhausted data sources are dropped from it.
#[derive(Debug, Clone)]
struct DataSourceCursor {
    data_source: String,
    timeline: Arc<SegmentTimeline>,
    config: DataSourceCompactionConfig,
    /// Newest interval not yet handed out.
    next_interval: Interval,
}

impl DataSourceCursor {
    fn priority(&self) -> (DateTime<Utc>, DateTime<Utc>, Reverse<&str>) {
        (
            self.next_interval.end(),
            self.next_interval.start(),
            Reverse(self.data_source.as_str()),
        )
    }

    /// Collects the next batch walking backward from `next_interval`.
    ///
    /// Returns the batch and the cursor to resume from, `None` when the
    /// walk ran out of history. A chunk split around a newer version is
    /// counted once per batch.
    fn advance(self) -> (SegmentsToCompact, Option<Self>) {
        let target = self.config.target_compaction_size_bytes();
        let timeline = Arc::clone(&self.timeline);

        let mut intervals: Vec<Interval> = Vec::new();
        let mut segments: Vec<DataSegment> = Vec::new();
        let mut taken: HashSet<&DataSegment> = HashSet::new();
        let mut total = 0u64;
        let mut resume = None;

        let mut current = Some(self.next_interval);
        while let Some(interval) = current {
            let fresh: Vec<&DataSegment> = timeline
                .overlapping(&interval)
                .into_iter()
                .filter(|segment| !taken.contains(segment))
                .collect();
            let size: u64 = fresh.iter().map(|segment| segment.size_bytes).sum();
            if !intervals.is_empty() && total.saturating_add(size) > target {
                resume = Some(interval);
                break;
            }

            total = total.saturating_add(size);
            segments.extend(fresh.iter().map(|segment| (*segment).clone()));
            taken.extend(fresh);
            intervals.push(interval);
            current = timeline.previous_interval(&interval);
        }

        segments.sort_by(|a, b| {
            a.interval
                .start()
                .cmp(&b.interval.start())
                .then_with(|| a.partition_num().cmp(&b.partition_num()))
        });

        let covered_intervals = Interval::condense(&intervals);
        let batch = SegmentsToCompact {
            data_source: self.data_source.clone(),
            interval: Interval::umbrella(&intervals).unwrap_or(self.next_interval),
            covered_intervals,
            segments,
            total_size_bytes: total,
        };

        let next = resume.map(|next_interval| Self {
            next_interval,
            ..self
        });
        (batch, next)
    }
}

impl PartialEq for DataSourceCursor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DataSourceCursor {}

impl PartialOrd for DataSourceCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DataSourceCursor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority().cmp(&other.priority())
    }
}

/// Newest-first compaction search.
///
/// Across data sources, the batch with the most recent unvisited interval is
/// served first; ties go to the data source whose name sorts first.
#[derive(Debug, Default)]
pub struct NewestSegmentFirstPolicy {
    queue: BinaryHeap<DataSourceCursor>,
}

impl NewestSegmentFirstPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Data sources that still have eligible history.
    #[must_use]
    pub fn remaining_data_sources(&self) -> usize {
        self.queue.len()
    }

    fn initial_cursor(
        data_source: &str,
        timeline: &Arc<SegmentTimeline>,
        config: &DataSourceCompactionConfig,
    ) -> Option<DataSourceCursor> {
        let latest = timeline.latest_interval()?;
        // A skip window reaching past the earliest representable instant covers everything.
        let boundary = latest
            .end()
            .checked_sub_signed(config.skip_offset_from_latest())?;
        let next_interval = timeline.latest_interval_ending_by(boundary)?;
        Some(DataSourceCursor {
            data_source: data_source.to_string(),
            timeline: Arc::clone(timeline),
            config: config.clone(),
            next_interval,
        })
    }
}

impl CompactionSegmentSearchPolicy for NewestSegmentFirstPolicy {
    fn reset(
        &mut self,
        configs: &HashMap<String, DataSourceCompactionConfig>,
        timelines: &HashMap<String, Arc<SegmentTimeline>>,
    ) {
        self.queue.clear();

        let mut unconfigured = 0usize;
        let mut exhausted = 0usize;
        for (data_source, timeline) in timelines {
            let Some(config) = configs.get(data_source) else {
                unconfigured += 1;
                continue;
            };
            match Self::initial_cursor(data_source, timeline, config) {
                Some(cursor) => self.queue.push(cursor),
                None => {
                    tracing::debug!(
                        data_source = %data_source,
                        "No segments outside the skip window"
                    );
                    exhausted += 1;
                }
            }
        }

        tracing::info!(
            data_sources = self.queue.len(),
            unconfigured,
            exhausted,
            "Compaction search reset"
        );
    }

    fn next_segments(&mut self) -> Option<SegmentsToCompact> {
        let cursor = self.queue.pop()?;
        let (batch, next) = cursor.advance();
        if let Some(next) = next {
            self.queue.push(next);
        }

        tracing::debug!(
            data_source = %batch.data_source,
            interval = %batch.interval,
            segments = batch.segments.len(),
            size_bytes = batch.total_size_bytes,
            "Compaction candidate found"
        );
        Some(batch)
    }
}

impl Iterator for NewestSegmentFirstPolicy {
    type Item = SegmentsToCompact;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_segments()
    }
}
