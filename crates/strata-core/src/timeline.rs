//! Versioned interval timeline of the currently visible segments of one data source.
//!
//! A [`SegmentTimeline`] is an immutable snapshot built once by a
//! [`TimelineBuilder`]. Readers never observe later publications; build a new
//! snapshot for that.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::interval::Interval;
use crate::segment::DataSegment;

/// One visible `(interval, version)` chunk together with all of its shards.
///
/// When a newer version covers part of a chunk, the chunk is split into one
/// entry per uncovered sub-range; each entry still lists every shard of the
/// chunk, and `interval` is the visible part only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    interval: Interval,
    version: String,
    segments: Vec<DataSegment>,
}

impl TimelineEntry {
    #[must_use]
    pub fn interval(&self) -> Interval {
        self.interval
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Shards ordered by partition number.
    #[must_use]
    pub fn segments(&self) -> &[DataSegment] {
        &self.segments
    }

    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.size_bytes).sum()
    }
}

/// Read index over the visible segments of a single data source.
#[derive(Debug, Clone)]
pub struct SegmentTimeline {
    data_source: String,
    /// Visible chunks keyed by interval start; never overlapping.
    visible: BTreeMap<DateTime<Utc>, TimelineEntry>,
    /// Each visible segment once, ordered by interval start then shard.
    segments: Vec<DataSegment>,
    overshadowed: Vec<DataSegment>,
    incomplete: Vec<DataSegment>,
}

impl SegmentTimeline {
    /// Timeline with no segments.
    #[must_use]
    pub fn empty(data_source: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            visible: BTreeMap::new(),
            segments: Vec::new(),
            overshadowed: Vec::new(),
            incomplete: Vec::new(),
        }
    }

    /// Builds a timeline from published segments.
    ///
    /// # Errors
    ///
    /// Fails on the first segment [`TimelineBuilder::add`] rejects.
    pub fn from_segments(
        data_source: impl Into<String>,
        segments: impl IntoIterator<Item = DataSegment>,
    ) -> CoreResult<Self> {
        let mut builder = TimelineBuilder::new(data_source);
        for segment in segments {
            builder.add(segment)?;
        }
        Ok(builder.build())
    }

    #[must_use]
    pub fn data_source(&self) -> &str {
        &self.data_source
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    /// Visible chunks in ascending time order.
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &TimelineEntry> {
        self.visible.values()
    }

    /// Visible segments ordered by interval start, then shard index.
    pub fn segments(&self) -> impl Iterator<Item = &DataSegment> {
        self.segments.iter()
    }

    /// The visible chunk whose interval is exactly `interval`.
    #[must_use]
    pub fn entry(&self, interval: &Interval) -> Option<&TimelineEntry> {
        self.visible
            .get(&interval.start())
            .filter(|entry| entry.interval == *interval)
    }

    /// All visible segments intersecting `interval`, ordered by interval
    /// start then shard index.
    #[must_use]
    pub fn overlapping(&self, interval: &Interval) -> Vec<&DataSegment> {
        let mut seen: HashSet<&DataSegment> = HashSet::new();
        let mut found: Vec<&DataSegment> = overlapping_entries(&self.visible, interval)
            .flat_map(|entry| entry.segments.iter())
            .filter(|segment| seen.insert(*segment))
            .collect();
        found.sort_by(|a, b| segment_order(a, b));
        found
    }

    /// Total size of the visible segments intersecting `interval`, each
    /// segment counted once.
    #[must_use]
    pub fn total_size_bytes(&self, interval: &Interval) -> u64 {
        self.overlapping(interval)
            .iter()
            .map(|segment| segment.size_bytes)
            .sum()
    }

    /// Most recent visible interval, `None` when the timeline is empty.
    #[must_use]
    pub fn latest_interval(&self) -> Option<Interval> {
        self.visible.values().next_back().map(|entry| entry.interval)
    }

    #[must_use]
    pub fn earliest_interval(&self) -> Option<Interval> {
        self.visible.values().next().map(|entry| entry.interval)
    }

    /// The visible interval immediately before `interval`, skipping gaps.
    #[must_use]
    pub fn previous_interval(&self, interval: &Interval) -> Option<Interval> {
        self.latest_interval_ending_by(interval.start())
    }

    /// The most recent visible interval whose end is at or before `instant`.
    #[must_use]
    pub fn latest_interval_ending_by(&self, instant: DateTime<Utc>) -> Option<Interval> {
        self.visible
            .range(..instant)
            .rev()
            .map(|(_, entry)| entry.interval)
            .find(|interval| interval.end() <= instant)
    }

    /// Complete chunks hidden by a newer overlapping version.
    #[must_use]
    pub fn overshadowed(&self) -> &[DataSegment] {
        &self.overshadowed
    }

    /// Segments of chunks still missing shards; not visible yet.
    #[must_use]
    pub fn incomplete(&self) -> &[DataSegment] {
        &self.incomplete
    }
}

/// Entries of a non-overlapping start-keyed map that intersect `interval`.
fn overlapping_entries<'a>(
    visible: &'a BTreeMap<DateTime<Utc>, TimelineEntry>,
    interval: &Interval,
) -> impl Iterator<Item = &'a TimelineEntry> + 'a {
    let interval = *interval;
    let lower = visible
        .range(..=interval.start())
        .next_back()
        .map_or(interval.start(), |(start, _)| *start);
    visible
        .range(lower..interval.end())
        .map(|(_, entry)| entry)
        .filter(move |entry| entry.interval.overlaps(&interval))
}

/// Interval start, then shard, then the rest of the chunk identity.
fn segment_order(a: &DataSegment, b: &DataSegment) -> Ordering {
    a.interval
        .start()
        .cmp(&b.interval.start())
        .then_with(|| a.partition_num().cmp(&b.partition_num()))
        .then_with(|| a.interval.end().cmp(&b.interval.end()))
        .then_with(|| a.version.cmp(&b.version))
}

/// Parts of `interval` not covered by any entry of `visible`, ascending.
fn uncovered(visible: &BTreeMap<DateTime<Utc>, TimelineEntry>, interval: &Interval) -> Vec<Interval> {
    let mut parts = Vec::new();
    let mut cursor = interval.start();
    for entry in overlapping_entries(visible, interval) {
        if entry.interval.start() > cursor {
            parts.extend(Interval::new(cursor, entry.interval.start()).ok());
        }
        cursor = cursor.max(entry.interval.end());
    }
    if cursor < interval.end() {
        parts.extend(Interval::new(cursor, interval.end()).ok());
    }
    parts
}

/// Collects published segments and resolves which of them are visible.
#[derive(Debug, Clone)]
pub struct TimelineBuilder {
    data_source: String,
    chunks: BTreeMap<(Interval, String), BTreeMap<u32, DataSegment>>,
}

impl TimelineBuilder {
    #[must_use]
    pub fn new(data_source: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            chunks: BTreeMap::new(),
        }
    }

    /// Adds one shard.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a segment of another data source, an empty
    ///   interval, an out-of-range shard, or a shard count that disagrees with
    ///   the other shards of the same chunk
    /// - `AlreadyExists` when the shard is already present
    pub fn add(&mut self, segment: DataSegment) -> CoreResult<&mut Self> {
        segment.validate()?;
        if segment.data_source != self.data_source {
            return Err(CoreError::ValidationError(format!(
                "segment {} does not belong to data source {}",
                segment.id(),
                self.data_source
            )));
        }
        if segment.interval.is_empty() {
            return Err(CoreError::ValidationError(format!(
                "segment {} has an empty interval",
                segment.id()
            )));
        }

        let shards = self
            .chunks
            .entry((segment.interval, segment.version.clone()))
            .or_default();
        if let Some(existing) = shards.values().next() {
            if existing.shard_spec.partitions() != segment.shard_spec.partitions() {
                return Err(CoreError::ValidationError(format!(
                    "segment {} declares {} partitions but its chunk has {}",
                    segment.id(),
                    segment.shard_spec.partitions(),
                    existing.shard_spec.partitions()
                )));
            }
        }
        let partition = segment.partition_num();
        if shards.contains_key(&partition) {
            return Err(CoreError::already_exists("segment", segment.id()));
        }
        shards.insert(partition, segment);
        Ok(self)
    }

    /// Resolves visibility and freezes the snapshot.
    ///
    /// Only complete chunks are visible. Complete chunks are considered from
    /// the highest version down; a chunk stays visible over the sub-ranges no
    /// higher version covers, and is overshadowed once fully covered.
    #[must_use]
    pub fn build(self) -> SegmentTimeline {
        let mut complete: Vec<TimelineEntry> = Vec::new();
        let mut incomplete: Vec<DataSegment> = Vec::new();

        for ((interval, version), shards) in self.chunks {
            let expected = shards
                .values()
                .next()
                .map_or(0, |s| s.shard_spec.partitions() as usize);
            if shards.len() == expected {
                complete.push(TimelineEntry {
                    interval,
                    version,
                    segments: shards.into_values().collect(),
                });
            } else {
                incomplete.extend(shards.into_values());
            }
        }

        complete.sort_by(|a, b| match b.version.cmp(&a.version) {
            Ordering::Equal => b.interval.cmp(&a.interval),
            other => other,
        });

        let mut visible: BTreeMap<DateTime<Utc>, TimelineEntry> = BTreeMap::new();
        let mut overshadowed: Vec<DataSegment> = Vec::new();
        let mut segments: Vec<DataSegment> = Vec::new();
        for entry in complete {
            let parts = uncovered(&visible, &entry.interval);
            if parts.is_empty() {
                overshadowed.extend(entry.segments);
                continue;
            }
            segments.extend(entry.segments.iter().cloned());
            for part in parts {
                visible.insert(
                    part.start(),
                    TimelineEntry {
                        interval: part,
                        version: entry.version.clone(),
                        segments: entry.segments.clone(),
                    },
                );
            }
        }
        segments.sort_by(segment_order);

        if !overshadowed.is_empty() {
            tracing::debug!(
                data_source = %self.data_source,
                overshadowed = overshadowed.len(),
                "Timeline built with overshadowed segments"
            );
        }

        SegmentTimeline {
            data_source: self.data_source,
            visible,
            segments,
            overshadowed,
            incomplete,
        }
    }
}
