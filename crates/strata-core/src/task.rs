use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::TaskId;
use crate::interval::Interval;
use crate::segment::DataSegment;

/// Merge job handed to the task runner for one candidate batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionTaskSpec {
    pub task_id: TaskId,
    pub data_source: String,
    /// Umbrella of every interval covered by `segments`.
    pub interval: Interval,
    /// Input segments ordered by interval start, then shard index.
    pub segments: Vec<DataSegment>,
    pub task_priority: i32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub task_context: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl CompactionTaskSpec {
    #[must_use]
    pub fn total_size_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.size_bytes).sum()
    }
}
