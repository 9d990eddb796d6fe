use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::ids::TaskId;
use crate::task::CompactionTaskSpec;
use crate::timeline::SegmentTimeline;

/// Metadata layer view of the published segments.
#[async_trait]
pub trait SegmentTimelineSource: Send + Sync {
    /// Immutable timeline snapshot of every data source with published segments.
    async fn snapshot(&self) -> CoreResult<HashMap<String, Arc<SegmentTimeline>>>;
}

/// Runner that turns a candidate batch into an actual merge job.
#[async_trait]
pub trait CompactionTaskSubmitter: Send + Sync {
    /// Submits the task and returns the id the runner accepted it under.
    async fn submit(&self, task: CompactionTaskSpec) -> CoreResult<TaskId>;
}
