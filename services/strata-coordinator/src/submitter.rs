use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use strata_core::{CompactionTaskSpec, CompactionTaskSubmitter, CoreResult, TaskId};

/// Submitter that only logs the tasks it is handed
///
/// Stands in for an indexing service when the coordinator runs standalone.
#[derive(Debug, Default)]
pub struct LoggingTaskSubmitter {
    submitted: AtomicUsize,
    segments: AtomicUsize,
}

impl LoggingTaskSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks accepted so far
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Segments covered by the accepted tasks
    pub fn segments(&self) -> usize {
        self.segments.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CompactionTaskSubmitter for LoggingTaskSubmitter {
    async fn submit(&self, task: CompactionTaskSpec) -> CoreResult<TaskId> {
        tracing::info!(
            task_id = %task.task_id,
            data_source = %task.data_source,
            interval = %task.interval,
            segments = task.segments.len(),
            size_bytes = task.total_size_bytes(),
            priority = task.task_priority,
            "Compaction task submitted"
        );

        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.segments.fetch_add(task.segments.len(), Ordering::Relaxed);
        Ok(task.task_id)
    }
}
