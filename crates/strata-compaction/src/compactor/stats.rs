use serde::{Deserialize, Serialize};

/// Outcome counts of one compaction duty cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionCycleStats {
    /// Batches emitted by the search policy
    pub candidates: usize,
    /// Batches accepted by the task submitter
    pub submitted: usize,
    /// Batches with nothing to merge (fewer than two segments)
    pub skipped: usize,
    /// Batches the submitter rejected
    pub failed: usize,
}

impl CompactionCycleStats {
    /// Segment batches the cycle acted on
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.submitted + self.failed
    }
}
