//! Compaction candidate selection and the coordinator compaction duty.

pub mod compactor;
pub mod config_manager;
pub mod metadata;
pub mod policy;

pub use compactor::{CompactionCycleStats, SegmentCompactor};
pub use config_manager::{ConfigAuditEntry, CoordinatorConfigManager};
pub use metadata::InMemorySegmentMetadata;
pub use policy::{CompactionSegmentSearchPolicy, NewestSegmentFirstPolicy, SegmentsToCompact};

/// Result alias over the shared core error
pub type Result<T> = strata_core::CoreResult<T>;
