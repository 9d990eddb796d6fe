//! Core domain types and traits for the strata control plane.

pub mod auth;
pub mod compaction_config;
pub mod config;
pub mod dynamic_config;
pub mod error;
pub mod ids;
pub mod interval;
pub mod metrics;
pub mod period;
pub mod segment;
pub mod task;
pub mod timeline;
pub mod traits;

pub use auth::{
    Access, Action, InMemoryPermissionStore, Permission, PermissionStore, RbacAuthorizer,
    Resource, ResourceType,
};
pub use compaction_config::{DataSourceCompactionConfig, DataSourceCompactionConfigBuilder};
pub use config::{CacheConfig, CoordinatorConfig, StrataConfig};
pub use dynamic_config::{CoordinatorDynamicConfig, CoordinatorDynamicConfigBuilder};
pub use error::{CoreError, CoreResult};
pub use ids::{CycleId, TaskId};
pub use interval::{parse_instant, Interval};
pub use period::{format_period, parse_period};
pub use segment::{DataSegment, ShardSpec};
pub use task::CompactionTaskSpec;
pub use timeline::{SegmentTimeline, TimelineBuilder, TimelineEntry};
pub use traits::{CompactionTaskSubmitter, SegmentTimelineSource};
