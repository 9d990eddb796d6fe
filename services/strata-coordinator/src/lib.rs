//! Coordinator service wiring: logging, startup state and task submission.

pub mod bootstrap;
pub mod submitter;
pub mod telemetry;

pub use bootstrap::{bootstrap, load_compaction_configs, load_segment_manifest, Coordinator};
pub use submitter::LoggingTaskSubmitter;
