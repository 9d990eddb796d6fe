//! Compaction duty
//!
//! The coordinator runs one cycle per period:
//!
//! ```text
//!   CoordinatorConfigManager ──► compaction configs ─┐
//!                                                    ├─► search policy ──► batches
//!   SegmentTimelineSource ────► timeline snapshot ───┘                       │
//!                                                                            ▼
//!                                                          CompactionTaskSubmitter
//! ```
//!
//! The policy is reset at the start of every cycle and drained to exhaustion
//! before any task is submitted.

mod manager;
mod stats;

pub use manager::SegmentCompactor;
pub use stats::CompactionCycleStats;
