//! Central metrics registry and metric definitions
//!
//! Metrics are registered lazily on first access using once_cell::Lazy.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge_vec, Histogram,
    IntCounterVec, IntGaugeVec,
};

// ===== Compaction Metrics =====

/// Candidate batches emitted by the search policy, by data source
pub static COMPACTION_CANDIDATES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "strata_compaction_candidates_total",
        "Total number of compaction candidate batches emitted",
        &["data_source"]
    )
    .expect("Failed to register compaction candidates counter")
});

/// Compaction task submissions by data source and outcome (submitted/skipped/failed)
pub static COMPACTION_TASKS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "strata_compaction_tasks_total",
        "Total number of compaction task submissions",
        &["data_source", "outcome"]
    )
    .expect("Failed to register compaction tasks counter")
});

/// Segments selected for compaction in the last duty cycle, by data source
pub static COMPACTION_SEGMENTS_PENDING: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "strata_compaction_segments_pending",
        "Segments selected for compaction in the last duty cycle",
        &["data_source"]
    )
    .expect("Failed to register compaction pending gauge")
});

/// Duty cycle duration histogram
pub static COMPACTION_CYCLE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "strata_compaction_cycle_duration_seconds",
        "Compaction duty cycle duration in seconds",
        // Buckets: 1ms, 5ms, 10ms, 50ms, 100ms, 500ms, 1s, 5s, 10s, 30s
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register compaction cycle duration histogram")
});

// ===== Cache Metrics =====

/// Background cache populations by outcome (stored/too_large/failed)
pub static CACHE_POPULATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "strata_cache_populations_total",
        "Total number of background cache population attempts",
        &["outcome"]
    )
    .expect("Failed to register cache populations counter")
});

/// Cache lookups by outcome (hit/miss)
pub static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "strata_cache_lookups_total",
        "Total number of result cache lookups",
        &["outcome"]
    )
    .expect("Failed to register cache lookups counter")
});

/// Force registration of every metric so they appear in the first scrape.
pub fn register_all() {
    let _ = &*COMPACTION_CANDIDATES;
    let _ = &*COMPACTION_TASKS;
    let _ = &*COMPACTION_SEGMENTS_PENDING;
    let _ = &*COMPACTION_CYCLE_DURATION;
    let _ = &*CACHE_POPULATIONS;
    let _ = &*CACHE_LOOKUPS;
}
