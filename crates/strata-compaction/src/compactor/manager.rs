use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use strata_core::metrics::{
    COMPACTION_CANDIDATES, COMPACTION_CYCLE_DURATION, COMPACTION_SEGMENTS_PENDING,
    COMPACTION_TASKS,
};
use strata_core::{
    CompactionTaskSpec, CompactionTaskSubmitter, CoordinatorConfig, CoreError, CoreResult,
    CycleId, SegmentTimelineSource, TaskId,
};
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::CompactionCycleStats;
use crate::config_manager::CoordinatorConfigManager;
use crate::policy::{CompactionSegmentSearchPolicy, NewestSegmentFirstPolicy, SegmentsToCompact};

/// Periodic compaction duty
///
/// Each cycle:
/// - reads the current compaction configs from the dynamic config
/// - takes a timeline snapshot from the metadata layer
/// - resets the search policy and drains every candidate batch
/// - submits one merge task per batch with at least two segments
///
/// Submission failures are logged and counted; the cycle moves on to the
/// next batch.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use strata_compaction::{CoordinatorConfigManager, InMemorySegmentMetadata, SegmentCompactor};
/// use strata_core::{CompactionTaskSubmitter, CoordinatorConfig};
///
/// # async fn example(submitter: Arc<dyn CompactionTaskSubmitter>) -> strata_core::CoreResult<()> {
/// let metadata = Arc::new(InMemorySegmentMetadata::new());
/// let configs = Arc::new(CoordinatorConfigManager::default());
/// let mut compactor =
///     SegmentCompactor::new(CoordinatorConfig::default(), metadata, submitter, configs)?;
///
/// // Start background worker
/// compactor.start_worker();
/// # Ok(())
/// # }
/// ```
pub struct SegmentCompactor {
    settings: CoordinatorConfig,
    source: Arc<dyn SegmentTimelineSource>,
    submitter: Arc<dyn CompactionTaskSubmitter>,
    configs: Arc<CoordinatorConfigManager>,
    policy: Arc<Mutex<Box<dyn CompactionSegmentSearchPolicy>>>,
    worker: Option<JoinHandle<()>>,
}

impl SegmentCompactor {
    /// Create new compactor using the newest-segment-first search
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the duty period is zero
    pub fn new(
        settings: CoordinatorConfig,
        source: Arc<dyn SegmentTimelineSource>,
        submitter: Arc<dyn CompactionTaskSubmitter>,
        configs: Arc<CoordinatorConfigManager>,
    ) -> CoreResult<Self> {
        if settings.period_secs == 0 {
            return Err(CoreError::invalid_config(
                "coordinator.period_secs must be > 0",
            ));
        }

        Ok(Self {
            settings,
            source,
            submitter,
            configs,
            policy: Arc::new(Mutex::new(Box::new(NewestSegmentFirstPolicy::new()))),
            worker: None,
        })
    }

    /// Replace the search policy
    #[must_use]
    pub fn with_policy(mut self, policy: Box<dyn CompactionSegmentSearchPolicy>) -> Self {
        self.policy = Arc::new(Mutex::new(policy));
        self
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Start background worker
    ///
    /// The first cycle runs after `start_delay_secs`, then every `period_secs`.
    pub fn start_worker(&mut self) {
        if self.worker.is_some() {
            tracing::warn!("Compaction worker already running");
            return;
        }

        let compactor = self.clone_for_worker();
        let period = self.settings.period();
        let start = tokio::time::Instant::now() + self.settings.start_delay();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(start, period);

            loop {
                ticker.tick().await;

                if let Err(e) = compactor.run_compaction_cycle().await {
                    tracing::error!(error = %e, "Compaction cycle failed");
                }
            }
        });

        self.worker = Some(handle);
        tracing::info!("Compaction worker started (period: {:?})", period);
    }

    /// Run one compaction cycle
    ///
    /// Called by the background worker; can also be invoked directly.
    ///
    /// # Errors
    ///
    /// Returns an error only if the timeline snapshot cannot be taken
    pub async fn run_compaction_cycle(&self) -> CoreResult<CompactionCycleStats> {
        let cycle_id = CycleId::new();
        let span = tracing::info_span!("compaction_cycle", cycle_id = %cycle_id);
        self.run_cycle().instrument(span).await
    }

    async fn run_cycle(&self) -> CoreResult<CompactionCycleStats> {
        tracing::info!("Starting compaction cycle");
        let timer = COMPACTION_CYCLE_DURATION.start_timer();
        let start = std::time::Instant::now();

        let dynamic = self.configs.current();
        let configs = dynamic.compaction_configs_by_data_source();
        if configs.is_empty() {
            tracing::debug!("No compaction configs, skipping cycle");
            return Ok(CompactionCycleStats::default());
        }
        let timelines = self.source.snapshot().await?;

        // Drain under the lock; nothing below awaits while it is held.
        let batches: Vec<SegmentsToCompact> = {
            let mut policy = self.policy.lock();
            policy.reset(&configs, &timelines);
            std::iter::from_fn(|| policy.next_segments()).collect()
        };

        let mut pending: BTreeMap<&str, i64> =
            configs.keys().map(|ds| (ds.as_str(), 0)).collect();
        let mut stats = CompactionCycleStats::default();

        for batch in batches {
            stats.candidates += 1;
            COMPACTION_CANDIDATES
                .with_label_values(&[batch.data_source.as_str()])
                .inc();

            if batch.segments.len() < 2 {
                tracing::debug!(
                    data_source = %batch.data_source,
                    interval = %batch.interval,
                    "Skipping candidate with a single segment"
                );
                stats.skipped += 1;
                COMPACTION_TASKS
                    .with_label_values(&[batch.data_source.as_str(), "skipped"])
                    .inc();
                continue;
            }

            let Some(config) = configs.get(&batch.data_source) else {
                continue;
            };
            if let Some(count) = pending.get_mut(batch.data_source.as_str()) {
                *count += batch.segments.len() as i64;
            }

            let task = CompactionTaskSpec {
                task_id: TaskId::new(),
                data_source: batch.data_source.clone(),
                interval: batch.interval,
                segments: batch.segments,
                task_priority: config.task_priority(),
                task_context: config.task_context().clone(),
                created_at: Utc::now(),
            };
            let segments = task.segments.len();

            match self.submitter.submit(task).await {
                Ok(task_id) => {
                    tracing::info!(
                        data_source = %batch.data_source,
                        interval = %batch.interval,
                        segments,
                        task_id = %task_id.prefixed(),
                        "Submitted compaction task"
                    );
                    stats.submitted += 1;
                    COMPACTION_TASKS
                        .with_label_values(&[batch.data_source.as_str(), "submitted"])
                        .inc();
                }
                Err(e) => {
                    tracing::error!(
                        data_source = %batch.data_source,
                        interval = %batch.interval,
                        error = %e,
                        "Failed to submit compaction task"
                    );
                    stats.failed += 1;
                    COMPACTION_TASKS
                        .with_label_values(&[batch.data_source.as_str(), "failed"])
                        .inc();
                }
            }
        }

        for (data_source, count) in pending {
            COMPACTION_SEGMENTS_PENDING
                .with_label_values(&[data_source])
                .set(count);
        }

        timer.observe_duration();
        tracing::info!(
            candidates = stats.candidates,
            submitted = stats.submitted,
            skipped = stats.skipped,
            failed = stats.failed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Compaction cycle complete"
        );

        Ok(stats)
    }

    /// Shutdown background worker
    pub async fn shutdown(&mut self) -> CoreResult<()> {
        if let Some(handle) = self.worker.take() {
            handle.abort();
            tracing::info!("Compaction worker shut down");
        }
        Ok(())
    }

    /// Clone for worker (without JoinHandle)
    fn clone_for_worker(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            source: Arc::clone(&self.source),
            submitter: Arc::clone(&self.submitter),
            configs: Arc::clone(&self.configs),
            policy: Arc::clone(&self.policy),
            worker: None,
        }
    }
}

impl Drop for SegmentCompactor {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.take() {
            handle.abort();
        }
    }
}
