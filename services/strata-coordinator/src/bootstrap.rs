//! Coordinator startup state
//!
//! Seeds the segment metadata store from a JSON manifest, loads the data
//! source compaction configs and wires both into the compaction duty.

use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use strata_compaction::{CoordinatorConfigManager, InMemorySegmentMetadata, SegmentCompactor};
use strata_core::{CoreError, CoreResult, DataSegment, DataSourceCompactionConfig, StrataConfig};
use tracing::{debug, info};

use crate::submitter::LoggingTaskSubmitter;

/// Everything the coordinator process runs on
pub struct Coordinator {
    pub metadata: Arc<InMemorySegmentMetadata>,
    pub configs: Arc<CoordinatorConfigManager>,
    pub submitter: Arc<LoggingTaskSubmitter>,
    pub compactor: SegmentCompactor,
}

/// Build the coordinator state from its config and optional seed files
///
/// # Errors
///
/// - `IoError` / `DeserializationError` if a seed file cannot be read
/// - `ValidationError` / `AlreadyExists` for a malformed or duplicate segment
/// - `InvalidConfig` for a rejected compaction config or duty period
pub async fn bootstrap(
    settings: &StrataConfig,
    segments: Option<&Path>,
    compaction: Option<&Path>,
) -> CoreResult<Coordinator> {
    let metadata = Arc::new(InMemorySegmentMetadata::new());
    if let Some(path) = segments {
        let published = metadata.publish_all(load_segment_manifest(path).await?)?;
        info!(
            path = %path.display(),
            segments = published,
            data_sources = metadata.data_sources().len(),
            "Segment manifest loaded"
        );
    }

    let configs = Arc::new(CoordinatorConfigManager::default());
    if let Some(path) = compaction {
        let loaded = load_compaction_configs(path).await?;
        let count = loaded.len();
        for config in loaded {
            debug!(data_source = %config.data_source(), "Loading compaction config");
            configs.set_compaction_config(None, config).await?;
        }
        info!(path = %path.display(), configs = count, "Compaction configs loaded");
    }

    let submitter = Arc::new(LoggingTaskSubmitter::new());
    let compactor = SegmentCompactor::new(
        settings.coordinator.clone(),
        metadata.clone(),
        submitter.clone(),
        configs.clone(),
    )?;

    Ok(Coordinator {
        metadata,
        configs,
        submitter,
        compactor,
    })
}

/// Read a JSON array of published segments
pub async fn load_segment_manifest(path: &Path) -> CoreResult<Vec<DataSegment>> {
    read_json(path).await
}

/// Read a JSON array of data source compaction configs
pub async fn load_compaction_configs(path: &Path) -> CoreResult<Vec<DataSourceCompactionConfig>> {
    read_json(path).await
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> CoreResult<T> {
    let data = tokio::fs::read(path).await?;
    serde_json::from_slice(&data).map_err(|e| {
        CoreError::DeserializationError(format!("{}: {}", path.display(), e))
    })
}
