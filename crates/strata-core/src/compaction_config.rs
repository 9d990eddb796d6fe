//! Per data source compaction settings.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::period::serde_period;

/// Validated compaction settings for one data source.
///
/// Immutable once built; replace the whole value on reconfiguration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceCompactionConfig {
    data_source: String,
    task_priority: i32,
    target_compaction_size_bytes: u64,
    #[serde(with = "serde_period")]
    skip_offset_from_latest: Duration,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    task_context: BTreeMap<String, String>,
}

impl DataSourceCompactionConfig {
    pub const DEFAULT_TASK_PRIORITY: i32 = 25;
    pub const DEFAULT_TARGET_COMPACTION_SIZE_BYTES: u64 = 400 * 1024 * 1024;

    /// Config with defaults for everything but the data source.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an empty data source name.
    pub fn new(data_source: impl Into<String>) -> CoreResult<Self> {
        Self::builder(data_source).build()
    }

    #[must_use]
    pub fn builder(data_source: impl Into<String>) -> DataSourceCompactionConfigBuilder {
        DataSourceCompactionConfigBuilder {
            data_source: data_source.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn data_source(&self) -> &str {
        &self.data_source
    }

    #[must_use]
    pub fn task_priority(&self) -> i32 {
        self.task_priority
    }

    #[must_use]
    pub fn target_compaction_size_bytes(&self) -> u64 {
        self.target_compaction_size_bytes
    }

    /// Trailing window, measured back from the newest data, that is never compacted.
    #[must_use]
    pub fn skip_offset_from_latest(&self) -> Duration {
        self.skip_offset_from_latest
    }

    #[must_use]
    pub fn task_context(&self) -> &BTreeMap<String, String> {
        &self.task_context
    }
}

/// Partial overrides merged against the defaults by [`build`](Self::build).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceCompactionConfigBuilder {
    data_source: String,
    task_priority: Option<i32>,
    target_compaction_size_bytes: Option<i64>,
    #[serde(default, with = "optional_period")]
    skip_offset_from_latest: Option<Duration>,
    #[serde(default)]
    task_context: BTreeMap<String, String>,
}

impl DataSourceCompactionConfigBuilder {
    #[must_use]
    pub fn task_priority(mut self, priority: i32) -> Self {
        self.task_priority = Some(priority);
        self
    }

    #[must_use]
    pub fn target_compaction_size_bytes(mut self, bytes: i64) -> Self {
        self.target_compaction_size_bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn skip_offset_from_latest(mut self, offset: Duration) -> Self {
        self.skip_offset_from_latest = Some(offset);
        self
    }

    #[must_use]
    pub fn task_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.task_context.insert(key.into(), value.into());
        self
    }

    /// Validates and freezes the config.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when the data source is empty, the target size
    /// is not positive, or the skip offset is negative.
    pub fn build(self) -> CoreResult<DataSourceCompactionConfig> {
        if self.data_source.trim().is_empty() {
            return Err(CoreError::invalid_config("dataSource must not be empty"));
        }

        let target = self
            .target_compaction_size_bytes
            .unwrap_or(DataSourceCompactionConfig::DEFAULT_TARGET_COMPACTION_SIZE_BYTES as i64);
        if target <= 0 {
            return Err(CoreError::invalid_config(format!(
                "targetCompactionSizeBytes must be > 0 for {}, got {}",
                self.data_source, target
            )));
        }

        let skip_offset = self.skip_offset_from_latest.unwrap_or_else(Duration::zero);
        if skip_offset < Duration::zero() {
            return Err(CoreError::invalid_config(format!(
                "skipOffsetFromLatest must not be negative for {}",
                self.data_source
            )));
        }

        Ok(DataSourceCompactionConfig {
            data_source: self.data_source,
            task_priority: self
                .task_priority
                .unwrap_or(DataSourceCompactionConfig::DEFAULT_TASK_PRIORITY),
            target_compaction_size_bytes: target as u64,
            skip_offset_from_latest: skip_offset,
            task_context: self.task_context,
        })
    }
}

impl<'de> Deserialize<'de> for DataSourceCompactionConfig {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        DataSourceCompactionConfigBuilder::deserialize(deserializer)?
            .build()
            .map_err(serde::de::Error::custom)
    }
}

mod optional_period {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer};

    use crate::period::parse_period;

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| parse_period(&text).map_err(serde::de::Error::custom))
            .transpose()
    }
}
