//! Cluster-wide coordinator settings that can change at runtime.
//!
//! Every field is optional in [`CoordinatorDynamicConfigBuilder`]; `build()`
//! fills gaps from the built-in defaults and `build_from()` from another
//! config, so partial updates can be layered over the current settings.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::compaction_config::DataSourceCompactionConfig;
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorDynamicConfig {
    millis_to_wait_before_deleting: u64,
    merge_bytes_limit: u64,
    merge_segments_limit: u32,
    max_segments_to_move: u32,
    replicant_lifetime: u32,
    replication_throttle_limit: u32,
    balancer_compute_threads: u32,
    emit_balancing_stats: bool,
    kill_data_source_whitelist: BTreeSet<String>,
    kill_all_data_sources: bool,
    /// 0 means unbounded.
    max_segments_in_node_loading_queue: u32,
    compaction_configs: Vec<DataSourceCompactionConfig>,
    compaction_task_slot_ratio: f64,
}

impl CoordinatorDynamicConfig {
    /// Key under which the config is stored by the cluster config store.
    pub const CONFIG_KEY: &'static str = "coordinator.config";

    pub const DEFAULT_MILLIS_TO_WAIT_BEFORE_DELETING: u64 = 15 * 60 * 1000;
    pub const DEFAULT_MERGE_BYTES_LIMIT: u64 = 524_288_000;
    pub const DEFAULT_MERGE_SEGMENTS_LIMIT: u32 = 100;
    pub const DEFAULT_MAX_SEGMENTS_TO_MOVE: u32 = 5;
    pub const DEFAULT_REPLICANT_LIFETIME: u32 = 15;
    pub const DEFAULT_REPLICATION_THROTTLE_LIMIT: u32 = 10;
    pub const DEFAULT_BALANCER_COMPUTE_THREADS: u32 = 1;
    pub const DEFAULT_MAX_SEGMENTS_IN_NODE_LOADING_QUEUE: u32 = 0;
    pub const DEFAULT_COMPACTION_TASK_SLOT_RATIO: f64 = 0.1;

    #[must_use]
    pub fn builder() -> CoordinatorDynamicConfigBuilder {
        CoordinatorDynamicConfigBuilder::default()
    }

    #[must_use]
    pub fn millis_to_wait_before_deleting(&self) -> u64 {
        self.millis_to_wait_before_deleting
    }

    #[must_use]
    pub fn merge_bytes_limit(&self) -> u64 {
        self.merge_bytes_limit
    }

    #[must_use]
    pub fn merge_segments_limit(&self) -> u32 {
        self.merge_segments_limit
    }

    #[must_use]
    pub fn max_segments_to_move(&self) -> u32 {
        self.max_segments_to_move
    }

    #[must_use]
    pub fn replicant_lifetime(&self) -> u32 {
        self.replicant_lifetime
    }

    #[must_use]
    pub fn replication_throttle_limit(&self) -> u32 {
        self.replication_throttle_limit
    }

    #[must_use]
    pub fn balancer_compute_threads(&self) -> u32 {
        self.balancer_compute_threads
    }

    #[must_use]
    pub fn emit_balancing_stats(&self) -> bool {
        self.emit_balancing_stats
    }

    #[must_use]
    pub fn kill_data_source_whitelist(&self) -> &BTreeSet<String> {
        &self.kill_data_source_whitelist
    }

    #[must_use]
    pub fn kill_all_data_sources(&self) -> bool {
        self.kill_all_data_sources
    }

    #[must_use]
    pub fn max_segments_in_node_loading_queue(&self) -> u32 {
        self.max_segments_in_node_loading_queue
    }

    #[must_use]
    pub fn compaction_configs(&self) -> &[DataSourceCompactionConfig] {
        &self.compaction_configs
    }

    /// Compaction configs keyed by data source. A later duplicate wins.
    #[must_use]
    pub fn compaction_configs_by_data_source(
        &self,
    ) -> std::collections::HashMap<String, DataSourceCompactionConfig> {
        self.compaction_configs
            .iter()
            .map(|config| (config.data_source().to_string(), config.clone()))
            .collect()
    }

    #[must_use]
    pub fn compaction_task_slot_ratio(&self) -> f64 {
        self.compaction_task_slot_ratio
    }

    fn validate(self) -> CoreResult<Self> {
        if self.kill_all_data_sources && !self.kill_data_source_whitelist.is_empty() {
            return Err(CoreError::invalid_config(
                "can't have killAllDataSources and non-empty killDataSourceWhitelist",
            ));
        }
        if !(0.0..=1.0).contains(&self.compaction_task_slot_ratio) {
            return Err(CoreError::invalid_config(format!(
                "compactionTaskSlotRatio must be within [0, 1], got {}",
                self.compaction_task_slot_ratio
            )));
        }
        Ok(self)
    }
}

impl Default for CoordinatorDynamicConfig {
    fn default() -> Self {
        Self {
            millis_to_wait_before_deleting: Self::DEFAULT_MILLIS_TO_WAIT_BEFORE_DELETING,
            merge_bytes_limit: Self::DEFAULT_MERGE_BYTES_LIMIT,
            merge_segments_limit: Self::DEFAULT_MERGE_SEGMENTS_LIMIT,
            max_segments_to_move: Self::DEFAULT_MAX_SEGMENTS_TO_MOVE,
            replicant_lifetime: Self::DEFAULT_REPLICANT_LIFETIME,
            replication_throttle_limit: Self::DEFAULT_REPLICATION_THROTTLE_LIMIT,
            balancer_compute_threads: Self::DEFAULT_BALANCER_COMPUTE_THREADS,
            emit_balancing_stats: false,
            kill_data_source_whitelist: BTreeSet::new(),
            kill_all_data_sources: false,
            max_segments_in_node_loading_queue: Self::DEFAULT_MAX_SEGMENTS_IN_NODE_LOADING_QUEUE,
            compaction_configs: Vec::new(),
            compaction_task_slot_ratio: Self::DEFAULT_COMPACTION_TASK_SLOT_RATIO,
        }
    }
}

impl<'de> Deserialize<'de> for CoordinatorDynamicConfig {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        CoordinatorDynamicConfigBuilder::deserialize(deserializer)?
            .build()
            .map_err(serde::de::Error::custom)
    }
}

/// The whitelist arrives either as `"a, b"` or as `["a", "b"]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WhitelistInput {
    Csv(String),
    List(Vec<String>),
}

impl From<WhitelistInput> for BTreeSet<String> {
    fn from(value: WhitelistInput) -> Self {
        match value {
            WhitelistInput::Csv(text) => parse_whitelist(&text),
            WhitelistInput::List(items) => items.into_iter().collect(),
        }
    }
}

fn parse_whitelist(text: &str) -> BTreeSet<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn deserialize_whitelist<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<BTreeSet<String>>, D::Error> {
    Ok(Option::<WhitelistInput>::deserialize(deserializer)?.map(Into::into))
}

/// Partial dynamic config; unset fields fall back when built.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorDynamicConfigBuilder {
    millis_to_wait_before_deleting: Option<u64>,
    merge_bytes_limit: Option<u64>,
    merge_segments_limit: Option<u32>,
    max_segments_to_move: Option<u32>,
    replicant_lifetime: Option<u32>,
    replication_throttle_limit: Option<u32>,
    balancer_compute_threads: Option<u32>,
    emit_balancing_stats: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_whitelist")]
    kill_data_source_whitelist: Option<BTreeSet<String>>,
    kill_all_data_sources: Option<bool>,
    max_segments_in_node_loading_queue: Option<u32>,
    compaction_configs: Option<Vec<DataSourceCompactionConfig>>,
    compaction_task_slot_ratio: Option<f64>,
}

impl CoordinatorDynamicConfigBuilder {
    #[must_use]
    pub fn millis_to_wait_before_deleting(mut self, value: u64) -> Self {
        self.millis_to_wait_before_deleting = Some(value);
        self
    }

    #[must_use]
    pub fn merge_bytes_limit(mut self, value: u64) -> Self {
        self.merge_bytes_limit = Some(value);
        self
    }

    #[must_use]
    pub fn merge_segments_limit(mut self, value: u32) -> Self {
        self.merge_segments_limit = Some(value);
        self
    }

    #[must_use]
    pub fn max_segments_to_move(mut self, value: u32) -> Self {
        self.max_segments_to_move = Some(value);
        self
    }

    #[must_use]
    pub fn replicant_lifetime(mut self, value: u32) -> Self {
        self.replicant_lifetime = Some(value);
        self
    }

    #[must_use]
    pub fn replication_throttle_limit(mut self, value: u32) -> Self {
        self.replication_throttle_limit = Some(value);
        self
    }

    #[must_use]
    pub fn balancer_compute_threads(mut self, value: u32) -> Self {
        self.balancer_compute_threads = Some(value);
        self
    }

    #[must_use]
    pub fn emit_balancing_stats(mut self, value: bool) -> Self {
        self.emit_balancing_stats = Some(value);
        self
    }

    #[must_use]
    pub fn kill_data_source_whitelist<I, S>(mut self, data_sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kill_data_source_whitelist = Some(data_sources.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn kill_all_data_sources(mut self, value: bool) -> Self {
        self.kill_all_data_sources = Some(value);
        self
    }

    #[must_use]
    pub fn max_segments_in_node_loading_queue(mut self, value: u32) -> Self {
        self.max_segments_in_node_loading_queue = Some(value);
        self
    }

    #[must_use]
    pub fn compaction_configs(mut self, configs: Vec<DataSourceCompactionConfig>) -> Self {
        self.compaction_configs = Some(configs);
        self
    }

    #[must_use]
    pub fn compaction_task_slot_ratio(mut self, value: f64) -> Self {
        self.compaction_task_slot_ratio = Some(value);
        self
    }

    /// Builds against the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for contradictory kill settings or a slot ratio
    /// outside `[0, 1]`.
    pub fn build(self) -> CoreResult<CoordinatorDynamicConfig> {
        self.build_from(&CoordinatorDynamicConfig::default())
    }

    /// Builds against `defaults`, keeping every field this builder leaves unset.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn build_from(
        self,
        defaults: &CoordinatorDynamicConfig,
    ) -> CoreResult<CoordinatorDynamicConfig> {
        CoordinatorDynamicConfig {
            millis_to_wait_before_deleting: self
                .millis_to_wait_before_deleting
                .unwrap_or(defaults.millis_to_wait_before_deleting),
            merge_bytes_limit: self.merge_bytes_limit.unwrap_or(defaults.merge_bytes_limit),
            merge_segments_limit: self
                .merge_segments_limit
                .unwrap_or(defaults.merge_segments_limit),
            max_segments_to_move: self
                .max_segments_to_move
                .unwrap_or(defaults.max_segments_to_move),
            replicant_lifetime: self.replicant_lifetime.unwrap_or(defaults.replicant_lifetime),
            replication_throttle_limit: self
                .replication_throttle_limit
                .unwrap_or(defaults.replication_throttle_limit),
            balancer_compute_threads: self
                .balancer_compute_threads
                .unwrap_or(defaults.balancer_compute_threads)
                .max(1),
            emit_balancing_stats: self
                .emit_balancing_stats
                .unwrap_or(defaults.emit_balancing_stats),
            kill_data_source_whitelist: self
                .kill_data_source_whitelist
                .unwrap_or_else(|| defaults.kill_data_source_whitelist.clone()),
            kill_all_data_sources: self
                .kill_all_data_sources
                .unwrap_or(defaults.kill_all_data_sources),
            max_segments_in_node_loading_queue: self
                .max_segments_in_node_loading_queue
                .unwrap_or(defaults.max_segments_in_node_loading_queue),
            compaction_configs: self
                .compaction_configs
                .unwrap_or_else(|| defaults.compaction_configs.clone()),
            compaction_task_slot_ratio: self
                .compaction_task_slot_ratio
                .unwrap_or(defaults.compaction_task_slot_ratio),
        }
        .validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordinatorDynamicConfig::builder().build().unwrap();
        assert_eq!(config, CoordinatorDynamicConfig::default());
        assert_eq!(config.millis_to_wait_before_deleting(), 900_000);
        assert_eq!(config.merge_bytes_limit(), 524_288_000);
        assert_eq!(config.merge_segments_limit(), 100);
        assert_eq!(config.max_segments_to_move(), 5);
        assert_eq!(config.balancer_compute_threads(), 1);
        assert!((config.compaction_task_slot_ratio() - 0.1).abs() < f64::EPSILON);
        assert!(config.compaction_configs().is_empty());
    }

    #[test]
    fn test_build_from_keeps_unset_fields() {
        let current = CoordinatorDynamicConfig::builder()
            .max_segments_to_move(50)
            .merge_segments_limit(7)
            .build()
            .unwrap();

        let updated = CoordinatorDynamicConfig::builder()
            .max_segments_to_move(9)
            .build_from(&current)
            .unwrap();

        assert_eq!(updated.max_segments_to_move(), 9);
        assert_eq!(updated.merge_segments_limit(), 7);
    }

    #[test]
    fn test_balancer_threads_clamped() {
        let config = CoordinatorDynamicConfig::builder()
            .balancer_compute_threads(0)
            .build()
            .unwrap();
        assert_eq!(config.balancer_compute_threads(), 1);
    }

    #[test]
    fn test_kill_all_conflicts_with_whitelist() {
        let result = CoordinatorDynamicConfig::builder()
            .kill_all_data_sources(true)
            .kill_data_source_whitelist(["wiki"])
            .build();
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }

    #[test]
    fn test_slot_ratio_bounds() {
        assert!(CoordinatorDynamicConfig::builder()
            .compaction_task_slot_ratio(1.5)
            .build()
            .is_err());
    }

    #[test]
    fn test_whitelist_from_csv_or_list() {
        let from_csv: CoordinatorDynamicConfigBuilder =
            serde_json::from_str(r#"{"killDataSourceWhitelist": " wiki, ,metrics "}"#).unwrap();
        let from_list: CoordinatorDynamicConfigBuilder =
            serde_json::from_str(r#"{"killDataSourceWhitelist": ["wiki", "metrics"]}"#).unwrap();

        let a = from_csv.build().unwrap();
        let b = from_list.build().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.kill_data_source_whitelist().len(), 2);
        assert!(a.kill_data_source_whitelist().contains("metrics"));
    }

    #[test]
    fn test_compaction_configs_by_data_source() {
        let config = CoordinatorDynamicConfig::builder()
            .compaction_configs(vec![
                DataSourceCompactionConfig::new("wiki").unwrap(),
                DataSourceCompactionConfig::new("metrics").unwrap(),
            ])
            .build()
            .unwrap();
        let by_ds = config.compaction_configs_by_data_source();
        assert_eq!(by_ds.len(), 2);
        assert!(by_ds.contains_key("wiki"));
    }

    #[test]
    fn test_json_round_trip() {
        let config = CoordinatorDynamicConfig::builder()
            .kill_data_source_whitelist(["wiki"])
            .compaction_configs(vec![DataSourceCompactionConfig::new("wiki").unwrap()])
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: CoordinatorDynamicConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
