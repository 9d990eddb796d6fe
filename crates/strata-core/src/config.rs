//! Static node configuration for strata services
//!
//! Sources, highest precedence first:
//! 1. Environment variables (`STRATA_COORDINATOR__PERIOD_SECS=30`)
//! 2. Config file named by the `STRATA_CONFIG` env var
//! 3. ./config/strata.{yaml,toml,json}
//! 4. /etc/strata/strata.{yaml,toml,json}
//! 5. Hardcoded defaults

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StrataConfig {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl StrataConfig {
    /// Load configuration from every source in precedence order
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Self::set_defaults(Config::builder())?;

        if let Ok(config_path) = std::env::var("STRATA_CONFIG") {
            builder = builder.add_source(File::with_name(&config_path).required(false));
        }

        builder = builder
            .add_source(File::with_name("./config/strata").required(false))
            .add_source(File::with_name("/etc/strata/strata").required(false));

        builder = builder.add_source(
            Environment::with_prefix("STRATA")
                .separator("__")
                .try_parsing(true),
        );

        let config: StrataConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, layered over the defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: StrataConfig = Self::set_defaults(Config::builder())?
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            // Coordinator duty loop
            .set_default("coordinator.period_secs", 60)?
            .set_default("coordinator.start_delay_secs", 0)?
            // Result cache
            .set_default("cache.max_entry_size_bytes", 1024 * 1024)?
            .set_default("cache.max_capacity_bytes", 256 * 1024 * 1024)?
            .set_default("cache.populator_threads", 2)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coordinator.period_secs == 0 {
            return Err(ConfigError::Message(
                "coordinator.period_secs must be > 0".to_string(),
            ));
        }

        if self.cache.max_capacity_bytes == 0 {
            return Err(ConfigError::Message(
                "cache.max_capacity_bytes must be > 0".to_string(),
            ));
        }

        if self.cache.populator_threads == 0 {
            return Err(ConfigError::Message(
                "cache.populator_threads must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Coordinator duty loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoordinatorConfig {
    /// Seconds between compaction duty cycles
    pub period_secs: u64,

    /// Seconds to wait before the first cycle
    pub start_delay_secs: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            period_secs: 60,
            start_delay_secs: 0,
        }
    }
}

impl CoordinatorConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_secs(self.start_delay_secs)
    }
}

/// Result cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Largest serialized entry the populator will store (0 = unbounded)
    pub max_entry_size_bytes: u64,

    /// Total weighted capacity of the cache in bytes
    pub max_capacity_bytes: u64,

    /// Concurrent conversions run by the background populator
    pub populator_threads: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entry_size_bytes: 1024 * 1024,
            max_capacity_bytes: 256 * 1024 * 1024,
            populator_threads: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_configuration() {
        let config = StrataConfig::default();

        assert_eq!(config.coordinator.period_secs, 60);
        assert_eq!(config.coordinator.start_delay_secs, 0);
        assert_eq!(config.cache.max_entry_size_bytes, 1024 * 1024);
        assert_eq!(config.cache.populator_threads, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = StrataConfig::default();

        config.coordinator.period_secs = 0;
        assert!(config.validate().is_err());

        config.coordinator.period_secs = 30;
        assert!(config.validate().is_ok());

        config.cache.populator_threads = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_layers_over_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[coordinator]\nperiod_secs = 5").unwrap();

        let config = StrataConfig::from_file(file.path()).unwrap();
        assert_eq!(config.coordinator.period(), Duration::from_secs(5));
        assert_eq!(config.cache.populator_threads, 2);
    }

    #[test]
    fn test_from_file_rejects_invalid_values() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[cache]\nmax_capacity_bytes = 0").unwrap();

        assert!(StrataConfig::from_file(file.path()).is_err());
    }
}
