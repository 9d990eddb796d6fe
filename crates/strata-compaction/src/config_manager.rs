use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use strata_core::{
    Action, CoordinatorDynamicConfig, CoreError, CoreResult, DataSourceCompactionConfig,
    RbacAuthorizer, Resource,
};

/// Audit entries kept by default; older ones are dropped first.
pub const DEFAULT_AUDIT_LIMIT: usize = 1_000;

/// Record of one accepted configuration change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigAuditEntry {
    pub key: String,
    pub author: Option<String>,
    pub comment: String,
    pub changed_at: DateTime<Utc>,
}

/// Holder of the live dynamic coordinator configuration.
///
/// Readers get a cheap `Arc` snapshot; writers replace the whole value.
/// When an authorizer is attached every change is checked against it.
#[derive(Debug)]
pub struct CoordinatorConfigManager {
    current: RwLock<Arc<CoordinatorDynamicConfig>>,
    audit: RwLock<VecDeque<ConfigAuditEntry>>,
    audit_limit: usize,
    authorizer: Option<RbacAuthorizer>,
}

impl CoordinatorConfigManager {
    #[must_use]
    pub fn new(initial: CoordinatorDynamicConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            audit: RwLock::new(VecDeque::new()),
            audit_limit: DEFAULT_AUDIT_LIMIT,
            authorizer: None,
        }
    }

    #[must_use]
    pub fn with_authorizer(mut self, authorizer: RbacAuthorizer) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    /// Caps the audit history at `limit` entries.
    #[must_use]
    pub fn with_audit_limit(mut self, limit: usize) -> Self {
        self.audit_limit = limit;
        self
    }

    /// Current configuration snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<CoordinatorDynamicConfig> {
        Arc::clone(&self.current.read())
    }

    /// Most recent accepted changes, oldest first, at most the audit limit.
    #[must_use]
    pub fn history(&self) -> Vec<ConfigAuditEntry> {
        self.audit.read().iter().cloned().collect()
    }

    /// Replaces the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` when the attached authorizer denies the change.
    pub async fn update(
        &self,
        identity: Option<&str>,
        config: CoordinatorDynamicConfig,
        comment: &str,
    ) -> CoreResult<()> {
        self.check(
            identity,
            &Resource::config(CoordinatorDynamicConfig::CONFIG_KEY),
        )
        .await?;

        *self.current.write() = Arc::new(config);
        self.record(CoordinatorDynamicConfig::CONFIG_KEY, identity, comment);
        tracing::info!(author = ?identity, comment, "Coordinator dynamic config updated");
        Ok(())
    }

    /// Adds or replaces the compaction config of one data source.
    pub async fn set_compaction_config(
        &self,
        identity: Option<&str>,
        config: DataSourceCompactionConfig,
    ) -> CoreResult<()> {
        let data_source = config.data_source().to_string();
        self.check(identity, &Resource::data_source(&data_source))
            .await?;

        self.replace_compaction_configs(|configs| {
            configs.retain(|c| c.data_source() != data_source);
            configs.push(config);
            Ok(())
        })?;
        self.record(&data_source, identity, "compaction config set");
        tracing::info!(data_source = %data_source, "Compaction config set");
        Ok(())
    }

    /// Removes the compaction config of one data source.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the data source has no compaction config.
    pub async fn remove_compaction_config(
        &self,
        identity: Option<&str>,
        data_source: &str,
    ) -> CoreResult<()> {
        self.check(identity, &Resource::data_source(data_source))
            .await?;

        self.replace_compaction_configs(|configs| {
            let before = configs.len();
            configs.retain(|c| c.data_source() != data_source);
            if configs.len() == before {
                return Err(CoreError::not_found("compactionConfig", data_source));
            }
            Ok(())
        })?;
        self.record(data_source, identity, "compaction config removed");
        tracing::info!(data_source, "Compaction config removed");
        Ok(())
    }

    fn replace_compaction_configs<F>(&self, edit: F) -> CoreResult<()>
    where
        F: FnOnce(&mut Vec<DataSourceCompactionConfig>) -> CoreResult<()>,
    {
        let mut current = self.current.write();
        let mut configs = current.compaction_configs().to_vec();
        edit(&mut configs)?;
        let updated = CoordinatorDynamicConfig::builder()
            .compaction_configs(configs)
            .build_from(&current)?;
        *current = Arc::new(updated);
        Ok(())
    }

    async fn check(&self, identity: Option<&str>, resource: &Resource) -> CoreResult<()> {
        match &self.authorizer {
            Some(authorizer) => authorizer
                .authorize(identity, resource, Action::Write)
                .await?
                .into_result(),
            None => Ok(()),
        }
    }

    fn record(&self, key: &str, identity: Option<&str>, comment: &str) {
        let mut audit = self.audit.write();
        audit.push_back(ConfigAuditEntry {
            key: key.to_string(),
            author: identity.map(str::to_string),
            comment: comment.to_string(),
            changed_at: Utc::now(),
        });
        while audit.len() > self.audit_limit {
            audit.pop_front();
        }
    }
}

impl Default for CoordinatorConfigManager {
    fn default() -> Self {
        Self::new(CoordinatorDynamicConfig::default())
    }
}
