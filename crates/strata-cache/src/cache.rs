use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use strata_core::metrics::CACHE_LOOKUPS;
use strata_core::CacheConfig;

/// Cache key scoped by a namespace (typically the data source or query type)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedKey {
    pub namespace: String,
    pub key: Vec<u8>,
}

impl NamedKey {
    pub fn new(namespace: impl Into<String>, key: impl Into<Vec<u8>>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }

    fn weight(&self) -> usize {
        self.namespace.len() + self.key.len()
    }
}

/// Byte oriented result cache
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &NamedKey) -> Option<Arc<[u8]>>;

    async fn put(&self, key: NamedKey, value: Vec<u8>);

    async fn invalidate(&self, key: &NamedKey);
}

/// In-process result cache bounded by the total size of its entries
///
/// Eviction is handled by moka; every entry weighs its key plus value bytes.
#[derive(Clone)]
pub struct MokaResultCache {
    inner: MokaCache<NamedKey, Arc<[u8]>>,
}

impl MokaResultCache {
    /// Create a cache holding at most `max_capacity_bytes` of keys and values
    pub fn new(max_capacity_bytes: u64) -> Self {
        let inner = MokaCache::builder()
            .max_capacity(max_capacity_bytes)
            .weigher(|key: &NamedKey, value: &Arc<[u8]>| {
                u32::try_from(key.weight() + value.len()).unwrap_or(u32::MAX)
            })
            .build();

        Self { inner }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_capacity_bytes)
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Total weight of the cached entries
    pub fn weighted_size(&self) -> u64 {
        self.inner.weighted_size()
    }

    /// Apply pending evictions and bookkeeping (counts are eventually consistent)
    pub async fn sync(&self) {
        self.inner.run_pending_tasks().await;
    }
}

#[async_trait]
impl Cache for MokaResultCache {
    async fn get(&self, key: &NamedKey) -> Option<Arc<[u8]>> {
        let value = self.inner.get(key).await;
        let outcome = if value.is_some() { "hit" } else { "miss" };
        CACHE_LOOKUPS.with_label_values(&[outcome]).inc();
        value
    }

    async fn put(&self, key: NamedKey, value: Vec<u8>) {
        self.inner.insert(key, Arc::from(value)).await;
    }

    async fn invalidate(&self, key: &NamedKey) {
        self.inner.invalidate(key).await;
    }
}
