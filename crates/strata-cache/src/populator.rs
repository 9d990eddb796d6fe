//! Best-effort background cache population for result streams.

use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use strata_core::metrics::CACHE_POPULATIONS;
use strata_core::{CacheConfig, CoreError, CoreResult};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::cache::{Cache, NamedKey};

/// Converts result rows into the form stored in the cache.
pub trait CacheStrategy<T>: Send + Sync {
    type CacheType: Serialize + Send + 'static;

    fn prepare_for_cache(&self, value: &T) -> Self::CacheType;
}

type Conversion<C> = JoinHandle<CoreResult<C>>;

/// Populates the cache from a result stream without delaying its consumer.
///
/// Every item is converted on a bounded pool of workers while the stream is
/// being read. Once the stream ends, the converted values are serialized and
/// stored under the key in a detached task. Entries above `max_entry_size`
/// bytes are dropped (`0` means no limit); failures are only logged.
#[derive(Debug, Clone)]
pub struct BackgroundCachePopulator {
    workers: Arc<Semaphore>,
    max_entry_size: u64,
}

impl BackgroundCachePopulator {
    pub fn new(worker_threads: usize, max_entry_size: u64) -> Self {
        Self {
            workers: Arc::new(Semaphore::new(worker_threads.max(1))),
            max_entry_size,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.populator_threads, config.max_entry_size_bytes)
    }

    /// Returns `stream` unchanged, feeding each item to the cache in the background.
    ///
    /// If the consumer stops before the end of the stream nothing is cached.
    pub fn wrap<S, T, C>(
        &self,
        stream: S,
        strategy: Arc<C>,
        cache: Arc<dyn Cache>,
        key: NamedKey,
    ) -> impl Stream<Item = T> + Send
    where
        S: Stream<Item = T> + Send + 'static,
        T: Clone + Send + 'static,
        C: CacheStrategy<T> + 'static,
    {
        let pending: Arc<Mutex<Vec<Conversion<C::CacheType>>>> = Arc::new(Mutex::new(Vec::new()));
        let max_entry_size = self.max_entry_size;

        let workers = Arc::clone(&self.workers);
        let submitted = Arc::clone(&pending);
        let items = stream.inspect(move |item| {
            let value = item.clone();
            let strategy = Arc::clone(&strategy);
            let workers = Arc::clone(&workers);
            let handle: Conversion<C::CacheType> = tokio::spawn(async move {
                match workers.acquire_owned().await {
                    Ok(_permit) => Ok(strategy.prepare_for_cache(&value)),
                    Err(e) => Err(CoreError::internal(format!("cache worker pool closed: {}", e))),
                }
            });
            submitted.lock().push(handle);
        });

        let on_end = stream::once(async move {
            let conversions = std::mem::take(&mut *pending.lock());
            tokio::spawn(populate(conversions, cache, key, max_entry_size));
        })
        .filter_map(|()| futures::future::ready(None::<T>));

        items.chain(on_end)
    }
}

async fn populate<C: Serialize>(
    conversions: Vec<Conversion<C>>,
    cache: Arc<dyn Cache>,
    key: NamedKey,
    max_entry_size: u64,
) {
    let mut values = Vec::with_capacity(conversions.len());
    for conversion in conversions {
        let converted = conversion
            .await
            .map_err(|e| CoreError::internal(format!("cache conversion task failed: {}", e)))
            .and_then(|result| result);
        match converted {
            Ok(value) => values.push(value),
            Err(e) => {
                tracing::error!(namespace = %key.namespace, error = %e, "Background caching failed");
                CACHE_POPULATIONS.with_label_values(&["failed"]).inc();
                return;
            }
        }
    }

    let bytes = match serialize_entry(&values, max_entry_size) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            tracing::debug!(
                namespace = %key.namespace,
                max_entry_size,
                "Cache entry too large, not populating"
            );
            CACHE_POPULATIONS.with_label_values(&["too_large"]).inc();
            return;
        }
        Err(e) => {
            tracing::warn!(namespace = %key.namespace, error = %e, "Could not populate cache");
            CACHE_POPULATIONS.with_label_values(&["failed"]).inc();
            return;
        }
    };

    cache.put(key, bytes).await;
    CACHE_POPULATIONS.with_label_values(&["stored"]).inc();
}

/// Newline separated JSON values, `None` once the size limit is passed.
fn serialize_entry<C: Serialize>(values: &[C], max_entry_size: u64) -> CoreResult<Option<Vec<u8>>> {
    let mut bytes = Vec::new();
    for value in values {
        serde_json::to_writer(&mut bytes, value)?;
        bytes.push(b'\n');
        if max_entry_size > 0 && bytes.len() as u64 > max_entry_size {
            return Ok(None);
        }
    }
    Ok(Some(bytes))
}

/// Reads back the values stored by [`BackgroundCachePopulator`].
///
/// # Errors
///
/// Returns `DeserializationError` if the entry is not a sequence of `T`.
pub fn decode_cached<T: DeserializeOwned>(bytes: &[u8]) -> CoreResult<Vec<T>> {
    serde_json::Deserializer::from_slice(bytes)
        .into_iter::<T>()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| CoreError::DeserializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_entry_respects_limit() {
        let values = vec![1u32, 22, 333];
        let bytes = serialize_entry(&values, 0).unwrap().unwrap();
        assert_eq!(bytes, b"1\n22\n333\n");

        assert!(serialize_entry(&values, 5).unwrap().is_none());
        assert!(serialize_entry(&values, 9).unwrap().is_some());
    }

    #[test]
    fn test_decode_cached() {
        let decoded: Vec<u32> = decode_cached(b"1\n22\n333\n").unwrap();
        assert_eq!(decoded, vec![1, 22, 333]);

        assert!(decode_cached::<u32>(b"1\n\"x\"\n").is_err());
        assert!(decode_cached::<u32>(b"").unwrap().is_empty());
    }
}
