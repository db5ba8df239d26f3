//! Async Cache Boundary
//!
//! The get/put contract consumed by async collaborators such as HTTP response
//! caching, layered over the synchronous store.

use std::future::Future;
use std::hash::Hash;

use tracing::{debug, warn};

use crate::cache::PortableCache;
use crate::error::{CacheError, Result};

/// Minimal async key/value cache contract.
pub trait AsyncCache<K, V>: Send + Sync {
    /// Returns the cached value, or None on a miss.
    fn get_async(&self, key: K) -> impl Future<Output = Option<V>> + Send;

    /// Stores a value under the cache's default policy.
    fn put_async(&self, key: K, value: V) -> impl Future<Output = Result<()>> + Send;
}

impl<K, V> AsyncCache<K, V> for PortableCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get_async(&self, key: K) -> Option<V> {
        // Lock waits are bounded but blocking, keep them off the async workers
        let cache = self.clone();
        match tokio::task::spawn_blocking(move || cache.get(&key)).await {
            Ok(value) => value,
            Err(err) => {
                warn!("Async cache get failed: {}", err);
                None
            }
        }
    }

    async fn put_async(&self, key: K, value: V) -> Result<()> {
        let cache = self.clone();
        let stored = tokio::task::spawn_blocking(move || cache.add(key, value))
            .await
            .map_err(|err| CacheError::Runtime(err.to_string()))??;
        if !stored {
            debug!("Async cache put dropped, lock busy");
        }
        Ok(())
    }
}
