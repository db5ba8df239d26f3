//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::hash::Hash;
use std::time::Duration;

use portable_cache::PortableCache;
use tracing_subscriber::EnvFilter;

/// Installs a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "portable_cache=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Waits, then reads from the cache.
pub async fn get_with_delay<K, V>(cache: &PortableCache<K, V>, key: &K, delay_ms: u64) -> Option<V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    cache.get(key)
}
