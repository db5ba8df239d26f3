//! Configuration Module
//!
//! Handles the per-store settings: lock budgets, default item policy and the
//! purge thread name. Values can be loaded from environment variables.

use std::env;
use std::time::Duration;

use crate::cache::CacheItemPolicy;

/// Default budget for acquiring the store lock, in milliseconds.
pub const DEFAULT_LOCK_WAIT_MS: u64 = 1000;

/// Default budget for the best-effort sliding expiration update, in milliseconds.
pub const DEFAULT_SLIDING_LOCK_WAIT_MS: u64 = 500;

/// Default name of the background purge thread.
pub const DEFAULT_PURGE_THREAD_NAME: &str = "portable-cache-purge";

/// Cache configuration parameters.
///
/// Passed to a store at construction time; there is no process-wide default
/// instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum time an operation waits for the store lock
    pub lock_wait: Duration,
    /// Maximum time a read waits to extend a sliding expiration
    pub sliding_lock_wait: Duration,
    /// Policy applied when an item is added without one
    pub default_policy: CacheItemPolicy,
    /// Name given to the background purge thread
    pub purge_thread_name: String,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_LOCK_WAIT_MS` - Lock budget in milliseconds (default: 1000)
    /// - `CACHE_SLIDING_LOCK_WAIT_MS` - Sliding update budget in milliseconds (default: 500)
    /// - `CACHE_PURGE_THREAD_NAME` - Purge thread name (default: portable-cache-purge)
    pub fn from_env() -> Self {
        Self {
            lock_wait: Duration::from_millis(
                env::var("CACHE_LOCK_WAIT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_LOCK_WAIT_MS),
            ),
            sliding_lock_wait: Duration::from_millis(
                env::var("CACHE_SLIDING_LOCK_WAIT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_SLIDING_LOCK_WAIT_MS),
            ),
            default_policy: CacheItemPolicy::default(),
            purge_thread_name: env::var("CACHE_PURGE_THREAD_NAME")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_PURGE_THREAD_NAME.to_string()),
        }
    }

    /// Replaces the policy used for items added without an explicit one.
    pub fn with_default_policy(mut self, policy: CacheItemPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Replaces both lock budgets.
    pub fn with_lock_waits(mut self, lock_wait: Duration, sliding_lock_wait: Duration) -> Self {
        self.lock_wait = lock_wait;
        self.sliding_lock_wait = sliding_lock_wait;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lock_wait: Duration::from_millis(DEFAULT_LOCK_WAIT_MS),
            sliding_lock_wait: Duration::from_millis(DEFAULT_SLIDING_LOCK_WAIT_MS),
            default_policy: CacheItemPolicy::default(),
            purge_thread_name: DEFAULT_PURGE_THREAD_NAME.to_string(),
        }
    }
}
