//! Cache Policy Module
//!
//! Defines item priorities and the expiration policy an item is stored under.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// == Cache Item Priority ==
/// Storage priority of a cache item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CacheItemPriority {
    /// Normal storage priority. Removed by `purge_normal_priorities`.
    #[default]
    Normal,
    /// High storage priority. Items must be removed explicitly or expire on
    /// their own; bulk priority eviction skips them.
    High,
}

// == Cache Item Policy ==
/// Caching policy under which an item is stored.
///
/// When `sliding_expiration` is non-zero it overrides `absolute_expiration`:
/// the item expires `sliding_expiration` after its last read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheItemPolicy {
    /// Storage priority
    pub priority: CacheItemPriority,
    /// Absolute UTC expiration instant, `INFINITE_OFFSET` for never
    pub absolute_expiration: DateTime<Utc>,
    /// Sliding expiration window, `NO_SLIDING` to disable
    pub sliding_expiration: Duration,
}

impl CacheItemPolicy {
    /// Minimum forward move of a sliding expiration before it is rewritten.
    pub const MIN_SLIDING_UPDATE_DELTA: Duration = Duration::from_millis(100);

    /// Absolute expiration meaning "never expires".
    pub const INFINITE_OFFSET: DateTime<Utc> = DateTime::<Utc>::MAX_UTC;

    /// Sliding expiration meaning "no sliding".
    pub const NO_SLIDING: Duration = Duration::ZERO;

    // == Constructor ==
    /// Creates a new policy.
    ///
    /// # Arguments
    /// * `priority` - Storage priority
    /// * `absolute_expiration` - UTC instant after which the item expires
    /// * `sliding_expiration` - Window re-applied on every read, `NO_SLIDING` to disable
    pub fn new(
        priority: CacheItemPriority,
        absolute_expiration: DateTime<Utc>,
        sliding_expiration: Duration,
    ) -> Self {
        Self {
            priority,
            absolute_expiration,
            sliding_expiration,
        }
    }

    /// Normal priority policy expiring at a fixed instant.
    pub fn absolute(at: DateTime<Utc>) -> Self {
        Self::new(CacheItemPriority::Normal, at, Self::NO_SLIDING)
    }

    /// Normal priority policy expiring `window` after the last read.
    pub fn sliding(window: Duration) -> Self {
        Self::new(CacheItemPriority::Normal, Self::INFINITE_OFFSET, window)
    }

    /// Never-expiring policy with the given priority.
    pub fn with_priority(priority: CacheItemPriority) -> Self {
        Self::new(priority, Self::INFINITE_OFFSET, Self::NO_SLIDING)
    }

    /// Returns true if items stored under this policy can expire.
    pub fn has_finite_expiration(&self) -> bool {
        self.sliding_expiration != Self::NO_SLIDING
            || self.absolute_expiration != Self::INFINITE_OFFSET
    }
}

impl Default for CacheItemPolicy {
    /// Normal priority, infinite absolute expiration, no sliding.
    fn default() -> Self {
        Self::with_priority(CacheItemPriority::Normal)
    }
}
