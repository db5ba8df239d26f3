//! Portable Cache - A thread-safe in-memory cache
//!
//! Provides keyed storage with absolute and sliding expiration, priority based
//! bulk eviction, a lazily armed background purge timer and add/remove
//! notifications.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{
    AsyncCache, CacheEvent, CacheItem, CacheItemPolicy, CacheItemPriority, Clock, ManualClock,
    PortableCache, SubscriptionId, SystemClock,
};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::PurgeTimer;
