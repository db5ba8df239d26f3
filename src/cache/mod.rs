//! Cache Module
//!
//! Provides in-memory caching with absolute and sliding expiration, priority
//! eviction, a background purge timer and change notifications.

mod async_cache;
mod clock;
mod events;
mod item;
mod policy;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use async_cache::AsyncCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{CacheEvent, SubscriptionId};
pub use item::CacheItem;
pub use policy::{CacheItemPolicy, CacheItemPriority};
pub use store::{PortableCache, SENTINEL};
