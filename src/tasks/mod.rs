//! Background Tasks Module
//!
//! Contains the background work that runs alongside a cache store.
//!
//! # Tasks
//! - Purge Timer: Removes expired cache items at the soonest known expiration

mod purge_timer;

pub use purge_timer::PurgeTimer;
