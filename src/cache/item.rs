//! Cache Item Module
//!
//! Defines the structure for individual cache entries with absolute and
//! sliding expiration support.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheItemPolicy, CacheItemPriority};
use crate::error::{CacheError, Result};

// == Cache Item ==
/// A stored entry: key, value and the expiration metadata derived from the
/// policy it was added under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheItem<K, V> {
    key: K,
    value: V,
    created: DateTime<Utc>,
    absolute_expiration: DateTime<Utc>,
    sliding_expiration: Duration,
    priority: CacheItemPriority,
}

impl<K, V> CacheItem<K, V> {
    // == Constructor ==
    /// Creates a new cache item stamped with the current UTC time.
    ///
    /// # Errors
    /// `CacheError::InvalidArgument` when the sliding window cannot be applied
    /// to the creation time.
    pub fn new(key: K, value: V, policy: &CacheItemPolicy) -> Result<Self> {
        Self::created_at(key, value, policy, Utc::now())
    }

    /// Creates a new cache item as if it was inserted at `now`.
    ///
    /// A non-zero sliding window overrides the policy's absolute expiration:
    /// the item then expires at `now + sliding_expiration`.
    pub fn created_at(
        key: K,
        value: V,
        policy: &CacheItemPolicy,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let absolute_expiration = if policy.sliding_expiration == CacheItemPolicy::NO_SLIDING {
            policy.absolute_expiration
        } else {
            slide(now, policy.sliding_expiration).ok_or_else(|| {
                CacheError::InvalidArgument(format!(
                    "sliding expiration {:?} cannot be applied to {}",
                    policy.sliding_expiration, now
                ))
            })?
        };

        Ok(Self {
            key,
            value,
            created: now,
            absolute_expiration,
            sliding_expiration: policy.sliding_expiration,
            priority: policy.priority,
        })
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    /// UTC time the item was created.
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// UTC time the item expires.
    pub fn absolute_expiration(&self) -> DateTime<Utc> {
        self.absolute_expiration
    }

    /// Period the item must be read within, or `NO_SLIDING`.
    pub fn sliding_expiration(&self) -> Duration {
        self.sliding_expiration
    }

    pub fn priority(&self) -> CacheItemPriority {
        self.priority
    }

    // == Is Expired ==
    /// Compares the absolute expiration with the current UTC time.
    pub fn has_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns true if the item's expiration lies strictly before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.absolute_expiration < now
    }

    // == Time To Live ==
    /// Returns the time left until expiration, or None if the item never expires.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the item is already due
    /// - `Some(remaining)` if the item expires in the future
    /// - `None` if the item has an infinite absolute expiration and no sliding
    pub fn time_to_live(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.sliding_expiration == CacheItemPolicy::NO_SLIDING
            && self.absolute_expiration == CacheItemPolicy::INFINITE_OFFSET
        {
            return None;
        }
        Some(
            (self.absolute_expiration - now)
                .to_std()
                .unwrap_or(Duration::ZERO),
        )
    }

    // == Sliding Update ==
    /// Pushes a sliding expiration forward to `now + sliding_expiration`.
    ///
    /// The new expiration is only written when it moves forward by at least
    /// `MIN_SLIDING_UPDATE_DELTA`, or when it lies before the current one.
    /// Returns true if the stored expiration changed.
    pub(crate) fn update_expiration_policy(&mut self, now: DateTime<Utc>) -> bool {
        if self.sliding_expiration == CacheItemPolicy::NO_SLIDING {
            return false;
        }
        let Some(candidate) = slide(now, self.sliding_expiration) else {
            return false;
        };
        let min_delta = TimeDelta::from_std(CacheItemPolicy::MIN_SLIDING_UPDATE_DELTA)
            .unwrap_or_else(|_| TimeDelta::zero());

        if candidate - self.absolute_expiration >= min_delta || candidate < self.absolute_expiration
        {
            self.absolute_expiration = candidate;
            return true;
        }
        false
    }
}

// == Utility Functions ==
/// Adds a sliding window to an instant, None when out of range.
fn slide(now: DateTime<Utc>, window: Duration) -> Option<DateTime<Utc>> {
    TimeDelta::from_std(window)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
}
