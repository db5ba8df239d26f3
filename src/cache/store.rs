//! Cache Store Module
//!
//! Main cache engine: a single mutex guarding the key to item map and the
//! background purge timer. Every operation waits for the lock only within a
//! bounded budget and degrades to a sentinel value when the budget runs out.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::cache::events::Listeners;
use crate::cache::{
    CacheEvent, CacheItem, CacheItemPolicy, CacheItemPriority, Clock, SubscriptionId, SystemClock,
};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::tasks::PurgeTimer;

/// Returned by counting operations when the lock budget ran out, and by
/// `purge_expired_items` when the store was empty.
pub const SENTINEL: i64 = -1;

// == Slot ==
/// A stored item plus its insertion sequence number.
#[derive(Debug)]
struct Slot<K, V> {
    item: CacheItem<K, V>,
    seq: u64,
}

// == Locked State ==
struct State<K, V> {
    entries: HashMap<K, Slot<K, V>>,
    next_seq: u64,
    purge_timer: Option<PurgeTimer>,
}

impl<K: Eq + Hash + Clone, V> State<K, V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_seq: 0,
            purge_timer: None,
        }
    }

    /// Stores an item, replacing any item under the same key.
    ///
    /// A live item being replaced keeps its insertion position. An expired one
    /// is returned so the caller can report its removal.
    fn insert(&mut self, item: CacheItem<K, V>, now: DateTime<Utc>) -> Option<CacheItem<K, V>> {
        match self.entries.entry(item.key().clone()) {
            Entry::Occupied(mut occupied) => {
                let expired = occupied.get().item.is_expired_at(now);
                let seq = if expired {
                    self.next_seq += 1;
                    self.next_seq
                } else {
                    occupied.get().seq
                };
                let old = occupied.insert(Slot { item, seq });
                expired.then_some(old.item)
            }
            Entry::Vacant(vacant) => {
                self.next_seq += 1;
                vacant.insert(Slot {
                    item,
                    seq: self.next_seq,
                });
                None
            }
        }
    }

    fn remove(&mut self, key: &K) -> Option<CacheItem<K, V>> {
        self.entries.remove(key).map(|slot| slot.item)
    }

    /// Removes every item matching `predicate`, newest first.
    fn remove_where<F>(&mut self, predicate: F) -> Vec<CacheItem<K, V>>
    where
        F: Fn(&CacheItem<K, V>) -> bool,
    {
        let mut doomed: Vec<(u64, K)> = self
            .entries
            .iter()
            .filter(|(_, slot)| predicate(&slot.item))
            .map(|(key, slot)| (slot.seq, key.clone()))
            .collect();
        doomed.sort_unstable_by(|a, b| b.0.cmp(&a.0));

        doomed
            .into_iter()
            .filter_map(|(_, key)| self.remove(&key))
            .collect()
    }

    /// Items in insertion order.
    fn ordered(&self) -> Vec<&CacheItem<K, V>> {
        let mut slots: Vec<&Slot<K, V>> = self.entries.values().collect();
        slots.sort_unstable_by_key(|slot| slot.seq);
        slots.into_iter().map(|slot| &slot.item).collect()
    }

    /// Time until the soonest finite expiration, None if nothing can expire.
    fn next_expiration(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.entries
            .values()
            .filter_map(|slot| slot.item.time_to_live(now))
            .min()
    }
}

struct Shared<K, V> {
    state: Mutex<State<K, V>>,
    listeners: Listeners<K, V>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

// == Portable Cache ==
/// Thread-safe keyed storage with time and priority based eviction.
///
/// The handle is cheap to clone; clones share the same store. Values are
/// returned by clone, so large payloads are best stored behind an `Arc`.
pub struct PortableCache<K, V> {
    shared: Arc<Shared<K, V>>,
}

impl<K, V> Clone for PortableCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V> PortableCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates an empty cache with the default configuration.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an empty cache reading the current time from `clock`.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::new()),
                listeners: Listeners::new(),
                config,
                clock,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    // == Subscriptions ==
    /// Registers a listener for item added / item removed notifications.
    ///
    /// Listeners run on the thread that performed the change, after the
    /// store lock has been released.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&CacheEvent<K, V>) + Send + Sync + 'static,
    {
        self.shared.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.listeners.unsubscribe(id)
    }

    // == Add ==
    /// Adds an item under the default policy.
    pub fn add(&self, key: K, value: V) -> Result<bool> {
        self.add_with_policy(key, value, None)
    }

    /// Adds a never-expiring item with the given priority.
    pub fn add_with_priority(&self, key: K, value: V, priority: CacheItemPriority) -> Result<bool> {
        self.add_with_policy(key, value, Some(&CacheItemPolicy::with_priority(priority)))
    }

    /// Adds an item, replacing any item stored under the same key.
    ///
    /// If the item can expire, the purge timer is (re)armed for the soonest
    /// expiration in the store. An item added notification follows once the
    /// lock is released.
    ///
    /// # Returns
    /// - `Ok(true)` if the item was stored
    /// - `Ok(false)` if the lock budget ran out and the item was dropped
    ///
    /// # Errors
    /// `CacheError::InvalidArgument` if the policy cannot be applied.
    pub fn add_with_policy(
        &self,
        key: K,
        value: V,
        policy: Option<&CacheItemPolicy>,
    ) -> Result<bool> {
        let policy = policy.unwrap_or(&self.shared.config.default_policy);
        let now = self.shared.clock.now();
        let item = CacheItem::created_at(key, value, policy, now)?;
        let added = (!self.shared.listeners.is_empty()).then(|| item.clone());

        let Some(mut state) = self.lock(self.shared.config.lock_wait, "add") else {
            return Ok(false);
        };
        let displaced = state.insert(item, now);
        if policy.has_finite_expiration() {
            self.schedule_purge(&mut state, now);
        }
        drop(state);

        if let Some(expired) = displaced {
            self.notify(CacheEvent::ItemRemoved(expired));
        }
        if let Some(item) = added {
            self.notify(CacheEvent::ItemAdded(item));
        }
        Ok(true)
    }

    // == Get ==
    /// Returns the value stored under `key` if present and not expired.
    ///
    /// A hit on a sliding item pushes its expiration forward. An expired item
    /// is removed as a side effect. Never fails: lock timeouts and panics in
    /// the key's `Hash`/`Eq` implementation both read as a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let lookup = panic::catch_unwind(AssertUnwindSafe(|| {
            let (value, sliding) = self.get_item(key, |item| {
                (
                    item.value().clone(),
                    item.sliding_expiration() != CacheItemPolicy::NO_SLIDING,
                )
            })?;
            if sliding {
                self.slide_expiration(key);
            }
            Some(value)
        }));

        match lookup {
            Ok(value) => value,
            Err(_) => {
                warn!("Cache lookup panicked; treating it as a miss");
                None
            }
        }
    }

    // == Contains ==
    /// Returns true if an unexpired item is stored under `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.get_item(key, |_| ()).is_some()
    }

    // == Remove ==
    /// Removes the item stored under `key`.
    ///
    /// Returns true if an item was removed, false if there was none or the
    /// lock budget ran out.
    pub fn remove(&self, key: &K) -> bool {
        let Some(mut state) = self.lock(self.shared.config.lock_wait, "remove") else {
            return false;
        };
        let removed = state.remove(key);
        drop(state);

        match removed {
            Some(item) => {
                self.notify(CacheEvent::ItemRemoved(item));
                true
            }
            None => false,
        }
    }

    // == Import ==
    /// Stores a pre-built item without an item added notification and without
    /// arming the purge timer.
    pub fn import(&self, item: CacheItem<K, V>) -> bool {
        let Some(mut state) = self.lock(self.shared.config.lock_wait, "import") else {
            return false;
        };
        let now = self.shared.clock.now();
        state.insert(item, now);
        true
    }

    // == Load ==
    /// Imports every item, then purges the ones already expired.
    ///
    /// Returns the result of `purge_expired_items`.
    pub fn load<I>(&self, items: I) -> i64
    where
        I: IntoIterator<Item = CacheItem<K, V>>,
    {
        let mut imported = 0usize;
        for item in items {
            if self.import(item) {
                imported += 1;
            }
        }
        debug!("Loaded {} cache items", imported);
        self.purge_expired_items()
    }

    // == Keys ==
    /// Snapshot of all keys in insertion order; empty if the lock budget ran out.
    pub fn keys(&self) -> Vec<K> {
        self.keys_matching(|_| true)
    }

    /// Snapshot of the keys accepted by `predicate`, in insertion order.
    pub fn keys_matching<F>(&self, predicate: F) -> Vec<K>
    where
        F: Fn(&K) -> bool,
    {
        let Some(state) = self.lock(self.shared.config.lock_wait, "keys") else {
            return Vec::new();
        };
        state
            .ordered()
            .into_iter()
            .map(|item| item.key())
            .filter(|key| predicate(*key))
            .cloned()
            .collect()
    }

    // == Snapshot ==
    /// Copies of all stored items in insertion order; empty if the lock
    /// budget ran out.
    pub fn snapshot(&self) -> Vec<CacheItem<K, V>> {
        let Some(state) = self.lock(self.shared.config.lock_wait, "snapshot") else {
            return Vec::new();
        };
        state.ordered().into_iter().cloned().collect()
    }

    // == Count ==
    /// Number of stored items, or `SENTINEL` if the lock budget ran out.
    pub fn count(&self) -> i64 {
        match self.lock(self.shared.config.lock_wait, "count") {
            Some(state) => state.entries.len() as i64,
            None => SENTINEL,
        }
    }

    // == Clear ==
    /// Removes every item, newest first, with one removal notification each.
    ///
    /// Returns the number removed, or `SENTINEL` if the lock budget ran out.
    pub fn clear(&self) -> i64 {
        let Some(mut state) = self.lock(self.shared.config.lock_wait, "clear") else {
            return SENTINEL;
        };
        let removed = state.remove_where(|_| true);
        drop(state);

        debug!("Cleared {} cache items", removed.len());
        self.notify_removed(removed)
    }

    // == Purge Expired ==
    /// Removes every expired item.
    ///
    /// # Returns
    /// - The number of items purged, possibly 0
    /// - `SENTINEL` if the store was empty; the purge timer is retired
    /// - `SENTINEL` if the lock budget ran out
    pub fn purge_expired_items(&self) -> i64 {
        let Some(mut state) = self.lock(self.shared.config.lock_wait, "purge_expired_items")
        else {
            return SENTINEL;
        };
        if state.entries.is_empty() {
            // Dropping the timer disposes it
            if state.purge_timer.take().is_some() {
                debug!("Cache is empty, purge timer retired");
            }
            return SENTINEL;
        }
        let now = self.shared.clock.now();
        let purged = state.remove_where(|item| item.is_expired_at(now));
        drop(state);

        if !purged.is_empty() {
            debug!("Purged {} expired cache items", purged.len());
        }
        self.notify_removed(purged)
    }

    // == Purge Normal Priorities ==
    /// Removes every `Normal` priority item regardless of expiration.
    ///
    /// Returns the number removed, or `SENTINEL` if the lock budget ran out.
    pub fn purge_normal_priorities(&self) -> i64 {
        let Some(mut state) = self.lock(self.shared.config.lock_wait, "purge_normal_priorities")
        else {
            return SENTINEL;
        };
        let removed = state.remove_where(|item| item.priority() == CacheItemPriority::Normal);
        drop(state);

        debug!("Purged {} normal priority cache items", removed.len());
        self.notify_removed(removed)
    }

    // == Internal Helpers ==
    fn lock(&self, budget: Duration, operation: &str) -> Option<MutexGuard<'_, State<K, V>>> {
        let guard = self.shared.state.try_lock_for(budget);
        if guard.is_none() {
            warn!(
                "Cache lock not acquired within {:?} for {}",
                budget, operation
            );
        }
        guard
    }

    /// Reads the live item under `key`, removing it instead if it has expired.
    fn get_item<R, F>(&self, key: &K, read: F) -> Option<R>
    where
        F: FnOnce(&CacheItem<K, V>) -> R,
    {
        let mut state = self.lock(self.shared.config.lock_wait, "get")?;
        let now = self.shared.clock.now();
        let expired = match state.entries.get(key) {
            Some(slot) if !slot.item.is_expired_at(now) => return Some(read(&slot.item)),
            Some(_) => true,
            None => false,
        };
        let expired = if expired { state.remove(key) } else { None };
        drop(state);

        if let Some(item) = expired {
            debug!("Removed expired cache item on access");
            self.notify(CacheEvent::ItemRemoved(item));
        }
        None
    }

    /// Best-effort sliding update under the shorter lock budget.
    fn slide_expiration(&self, key: &K) {
        let Some(mut state) = self.shared.state.try_lock_for(self.shared.config.sliding_lock_wait)
        else {
            debug!("Sliding expiration update skipped, lock busy");
            return;
        };
        let now = self.shared.clock.now();
        if let Some(slot) = state.entries.get_mut(key) {
            slot.item.update_expiration_policy(now);
        }
    }

    /// (Re)arms the purge timer for the soonest finite expiration.
    fn schedule_purge(&self, state: &mut State<K, V>, now: DateTime<Utc>) {
        let delay = match state.next_expiration(now) {
            Some(delay) if !delay.is_zero() => delay,
            _ => {
                debug!("Purge timer not armed, an item is already due");
                return;
            }
        };

        if let Some(timer) = state.purge_timer.as_ref().filter(|t| !t.is_disposed()) {
            timer.change(delay, delay);
            return;
        }

        let weak: Weak<Shared<K, V>> = Arc::downgrade(&self.shared);
        let started = PurgeTimer::start(
            &self.shared.config.purge_thread_name,
            delay,
            delay,
            move || {
                if let Some(shared) = weak.upgrade() {
                    PortableCache { shared }.purge_expired_items();
                }
            },
        );
        match started {
            Ok(timer) => state.purge_timer = Some(timer),
            Err(err) => warn!("Failed to start purge timer: {}", err),
        }
    }

    fn notify(&self, event: CacheEvent<K, V>) {
        self.shared.listeners.notify(&event);
    }

    fn notify_removed(&self, removed: Vec<CacheItem<K, V>>) -> i64 {
        let count = removed.len() as i64;
        for item in removed {
            self.notify(CacheEvent::ItemRemoved(item));
        }
        count
    }

    #[cfg(test)]
    fn has_active_timer(&self) -> bool {
        self.shared
            .state
            .lock()
            .purge_timer
            .as_ref()
            .is_some_and(|timer| !timer.is_disposed())
    }
}

impl<K, V> Default for PortableCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for PortableCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortableCache")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}
