//! Cache Events Module
//!
//! Observer list for item added / item removed notifications. Listeners are
//! always invoked after the store lock has been released, so delivery order
//! across threads is best effort.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::cache::CacheItem;

// == Cache Event ==
/// Change notification carrying the affected item.
#[derive(Debug, Clone)]
pub enum CacheEvent<K, V> {
    /// An item was stored by `add`
    ItemAdded(CacheItem<K, V>),
    /// An item was removed, explicitly or by a purge
    ItemRemoved(CacheItem<K, V>),
}

impl<K, V> CacheEvent<K, V> {
    pub fn item(&self) -> &CacheItem<K, V> {
        match self {
            CacheEvent::ItemAdded(item) | CacheEvent::ItemRemoved(item) => item,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<K, V> = Arc<dyn Fn(&CacheEvent<K, V>) + Send + Sync>;

// == Listener Registry ==
pub(crate) struct Listeners<K, V> {
    next_id: AtomicU64,
    entries: RwLock<Vec<(SubscriptionId, Listener<K, V>)>>,
}

impl<K, V> Listeners<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&CacheEvent<K, V>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push((id, Arc::new(listener)));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    // == Notify ==
    /// Delivers an event to every listener registered at the time of the call.
    ///
    /// A panicking listener is logged and skipped; it never reaches the caller
    /// of the cache operation.
    pub(crate) fn notify(&self, event: &CacheEvent<K, V>) {
        let snapshot: Vec<Listener<K, V>> = self
            .entries
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!("Cache listener panicked while handling a notification");
            }
        }
    }
}
