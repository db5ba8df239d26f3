//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store against a plain map model.

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cache::{CacheEvent, CacheItemPriority, PortableCache};

// == Strategies ==
/// Generates cache keys from a small alphabet so operations collide
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e][0-3]".prop_map(|s| s)
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,32}".prop_map(|s| s)
}

fn priority_strategy() -> impl Strategy<Value = CacheItemPriority> {
    prop_oneof![
        Just(CacheItemPriority::Normal),
        Just(CacheItemPriority::High),
    ]
}

/// A sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Add {
        key: String,
        value: String,
        priority: CacheItemPriority,
    },
    Get {
        key: String,
    },
    Remove {
        key: String,
    },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy(), priority_strategy()).prop_map(
            |(key, value, priority)| CacheOp::Add {
                key,
                value,
                priority
            }
        ),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Remove { key }),
    ]
}

/// Applies operations to a store and a model map side by side.
fn apply_ops(
    ops: Vec<CacheOp>,
) -> (
    PortableCache<String, String>,
    HashMap<String, (String, CacheItemPriority)>,
) {
    let store = PortableCache::new();
    let mut model = HashMap::new();

    for op in ops {
        match op {
            CacheOp::Add {
                key,
                value,
                priority,
            } => {
                store
                    .add_with_priority(key.clone(), value.clone(), priority)
                    .unwrap();
                model.insert(key, (value, priority));
            }
            CacheOp::Get { key } => {
                let expected = model.get(&key).map(|(value, _)| value.clone());
                assert_eq!(store.get(&key), expected);
            }
            CacheOp::Remove { key } => {
                assert_eq!(store.remove(&key), model.remove(&key).is_some());
            }
        }
    }
    (store, model)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // For any sequence of operations, the store holds exactly the model's entries.
    #[test]
    fn prop_store_matches_model(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let (store, model) = apply_ops(ops);

        prop_assert_eq!(store.count(), model.len() as i64);
        for (key, (value, _)) in &model {
            prop_assert_eq!(store.get(key), Some(value.clone()));
        }
    }

    // Re-adding a key replaces the value and leaves the count unchanged.
    #[test]
    fn prop_readd_replaces(key in key_strategy(), v1 in value_strategy(), v2 in value_strategy()) {
        let store = PortableCache::new();

        store.add(key.clone(), v1).unwrap();
        let before = store.count();
        store.add(key.clone(), v2.clone()).unwrap();

        prop_assert_eq!(store.count(), before);
        prop_assert_eq!(store.get(&key), Some(v2));
    }

    // Priority purge removes exactly the normal priority entries.
    #[test]
    fn prop_purge_normal_keeps_high(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let (store, model) = apply_ops(ops);
        let normal = model
            .values()
            .filter(|(_, priority)| *priority == CacheItemPriority::Normal)
            .count();

        prop_assert_eq!(store.purge_normal_priorities(), normal as i64);
        prop_assert_eq!(store.count(), (model.len() - normal) as i64);
        for (key, (_, priority)) in &model {
            prop_assert_eq!(store.contains(key), *priority == CacheItemPriority::High);
        }
    }

    // Clear reports one removal per stored entry.
    #[test]
    fn prop_clear_notifies_each_item(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let (store, model) = apply_ops(ops);
        let removed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&removed);
        store.subscribe(move |event: &CacheEvent<String, String>| {
            if matches!(event, CacheEvent::ItemRemoved(_)) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        prop_assert_eq!(store.clear(), model.len() as i64);
        prop_assert_eq!(removed.load(Ordering::SeqCst), model.len());
        prop_assert_eq!(store.count(), 0);
    }
}
