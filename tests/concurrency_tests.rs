//! Concurrency Tests
//!
//! Several threads hammering one store must never panic and must leave it
//! in a consistent final state.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use portable_cache::{CacheEvent, CacheItemPolicy, PortableCache};

use common::init_tracing;

const COUNT: usize = 10_000;

fn filled(count: usize) -> PortableCache<String, Arc<Vec<u8>>> {
    let cache = PortableCache::new();
    for i in 0..count {
        cache.add(i.to_string(), Arc::new(vec![1, 2, 3])).unwrap();
    }
    cache
}

#[test]
fn test_concurrent_add_distinct_keys() {
    init_tracing();
    let cache: PortableCache<String, Arc<Vec<u8>>> = PortableCache::new();

    let handles: Vec<_> = (0..2)
        .map(|worker| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..COUNT {
                    let stored = cache
                        .add(format!("{}-{}", worker, i), Arc::new(vec![1, 2, 3]))
                        .unwrap();
                    assert!(stored);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("adding thread panicked");
    }
    assert_eq!(cache.count(), (2 * COUNT) as i64);
}

#[test]
fn test_concurrent_add_same_keys() {
    let cache: PortableCache<String, usize> = PortableCache::new();

    let handles: Vec<_> = (0..2)
        .map(|worker| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..COUNT {
                    cache.add(i.to_string(), worker).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("adding thread panicked");
    }
    // Last writer wins per key, one entry each
    assert_eq!(cache.count(), COUNT as i64);
}

#[test]
fn test_concurrent_remove_same_keys() {
    let cache = filled(COUNT);
    assert_eq!(cache.count(), COUNT as i64);
    let removed = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let cache = cache.clone();
            let removed = Arc::clone(&removed);
            thread::spawn(move || {
                for i in 0..COUNT {
                    if cache.remove(&i.to_string()) {
                        removed.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("removing thread panicked");
    }
    assert_eq!(cache.count(), 0);
    // Each key is removed by exactly one thread
    assert_eq!(removed.load(Ordering::SeqCst), COUNT);
}

#[test]
fn test_concurrent_clear() {
    let cache = filled(COUNT);
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    cache.subscribe(move |event: &CacheEvent<String, Arc<Vec<u8>>>| {
        if matches!(event, CacheEvent::ItemRemoved(_)) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let cache = cache.clone();
            thread::spawn(move || cache.clear())
        })
        .collect();

    let cleared: i64 = handles
        .into_iter()
        .map(|handle| handle.join().expect("clearing thread panicked"))
        .sum();

    assert_eq!(cleared, COUNT as i64);
    assert_eq!(notified.load(Ordering::SeqCst), COUNT);
    assert_eq!(cache.count(), 0);
}

#[test]
fn test_readers_and_writers_with_sliding_items() {
    let cache: PortableCache<usize, usize> = PortableCache::new();
    let policy = CacheItemPolicy::sliding(Duration::from_secs(30));
    for i in 0..100 {
        cache.add_with_policy(i, i, Some(&policy)).unwrap();
    }

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = cache.clone();
            thread::spawn(move || {
                for round in 0..1_000 {
                    let key = round % 100;
                    assert_eq!(cache.get(&key), Some(key));
                }
            })
        })
        .collect();
    let writer = {
        let cache = cache.clone();
        let policy = policy.clone();
        thread::spawn(move || {
            for i in 100..1_100 {
                cache.add_with_policy(i, i, Some(&policy)).unwrap();
                if i % 3 == 0 {
                    cache.remove(&i);
                }
            }
        })
    };

    for handle in readers {
        handle.join().expect("reading thread panicked");
    }
    writer.join().expect("writing thread panicked");

    let removed = (100..1_100).filter(|i| i % 3 == 0).count();
    assert_eq!(cache.count(), (1_100 - removed) as i64);
}
