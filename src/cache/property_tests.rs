//! Property-Based Tests for Cache Module
//!
//! Uses proptest to verify the freshness and statistics properties of `TtlCache`.

use proptest::prelude::*;
use std::collections::HashMap;

use crate::cache::{Sweep, TtlCache};
use crate::clock::ManualClock;

// == Strategies ==
/// Generates cache keys
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9_]{1,16}"
}

/// Generates cache values
fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,64}"
}

/// A cache operation interleaved with clock movement
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Remove { key: String },
    Sweep,
    Advance { ms: u64 },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Remove { key }),
        Just(CacheOp::Sweep),
        (0u64..1_500).prop_map(|ms| CacheOp::Advance { ms }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Inserting then reading before the TTL elapses returns the value;
    // reading once the TTL has elapsed is a miss.
    #[test]
    fn prop_fresh_until_ttl(
        key in key_strategy(),
        value in value_strategy(),
        ttl in 1u64..100_000,
        elapsed in 0u64..200_000,
    ) {
        let clock = ManualClock::new(0);
        let mut cache = TtlCache::with_clock(ttl, clock.clone());
        cache.set(key.clone(), value.clone());

        clock.advance(elapsed);
        let read = cache.get(&key).cloned();

        if elapsed < ttl {
            prop_assert_eq!(read, Some(value));
        } else {
            prop_assert_eq!(read, None);
        }
    }

    // Sweeping never changes what `get` observes.
    #[test]
    fn prop_sweep_is_unobservable(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let clock = ManualClock::new(0);
        let mut swept = TtlCache::with_clock(1_000, clock.clone());
        let mut lazy = TtlCache::with_clock(1_000, clock.clone());

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    swept.set(key.clone(), value.clone());
                    lazy.set(key, value);
                }
                CacheOp::Get { key } => {
                    prop_assert_eq!(swept.get(&key).cloned(), lazy.get(&key).cloned());
                }
                CacheOp::Remove { key } => {
                    swept.remove(&key);
                    lazy.remove(&key);
                }
                CacheOp::Sweep => {
                    swept.sweep();
                }
                CacheOp::Advance { ms } => clock.advance(ms),
            }
        }
    }

    // A model map with explicit timestamps agrees with the cache on every read.
    #[test]
    fn prop_matches_model(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let ttl = 1_000;
        let clock = ManualClock::new(0);
        let mut cache = TtlCache::with_clock(ttl, clock.clone());
        let mut model: HashMap<String, (String, u64)> = HashMap::new();
        let mut now = 0u64;
        let mut expected_hits = 0u64;
        let mut expected_misses = 0u64;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    cache.set(key.clone(), value.clone());
                    model.insert(key, (value, now));
                }
                CacheOp::Get { key } => {
                    let expected = model
                        .get(&key)
                        .filter(|(_, at)| now - at < ttl)
                        .map(|(v, _)| v.clone());
                    if expected.is_some() { expected_hits += 1 } else { expected_misses += 1 }
                    prop_assert_eq!(cache.get(&key).cloned(), expected);
                }
                CacheOp::Remove { key } => {
                    cache.remove(&key);
                    model.remove(&key);
                }
                CacheOp::Sweep => {
                    cache.sweep();
                }
                CacheOp::Advance { ms } => {
                    clock.advance(ms);
                    now += ms;
                }
            }
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.total_entries, cache.len(), "Total entries mismatch");
    }

    // Overwriting a key keeps a single entry holding the latest value.
    #[test]
    fn prop_overwrite_semantics(
        key in key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy()
    ) {
        let mut cache = TtlCache::with_clock(1_000, ManualClock::new(0));

        cache.set(key.clone(), value1);
        cache.set(key.clone(), value2.clone());

        prop_assert_eq!(cache.get(&key).cloned(), Some(value2));
        prop_assert_eq!(cache.len(), 1);
    }
}
