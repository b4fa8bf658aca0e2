//! TTL Cache Module
//!
//! Generic expiring key/value store. Expiry is enforced on every read;
//! `sweep` only bounds memory for keys nobody reads again.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use crate::cache::{CacheEntry, CacheStats, Sweep};
use crate::clock::{Clock, SystemClock};

// == TTL Cache ==
/// In-memory cache whose entries go stale `ttl_ms` after insertion.
#[derive(Debug)]
pub struct TtlCache<K, V, C = SystemClock> {
    /// Key-value storage
    entries: HashMap<K, CacheEntry<V>>,
    /// Freshness window, fixed at construction
    ttl_ms: u64,
    /// Source of "now"
    clock: C,
    /// Performance statistics
    stats: CacheStats,
}

impl<K: Eq + Hash, V> TtlCache<K, V, SystemClock> {
    // == Constructor ==
    /// Creates a new wall-clock cache with the given TTL.
    pub fn new(ttl_ms: u64) -> Self {
        Self::with_clock(ttl_ms, SystemClock)
    }
}

impl<K: Eq + Hash, V, C: Clock> TtlCache<K, V, C> {
    /// Creates a new cache reading time from `clock`.
    pub fn with_clock(ttl_ms: u64, clock: C) -> Self {
        Self {
            entries: HashMap::new(),
            ttl_ms,
            clock,
            stats: CacheStats::new(),
        }
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    // == Set ==
    /// Stores a value, overwriting any previous one and restarting its TTL.
    pub fn set(&mut self, key: K, value: V) {
        let now = self.clock.now_ms();
        self.entries.insert(key, CacheEntry::new(value, now));
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Retrieves a fresh value by key.
    ///
    /// An expired entry is removed as a side effect and counted as a miss.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entry(key).map(|entry| &entry.value)
    }

    /// Like [`get`](Self::get) but exposes the insertion timestamp as well.
    pub fn entry<Q>(&mut self, key: &Q) -> Option<&CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.evict_if_expired(key);
        match self.entries.get(key) {
            Some(entry) => {
                self.stats.record_hit();
                Some(entry)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Has ==
    /// Checks for a fresh entry without touching hit/miss counters.
    pub fn has<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.evict_if_expired(key);
        self.entries.contains_key(key)
    }

    // == Refresh ==
    /// Returns a fresh entry for mutation and restamps it as just stored.
    ///
    /// Expired entries are evicted and yield `None`, exactly like `get`.
    pub fn refresh<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.evict_if_expired(key);
        let now = self.clock.now_ms();
        self.entries.get_mut(key).map(|entry| {
            entry.touch(now);
            &mut entry.value
        })
    }

    // == Remove ==
    /// Removes an entry by key, returning its value if present.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.entries.remove(key).map(|entry| entry.value);
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.set_total_entries(0);
    }

    /// Iterates over fresh entries without evicting stale ones.
    pub fn iter_fresh(&self) -> impl Iterator<Item = (&K, &V)> {
        let now = self.clock.now_ms();
        let ttl = self.ttl_ms;
        self.entries
            .iter()
            .filter(move |(_, entry)| !entry.is_expired(now, ttl))
            .map(|(key, entry)| (key, &entry.value))
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    // == Length ==
    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_if_expired<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now_ms();
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(now, self.ttl_ms));
        if expired {
            self.entries.remove(key);
            self.stats.record_expirations(1);
            self.stats.set_total_entries(self.entries.len());
        }
    }
}

impl<K: Eq + Hash, V, C: Clock> Sweep for TtlCache<K, V, C> {
    // == Sweep ==
    /// Removes all expired entries from the cache.
    fn sweep(&mut self) -> usize {
        let now = self.clock.now_ms();
        let ttl = self.ttl_ms;
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now, ttl));

        let count = before - self.entries.len();
        self.stats.record_expirations(count);
        self.stats.set_total_entries(self.entries.len());
        count
    }
}
