//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

// == Cache Entry ==
/// A single cached value together with the instant it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Insertion timestamp (Unix milliseconds), reset on refresh
    pub inserted_at: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry stamped at `now`.
    pub fn new(value: V, now: u64) -> Self {
        Self {
            value,
            inserted_at: now,
        }
    }

    // == Age ==
    /// Milliseconds elapsed since insertion, saturating at zero.
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.inserted_at)
    }

    // == Is Expired ==
    /// Checks if the entry has outlived `ttl_ms`.
    ///
    /// Boundary condition: an entry is expired once its age is greater than
    /// or equal to the TTL, so it is fresh only while `now - inserted_at < ttl`.
    pub fn is_expired(&self, now: u64, ttl_ms: u64) -> bool {
        self.age_ms(now) >= ttl_ms
    }

    // == Time To Live ==
    /// Returns remaining freshness in milliseconds, `0` once expired.
    pub fn ttl_remaining_ms(&self, now: u64, ttl_ms: u64) -> u64 {
        ttl_ms.saturating_sub(self.age_ms(now))
    }

    /// Restamps the entry as freshly stored.
    pub fn touch(&mut self, now: u64) {
        self.inserted_at = now;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new("test_value".to_string(), 1_000);

        assert_eq!(entry.value, "test_value");
        assert_eq!(entry.inserted_at, 1_000);
        assert!(!entry.is_expired(1_000, 60_000));
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new(1u32, 0);

        assert!(!entry.is_expired(999, 1_000));
        assert!(entry.is_expired(1_001, 1_000));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = CacheEntry::new((), 500);

        // Entry should be expired when age == ttl
        assert!(entry.is_expired(1_500, 1_000), "Entry should be expired at boundary");
        assert!(!entry.is_expired(1_499, 1_000));
    }

    #[test]
    fn test_ttl_remaining() {
        let entry = CacheEntry::new((), 0);

        assert_eq!(entry.ttl_remaining_ms(250, 1_000), 750);
        assert_eq!(entry.ttl_remaining_ms(5_000, 1_000), 0);
    }

    #[test]
    fn test_age_before_insertion_is_zero() {
        let entry = CacheEntry::new((), 2_000);
        assert_eq!(entry.age_ms(1_000), 0);
    }

    #[test]
    fn test_touch_resets_age() {
        let mut entry = CacheEntry::new((), 0);
        entry.touch(900);

        assert!(!entry.is_expired(1_500, 1_000));
        assert_eq!(entry.age_ms(1_500), 600);
    }
}
