//! Cache Module
//!
//! Provides in-memory caching with TTL expiration, lazily on read and by
//! periodic sweep.

mod entry;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::CacheEntry;
pub use stats::CacheStats;
pub use store::TtlCache;

/// Anything holding expiring entries that can be swept in one pass.
pub trait Sweep {
    /// Evicts every expired entry, returning how many were removed.
    fn sweep(&mut self) -> usize;
}
