//! Configuration Module
//!
//! Handles loading engine configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Engine configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Freshness window for cached games and search pages, in milliseconds
    pub cache_ttl_ms: u64,
    /// Period of the background cache sweep, in milliseconds
    pub sweep_interval_ms: u64,
    /// Debounce delay applied to typed search queries
    pub search_debounce_ms: u64,
    /// Upper bound on how long typed input may be held back
    pub search_max_wait_ms: u64,
    /// Debounce delay applied to URL pushes
    pub url_sync_debounce_ms: u64,
    /// Default page size for searches
    pub page_limit: u32,
    /// Maximum number of remembered search queries
    pub history_limit: usize,
    /// Backing file for durable storage; in-memory storage when unset
    pub storage_path: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TTL_MS` - Cache freshness window (default: 300000)
    /// - `SWEEP_INTERVAL_MS` - Sweep period (default: 300000)
    /// - `SEARCH_DEBOUNCE_MS` - Query debounce delay (default: 300)
    /// - `SEARCH_MAX_WAIT_MS` - Query debounce ceiling (default: 1000)
    /// - `URL_SYNC_DEBOUNCE_MS` - URL push debounce delay (default: 50)
    /// - `PAGE_LIMIT` - Results per page (default: 20)
    /// - `HISTORY_LIMIT` - Search history size (default: 10)
    /// - `STORAGE_PATH` - JSON file for durable storage (default: unset)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_ttl_ms: env_or("CACHE_TTL_MS", defaults.cache_ttl_ms),
            sweep_interval_ms: env_or("SWEEP_INTERVAL_MS", defaults.sweep_interval_ms),
            search_debounce_ms: env_or("SEARCH_DEBOUNCE_MS", defaults.search_debounce_ms),
            search_max_wait_ms: env_or("SEARCH_MAX_WAIT_MS", defaults.search_max_wait_ms),
            url_sync_debounce_ms: env_or("URL_SYNC_DEBOUNCE_MS", defaults.url_sync_debounce_ms),
            page_limit: env_or("PAGE_LIMIT", defaults.page_limit).max(1),
            history_limit: env_or("HISTORY_LIMIT", defaults.history_limit),
            storage_path: env::var("STORAGE_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 5 * 60 * 1000,
            sweep_interval_ms: 5 * 60 * 1000,
            search_debounce_ms: 300,
            search_max_wait_ms: 1000,
            url_sync_debounce_ms: 50,
            page_limit: 20,
            history_limit: 10,
            storage_path: None,
        }
    }
}
