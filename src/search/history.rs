//! Search history: bounded, most-recent-first, distinct queries.

use tracing::warn;

use crate::error::Result;
use crate::storage::{load_or_default, save_json, Storage};

/// Storage key name (prefixed by the storage layer).
pub const HISTORY_KEY: &str = "search-history";

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHistory {
    entries: Vec<String>,
    limit: usize,
}

impl Default for SearchHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl SearchHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit,
        }
    }

    /// Loads persisted history; a corrupt value yields an empty history.
    pub fn load(storage: &dyn Storage, limit: usize) -> Self {
        let mut entries: Vec<String> = load_or_default(storage, HISTORY_KEY, Vec::new());
        entries.truncate(limit);
        Self { entries, limit }
    }

    pub fn save(&self, storage: &dyn Storage) -> Result<()> {
        save_json(storage, HISTORY_KEY, &self.entries)
    }

    /// Records a submitted query at the front. Blank queries and queries
    /// already present are ignored; an existing entry keeps its position.
    /// Returns whether the history changed.
    pub fn add(&mut self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() || self.entries.iter().any(|q| q == query) {
            return false;
        }
        self.entries.insert(0, query.to_string());
        self.entries.truncate(self.limit);
        true
    }

    pub fn remove(&mut self, query: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|q| q != query);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persists, logging instead of failing.
    pub(crate) fn persist(&self, storage: &dyn Storage) {
        if let Err(e) = self.save(storage) {
            warn!(key = HISTORY_KEY, error = %e, "Failed to persist search history");
        }
    }
}
