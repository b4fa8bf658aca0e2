//! Error types for the cache-and-sync engine
//!
//! Provides unified error handling using thiserror. Every variant is
//! recoverable: callers either surface it as a session error state or log it
//! and substitute a default.

use thiserror::Error;

// == Sync Error Enum ==
/// Unified error type for the engine.
///
/// `Clone` so a single coalesced fetch result can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Entity or cache entry not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transient remote fetch failure
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// A single query parameter could not be deserialized
    #[error("Invalid query parameter '{key}': {reason}")]
    InvalidParam { key: String, reason: String },

    /// A single durable storage key is corrupt or could not be written
    #[error("Storage key '{key}': {reason}")]
    Storage { key: String, reason: String },

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Shorthand for a parameter failure on `key`.
    pub fn invalid_param(key: impl Into<String>, reason: impl ToString) -> Self {
        SyncError::InvalidParam {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a storage failure on `key`.
    pub fn storage(key: impl Into<String>, reason: impl ToString) -> Self {
        SyncError::Storage {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures that a retry may resolve.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Fetch(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the engine.
pub type Result<T> = std::result::Result<T, SyncError>;
