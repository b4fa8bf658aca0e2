//! Catalog Sync - the cache-and-sync engine behind a game catalog browser
//!
//! Keeps a TTL cache of fetched entities, the in-memory search session and
//! the URL query string consistent under asynchronous, possibly
//! out-of-order updates, on a single-threaded logical event queue.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod games;
pub mod models;
pub mod observable;
pub mod query_params;
pub mod scheduler;
pub mod search;
pub mod storage;
pub mod tasks;

pub use api::{CatalogApi, InMemoryCatalog};
pub use config::Config;
pub use context::AppContext;
pub use error::{Result, SyncError};
