//! Games Module
//!
//! Domain entity cache for games and their achievements, and the loader
//! that fills it from the catalog API.

mod cache;
mod loader;


// Re-export public types
pub use cache::{
    completion_rate, GameCache, GameRecord, GameStats, LoadKind, LoadTicket, PointTotals,
    RarityBreakdown,
};
pub use loader::GameLoader;
