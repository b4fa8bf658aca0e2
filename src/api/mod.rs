//! API Module
//!
//! The remote-fetch contract the engine consumes, and an in-memory
//! catalog implementing it.
//!
//! # Operations
//! - `search` - one page of games matching a [`SearchState`]
//! - `fetch_game` - a single game by id
//! - `fetch_achievements` - every achievement of a game

mod memory;

pub use memory::{CallCounts, InMemoryCatalog};

use crate::error::Result;
use crate::models::{Achievement, Game, ResultPage, SearchState};

/// Opaque asynchronous collaborator. Only the resolved value and the
/// rejection matter; transport details never leak into the engine.
#[allow(async_fn_in_trait)]
pub trait CatalogApi {
    async fn search(&self, state: &SearchState) -> Result<ResultPage<Game>>;

    async fn fetch_game(&self, id: &str) -> Result<Game>;

    async fn fetch_achievements(&self, game_id: &str) -> Result<Vec<Achievement>>;
}
