//! In-memory catalog
//!
//! Reference `CatalogApi` over a fixed data set. Calls yield to the runtime
//! once before resolving so callers see a real suspension point, and
//! failures can be injected for the next N calls.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use super::CatalogApi;
use crate::error::{Result, SyncError};
use crate::models::{Achievement, Game, ResultPage, SearchState, SortKey};

/// Rarity assumed for a game with no achievements.
const DEFAULT_AVERAGE_RARITY: f64 = 50.0;

static SEED: &str = include_str!("../../data/catalog.json");

#[derive(Deserialize)]
struct Seed {
    games: Vec<Game>,
    achievements: Vec<Achievement>,
}

/// Number of calls made per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub search: usize,
    pub fetch_game: usize,
    pub fetch_achievements: usize,
}

#[derive(Debug)]
pub struct InMemoryCatalog {
    games: Vec<Game>,
    achievements: HashMap<String, Vec<Achievement>>,
    fail_remaining: Cell<usize>,
    calls: RefCell<CallCounts>,
}

impl InMemoryCatalog {
    pub fn new(games: Vec<Game>, achievements: Vec<Achievement>) -> Self {
        let mut by_game: HashMap<String, Vec<Achievement>> = HashMap::new();
        for achievement in achievements {
            by_game
                .entry(achievement.game_id.clone())
                .or_default()
                .push(achievement);
        }
        Self {
            games,
            achievements: by_game,
            fail_remaining: Cell::new(0),
            calls: RefCell::new(CallCounts::default()),
        }
    }

    /// Catalog loaded from the bundled seed data.
    pub fn seeded() -> Result<Self> {
        let seed: Seed = serde_json::from_str(SEED)
            .map_err(|e| SyncError::Internal(format!("bundled catalog is invalid: {e}")))?;
        Ok(Self::new(seed.games, seed.achievements))
    }

    /// Makes the next `count` calls fail with a fetch error.
    pub fn fail_next(&self, count: usize) {
        self.fail_remaining.set(count);
    }

    pub fn calls(&self) -> CallCounts {
        *self.calls.borrow()
    }

    pub fn games(&self) -> &[Game] {
        &self.games
    }

    fn check_failure(&self, what: &str) -> Result<()> {
        let remaining = self.fail_remaining.get();
        if remaining == 0 {
            return Ok(());
        }
        self.fail_remaining.set(remaining - 1);
        debug!(what, "Injected fetch failure");
        Err(SyncError::Fetch(format!("Network error: failed to fetch {what}")))
    }

    fn average_rarity(&self, game_id: &str) -> f64 {
        match self.achievements.get(game_id) {
            Some(list) if !list.is_empty() => {
                list.iter().map(|a| a.rarity).sum::<f64>() / list.len() as f64
            }
            _ => DEFAULT_AVERAGE_RARITY,
        }
    }

    // == Filtering ==
    fn matches(&self, game: &Game, state: &SearchState) -> bool {
        let filters = &state.filters;

        if !state.query.trim().is_empty() && !game.matches_term(&state.query) {
            return false;
        }
        if !filters.platforms.is_empty()
            && !filters.platforms.iter().any(|p| game.platforms.contains(p))
        {
            return false;
        }
        if !filters.genres.is_empty() && !filters.genres.iter().any(|g| game.genres.contains(g)) {
            return false;
        }
        if !filters.tags.is_empty() && !filters.tags.iter().any(|t| game.tags.contains(t)) {
            return false;
        }
        if filters.completion.is_active()
            && !filters.completion.contains(f64::from(game.completion_rate), 0, 100)
        {
            return false;
        }
        if filters.playtime.is_active()
            && !filters
                .playtime
                .contains(game.average_playtime_hours.unwrap_or(0.0), 0, 1000)
        {
            return false;
        }
        if filters.rarity.is_active()
            && !filters.rarity.contains(self.average_rarity(&game.id), 0, 100)
        {
            return false;
        }
        true
    }

    // == Sorting ==
    fn sort(&self, games: &mut [Game], state: &SearchState) {
        match state.sort {
            SortKey::Alphabetical => {
                games.sort_by_key(|g| g.title.to_lowercase());
            }
            SortKey::Popularity => games.sort_by(|a, b| {
                b.rating.unwrap_or(0.0).total_cmp(&a.rating.unwrap_or(0.0))
            }),
            SortKey::Completion => games.sort_by(|a, b| b.completion_rate.cmp(&a.completion_rate)),
            SortKey::Rarity => {
                let rarity: HashMap<&str, f64> = self
                    .games
                    .iter()
                    .map(|g| (g.id.as_str(), self.average_rarity(&g.id)))
                    .collect();
                let of = |g: &Game| {
                    rarity
                        .get(g.id.as_str())
                        .copied()
                        .unwrap_or(DEFAULT_AVERAGE_RARITY)
                };
                games.sort_by(|a, b| of(a).total_cmp(&of(b)));
            }
            SortKey::Relevance => {
                // exact title matches first, otherwise catalog order
                let query = state.query.trim().to_lowercase();
                if !query.is_empty() {
                    games.sort_by(|a, b| {
                        let exact = |g: &Game| g.title.to_lowercase() == query;
                        match (exact(a), exact(b)) {
                            (true, false) => Ordering::Less,
                            (false, true) => Ordering::Greater,
                            _ => Ordering::Equal,
                        }
                    });
                }
            }
        }
    }
}

impl CatalogApi for InMemoryCatalog {
    async fn search(&self, state: &SearchState) -> Result<ResultPage<Game>> {
        self.calls.borrow_mut().search += 1;
        tokio::task::yield_now().await;
        self.check_failure("search results")?;

        let mut matched: Vec<Game> = self
            .games
            .iter()
            .filter(|g| self.matches(g, state))
            .cloned()
            .collect();
        self.sort(&mut matched, state);

        let total = matched.len() as u64;
        let page = state.page.max(1);
        let limit = state.limit.max(1);
        let start = (page as usize - 1).saturating_mul(limit as usize);
        let data = matched
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .collect();

        Ok(ResultPage::new(data, total, page, limit))
    }

    async fn fetch_game(&self, id: &str) -> Result<Game> {
        self.calls.borrow_mut().fetch_game += 1;
        tokio::task::yield_now().await;
        self.check_failure(&format!("game {id}"))?;

        self.games
            .iter()
            .find(|g| g.id == id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("game '{id}'")))
    }

    async fn fetch_achievements(&self, game_id: &str) -> Result<Vec<Achievement>> {
        self.calls.borrow_mut().fetch_achievements += 1;
        tokio::task::yield_now().await;
        self.check_failure(&format!("achievements for game {game_id}"))?;

        Ok(self.achievements.get(game_id).cloned().unwrap_or_default())
    }
}
