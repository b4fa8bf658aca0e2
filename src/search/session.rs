//! Search Session
//!
//! State machine over one search stream: `Idle -> Loading -> {Success,
//! Error}`, re-entering `Loading` on every trigger. Each trigger bumps a
//! generation counter; a fetch is described by a [`SearchTicket`] carrying
//! the generation it was issued under, and a completion whose ticket is no
//! longer current is discarded.

use std::rc::Rc;

use tracing::{debug, warn};

use super::history::SearchHistory;
use crate::error::{Result, SyncError};
use crate::models::search::{dedup_in_order, has_more};
use crate::models::{FilterCategory, Game, PlatformId, RangeFilter, ResultPage, SearchState, SortKey};
use crate::observable::{Observable, Subscription};
use crate::storage::Storage;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error(SyncError),
}

/// How a completed page is applied to the result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    #[default]
    Replace,
    Append,
}

/// One issued fetch: the state to fetch for and the generation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    generation: u64,
    pub state: SearchState,
    pub mode: FetchMode,
}

impl SearchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

pub struct SearchSession {
    state: Observable<SearchState>,
    results: Vec<Game>,
    total: u64,
    /// Page number of the last applied result page; 0 before any.
    loaded_page: u32,
    status: SessionStatus,
    generation: u64,
    pending: Option<FetchMode>,
    history: SearchHistory,
    storage: Rc<dyn Storage>,
}

impl std::fmt::Debug for SearchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchSession")
            .field("state", &*self.state.get())
            .field("results", &self.results.len())
            .field("total", &self.total)
            .field("status", &self.status)
            .field("generation", &self.generation)
            .finish()
    }
}

impl SearchSession {
    pub fn new(limit: u32, history_limit: usize, storage: Rc<dyn Storage>) -> Self {
        let history = SearchHistory::load(storage.as_ref(), history_limit);
        Self {
            state: Observable::new(SearchState::with_limit(limit)),
            results: Vec::new(),
            total: 0,
            loaded_page: 0,
            status: SessionStatus::Idle,
            generation: 0,
            pending: None,
            history,
            storage,
        }
    }

    // == Accessors ==
    pub fn state(&self) -> SearchState {
        self.state.get().clone()
    }

    /// Shared handle to the state; subscribing through it does not borrow
    /// the session.
    pub fn observable(&self) -> Observable<SearchState> {
        self.state.clone()
    }

    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&SearchState) + 'static,
    {
        self.state.subscribe(callback)
    }

    pub fn results(&self) -> &[Game] {
        &self.results
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Whether another page exists past the last applied one.
    pub fn has_more(&self) -> bool {
        has_more(self.loaded_page, self.state.get().limit, self.total)
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == SessionStatus::Loading
    }

    pub fn error(&self) -> Option<&SyncError> {
        match &self.status {
            SessionStatus::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn active_filter_count(&self) -> usize {
        self.state.get().filters.active_count()
    }

    // == Triggers ==
    /// Applies `f` to a copy of the state; when the result differs, stores
    /// it, notifies subscribers and issues a new fetch. Returns whether
    /// anything changed.
    fn mutate(&mut self, mode: FetchMode, f: impl FnOnce(&mut SearchState)) -> bool {
        let mut next = self.state.get().clone();
        f(&mut next);
        if next == *self.state.get() {
            return false;
        }
        self.state.set(next);
        self.trigger(mode);
        true
    }

    fn trigger(&mut self, mode: FetchMode) {
        self.generation += 1;
        self.status = SessionStatus::Loading;
        self.pending = Some(mode);
    }

    /// Re-issues the fetch for the current state, e.g. after an error.
    pub fn refresh(&mut self) {
        self.trigger(FetchMode::Replace);
    }

    pub fn set_query(&mut self, query: &str) -> bool {
        self.mutate(FetchMode::Replace, |s| {
            s.query = query.to_string();
            s.page = 1;
        })
    }

    pub fn set_sort(&mut self, sort: SortKey) -> bool {
        self.mutate(FetchMode::Replace, |s| {
            s.sort = sort;
            s.page = 1;
        })
    }

    /// Moves to `page` (clamped to 1) keeping every other field.
    pub fn set_page(&mut self, page: u32) -> bool {
        self.mutate(FetchMode::Replace, |s| s.page = page.max(1))
    }

    pub fn next_page(&mut self) -> bool {
        if !self.has_more() {
            return false;
        }
        let page = self.state.get().page.saturating_add(1);
        self.set_page(page)
    }

    pub fn previous_page(&mut self) -> bool {
        let page = self.state.get().page;
        if page <= 1 {
            return false;
        }
        self.set_page(page - 1)
    }

    /// Requests the page after the last applied one and appends it to the
    /// current results. The load-more cursor lives in the results, not in
    /// the state, so subscribers (and the URL) see no change. A failed
    /// append can be retried by calling this again.
    pub fn load_more(&mut self) -> bool {
        if !self.has_more() || self.is_loading() {
            return false;
        }
        self.trigger(FetchMode::Append);
        true
    }

    /// Replaces the whole state, as after external navigation. The
    /// session's page limit is kept.
    pub fn replace_state(&mut self, state: SearchState) -> bool {
        self.mutate(FetchMode::Replace, |s| {
            let limit = s.limit;
            *s = state;
            s.limit = limit;
        })
    }

    // == Filters ==
    fn mutate_filters(&mut self, f: impl FnOnce(&mut SearchState)) -> bool {
        self.mutate(FetchMode::Replace, |s| {
            f(s);
            s.page = 1;
        })
    }

    pub fn toggle_platform(&mut self, platform: PlatformId) -> bool {
        self.mutate_filters(|s| s.filters.toggle_platform(platform))
    }

    pub fn toggle_genre(&mut self, genre: &str) -> bool {
        self.mutate_filters(|s| s.filters.toggle_genre(genre))
    }

    pub fn toggle_tag(&mut self, tag: &str) -> bool {
        self.mutate_filters(|s| s.filters.toggle_tag(tag))
    }

    pub fn set_platforms(&mut self, platforms: Vec<PlatformId>) -> bool {
        self.mutate_filters(|s| s.filters.platforms = dedup_in_order(platforms))
    }

    pub fn set_genres(&mut self, genres: Vec<String>) -> bool {
        self.mutate_filters(|s| s.filters.genres = dedup_in_order(genres))
    }

    pub fn set_tags(&mut self, tags: Vec<String>) -> bool {
        self.mutate_filters(|s| s.filters.tags = dedup_in_order(tags))
    }

    pub fn set_rarity_range(&mut self, range: RangeFilter) -> bool {
        self.mutate_filters(|s| s.filters.rarity = range)
    }

    pub fn set_completion_range(&mut self, range: RangeFilter) -> bool {
        self.mutate_filters(|s| s.filters.completion = range)
    }

    pub fn set_playtime_range(&mut self, range: RangeFilter) -> bool {
        self.mutate_filters(|s| s.filters.playtime = range)
    }

    pub fn clear_filter(&mut self, category: FilterCategory) -> bool {
        self.mutate_filters(|s| s.filters.clear(category))
    }

    pub fn clear_filters(&mut self) -> bool {
        self.mutate_filters(|s| s.filters = Default::default())
    }

    // == Results ==
    /// Replaces the result set wholesale.
    pub fn set_results(&mut self, page: ResultPage<Game>) {
        self.results = page.data;
        self.total = page.total;
        self.loaded_page = page.page;
    }

    /// Appends a page onto the result set; `total` is overwritten.
    pub fn append_results(&mut self, page: ResultPage<Game>) {
        self.results.extend(page.data);
        self.total = page.total;
        self.loaded_page = page.page;
    }

    pub fn clear_results(&mut self) {
        self.results.clear();
        self.total = 0;
        self.loaded_page = 0;
    }

    // == Fetch protocol ==
    /// Takes the outstanding fetch request, if a trigger issued one.
    pub fn take_request(&mut self) -> Option<SearchTicket> {
        let mode = self.pending.take()?;
        let mut state = self.state();
        if mode == FetchMode::Append {
            state.page = self.loaded_page.saturating_add(1);
        }
        Some(SearchTicket {
            generation: self.generation,
            state,
            mode,
        })
    }

    /// Applies a fetch outcome. Superseded tickets are dropped and leave the
    /// session untouched; a failure keeps the existing results. Returns
    /// whether the outcome was applied.
    pub fn complete(&mut self, ticket: &SearchTicket, result: Result<ResultPage<Game>>) -> bool {
        if ticket.generation != self.generation {
            debug!(
                ticket = ticket.generation,
                current = self.generation,
                "Discarding stale search completion"
            );
            return false;
        }

        match result {
            Ok(page) => {
                match ticket.mode {
                    FetchMode::Replace => self.set_results(page),
                    FetchMode::Append => self.append_results(page),
                }
                self.status = SessionStatus::Success;
            }
            Err(e) => {
                warn!(query = %ticket.state.query, error = %e, "Search failed");
                self.status = SessionStatus::Error(e);
            }
        }
        true
    }

    // == History ==
    pub fn history(&self) -> &SearchHistory {
        &self.history
    }

    /// Sets the query and records it in history.
    pub fn submit_query(&mut self, query: &str) -> bool {
        if self.history.add(query) {
            self.history.persist(self.storage.as_ref());
        }
        self.set_query(query)
    }

    pub fn remove_from_history(&mut self, query: &str) -> bool {
        let removed = self.history.remove(query);
        if removed {
            self.history.persist(self.storage.as_ref());
        }
        removed
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.history.persist(self.storage.as_ref());
    }
}
