//! Application Context
//!
//! Explicit session context: constructed once at start-up and passed by
//! reference, it owns the timer queue, the caches, the search session and
//! the URL synchronizer, and wires them together:
//!
//! - typed input is debounced into `SearchSession::set_query`
//! - every session state change is debounced into a URL write
//! - external navigation replaces the session state wholesale
//! - issued search requests are fetched through a TTL page cache

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::api::CatalogApi;
use crate::cache::{CacheStats, TtlCache};
use crate::clock::{current_timestamp_ms, ManualClock};
use crate::config::Config;
use crate::error::Result;
use crate::games::{GameCache, GameLoader};
use crate::models::{Game, ResultPage, SearchState};
use crate::observable::Subscription;
use crate::query_params::{NavigationMode, Navigator, ParamMap, QuerySync};
use crate::scheduler::{DebounceOptions, Debouncer, TimerId, TimerQueue};
use crate::search::{search_schema, SearchSession};
use crate::storage::{Preferences, Storage};
use crate::tasks::schedule_sweep;

type PageCache = TtlCache<String, ResultPage<Game>, ManualClock>;

pub struct AppContext<A, N> {
    config: Config,
    timers: TimerQueue,
    storage: Rc<dyn Storage>,
    preferences: RefCell<Preferences>,
    api: Rc<A>,
    games: GameLoader<A, ManualClock>,
    pages: Rc<RefCell<PageCache>>,
    session: Rc<RefCell<SearchSession>>,
    sync: Rc<RefCell<QuerySync<N>>>,
    url_writer: Rc<Debouncer<ParamMap>>,
    query_input: Debouncer<String>,
    sweeps: RefCell<Vec<TimerId>>,
    _state_subscription: Subscription,
}

impl<A, N> std::fmt::Debug for AppContext<A, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .field("timers", &self.timers)
            .field("games", &self.games)
            .field("session", &self.session.borrow())
            .finish()
    }
}

impl<A, N> AppContext<A, N>
where
    A: CatalogApi + 'static,
    N: Navigator + 'static,
{
    /// Context whose logical clock starts at the current wall-clock time.
    pub fn new(config: Config, api: A, navigator: N, storage: Rc<dyn Storage>) -> Self {
        Self::with_clock(
            config,
            api,
            navigator,
            storage,
            ManualClock::new(current_timestamp_ms()),
        )
    }

    pub fn with_clock(
        config: Config,
        api: A,
        navigator: N,
        storage: Rc<dyn Storage>,
        clock: ManualClock,
    ) -> Self {
        let timers = TimerQueue::new(clock.clone());
        let preferences = RefCell::new(Preferences::load(Rc::clone(&storage)));

        let api = Rc::new(api);
        let game_cache = GameCache::with_clock(config.cache_ttl_ms, clock.clone());
        let games = GameLoader::new(Rc::clone(&api), Rc::new(RefCell::new(game_cache)));
        let pages = Rc::new(RefCell::new(TtlCache::with_clock(
            config.cache_ttl_ms,
            clock,
        )));

        let sync = Rc::new(RefCell::new(QuerySync::new(
            search_schema(),
            navigator,
            NavigationMode::Push,
        )));

        // Initial state comes from the location before anything observes it.
        let mut session = SearchSession::new(
            config.page_limit,
            config.history_limit,
            Rc::clone(&storage),
        );
        let initial = SearchState::from_params(&sync.borrow().read_location(), config.page_limit);
        session.replace_state(initial);
        let session = Rc::new(RefCell::new(session));

        let url_writer = {
            let sync = Rc::clone(&sync);
            Rc::new(Debouncer::new(
                &timers,
                DebounceOptions::new(config.url_sync_debounce_ms),
                move |params: ParamMap| match sync.try_borrow_mut() {
                    Ok(mut sync) => {
                        sync.write(&params);
                    }
                    Err(_) => warn!("Location busy, dropping URL update"),
                },
            ))
        };

        let state_subscription = {
            let url_writer = Rc::clone(&url_writer);
            session
                .borrow()
                .subscribe(move |state| url_writer.push(state.to_params()))
        };

        let query_input = {
            let session = Rc::downgrade(&session);
            Debouncer::new(
                &timers,
                DebounceOptions::new(config.search_debounce_ms).max_wait(config.search_max_wait_ms),
                move |query: String| {
                    let Some(session) = session.upgrade() else {
                        return;
                    };
                    match session.try_borrow_mut() {
                        Ok(mut session) => {
                            session.set_query(&query);
                        }
                        Err(_) => warn!(query = %query, "Session busy, dropping typed query"),
                    };
                },
            )
        };

        Self {
            config,
            timers,
            storage,
            preferences,
            api,
            games,
            pages,
            session,
            sync,
            url_writer,
            query_input,
            sweeps: RefCell::new(Vec::new()),
            _state_subscription: state_subscription,
        }
    }

    // == Lifecycle ==
    /// Starts the periodic sweeps and issues the first search.
    pub fn start(&self) {
        let mut sweeps = self.sweeps.borrow_mut();
        if sweeps.is_empty() {
            let period = self.config.sweep_interval_ms;
            sweeps.push(schedule_sweep(
                &self.timers,
                Rc::downgrade(&self.games.cache()),
                period,
                "games",
            ));
            sweeps.push(schedule_sweep(
                &self.timers,
                Rc::downgrade(&self.pages),
                period,
                "search-pages",
            ));
        }
        drop(sweeps);

        let canonical = self.session.borrow().state().to_params();
        self.sync
            .borrow_mut()
            .write_with(&canonical, NavigationMode::Replace);
        info!(location = %self.location(), "Session started");
        self.session.borrow_mut().refresh();
    }

    /// Advances logical time by `ms`, then fetches whatever that triggered.
    pub async fn tick(&self, ms: u64) -> usize {
        self.timers.advance(ms);
        self.dispatch().await
    }

    /// Runs every pending one-shot timer, then fetches.
    pub async fn settle(&self) -> usize {
        self.timers.run_until_idle();
        self.dispatch().await
    }

    // == Input ==
    /// Feeds a keystroke-level query; it reaches the session once input
    /// pauses (or the debounce ceiling passes).
    pub fn type_query(&self, query: &str) {
        self.query_input.push(query.to_string());
    }

    /// Commits a query immediately and records it in history.
    pub fn submit_query(&self, query: &str) -> bool {
        self.query_input.cancel();
        self.session.borrow_mut().submit_query(query)
    }

    pub fn with_session<R>(&self, f: impl FnOnce(&mut SearchSession) -> R) -> R {
        f(&mut self.session.borrow_mut())
    }

    // == Navigation ==
    /// Runs `f` against the navigator (back, forward, following a link),
    /// then adopts whatever location it leaves behind.
    pub fn navigate<R>(&self, f: impl FnOnce(&mut N) -> R) -> R {
        let result = f(self.sync.borrow_mut().navigator_mut());
        self.on_location_changed();
        result
    }

    /// Replaces the session state from the current location. The location
    /// itself is only rewritten (never pushed) when it is not canonical.
    pub fn on_location_changed(&self) {
        self.query_input.cancel();
        self.url_writer.cancel();

        let params = self.sync.borrow().read_location();
        let state = SearchState::from_params(&params, self.config.page_limit);
        let changed = self.session.borrow_mut().replace_state(state);
        debug!(changed, "Adopted location");

        // Discard the write queued by the replacement; it would push.
        self.url_writer.cancel();
        let canonical = self.session.borrow().state().to_params();
        self.sync
            .borrow_mut()
            .write_with(&canonical, NavigationMode::Replace);
    }

    pub fn location(&self) -> String {
        self.sync.borrow().navigator().current_query()
    }

    pub fn navigator(&self) -> Ref<'_, N> {
        Ref::map(self.sync.borrow(), |sync| sync.navigator())
    }

    // == Fetching ==
    /// Serves every outstanding search request. Completions from superseded
    /// requests are discarded by the session. Returns how many were applied.
    pub async fn dispatch(&self) -> usize {
        let mut applied = 0;
        loop {
            let ticket = self.session.borrow_mut().take_request();
            let Some(ticket) = ticket else {
                break;
            };
            let result = self.fetch_page(&ticket.state).await;
            if self.session.borrow_mut().complete(&ticket, result) {
                applied += 1;
            }
        }
        applied
    }

    async fn fetch_page(&self, state: &SearchState) -> Result<ResultPage<Game>> {
        let key = self.page_key(state);
        let cached = self.pages.borrow_mut().get(&key).cloned();
        if let Some(page) = cached {
            debug!(key = %key, "Search page cache hit");
            return Ok(page);
        }

        let page = self.api.search(state).await?;
        let preloaded = self
            .games
            .cache()
            .borrow_mut()
            .preload(page.data.iter().cloned());
        debug!(key = %key, total = page.total, preloaded, "Search page fetched");
        self.pages.borrow_mut().set(key, page.clone());
        Ok(page)
    }

    fn page_key(&self, state: &SearchState) -> String {
        let query = self.sync.borrow().schema().format(&state.to_params());
        format!("{query}|limit={}", state.limit)
    }

    // == Games ==
    /// Loads a game with its achievements and records the visit.
    pub async fn open_game(&self, id: &str) -> Result<Game> {
        self.games.load_achievements(id).await?;
        let game = self.games.load_game(id).await?;
        self.preferences.borrow_mut().add_recently_viewed(id);
        Ok(game)
    }

    pub fn toggle_achievement(&self, game_id: &str, achievement_id: &str) -> Result<bool> {
        self.games
            .cache()
            .borrow_mut()
            .toggle_achievement(game_id, achievement_id)
    }

    // == Accessors ==
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn games(&self) -> &GameLoader<A, ManualClock> {
        &self.games
    }

    pub fn session(&self) -> Ref<'_, SearchSession> {
        self.session.borrow()
    }

    pub fn preferences(&self) -> Ref<'_, Preferences> {
        self.preferences.borrow()
    }

    pub fn preferences_mut(&self) -> RefMut<'_, Preferences> {
        self.preferences.borrow_mut()
    }

    pub fn page_cache_stats(&self) -> CacheStats {
        self.pages.borrow().stats()
    }
}

impl<A, N> Drop for AppContext<A, N> {
    fn drop(&mut self) {
        for id in self.sweeps.get_mut().drain(..) {
            self.timers.cancel(id);
        }
    }
}
