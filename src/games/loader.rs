//! Game Loader
//!
//! Cache-first loads with request coalescing: concurrent callers asking for
//! the same id while a fetch is in flight await one shared future instead
//! of each reaching the network.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture, Shared};
use tracing::{debug, warn};

use super::cache::{GameCache, LoadKind};
use crate::api::CatalogApi;
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::models::{Achievement, Game};

type SharedLoad<T> = Shared<LocalBoxFuture<'static, Result<T>>>;
type InFlight<T> = Rc<RefCell<HashMap<String, SharedLoad<T>>>>;

pub struct GameLoader<A, C = SystemClock> {
    api: Rc<A>,
    cache: Rc<RefCell<GameCache<C>>>,
    games: InFlight<Game>,
    achievements: InFlight<Vec<Achievement>>,
}

impl<A, C> Clone for GameLoader<A, C> {
    fn clone(&self) -> Self {
        Self {
            api: Rc::clone(&self.api),
            cache: Rc::clone(&self.cache),
            games: Rc::clone(&self.games),
            achievements: Rc::clone(&self.achievements),
        }
    }
}

impl<A, C> std::fmt::Debug for GameLoader<A, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameLoader")
            .field("games_in_flight", &self.games.borrow().len())
            .field("achievements_in_flight", &self.achievements.borrow().len())
            .finish()
    }
}

impl<A, C> GameLoader<A, C>
where
    A: CatalogApi + 'static,
    C: Clock + 'static,
{
    pub fn new(api: Rc<A>, cache: Rc<RefCell<GameCache<C>>>) -> Self {
        Self {
            api,
            cache,
            games: Rc::new(RefCell::new(HashMap::new())),
            achievements: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub fn cache(&self) -> Rc<RefCell<GameCache<C>>> {
        Rc::clone(&self.cache)
    }

    /// Fetches currently running, across both kinds.
    pub fn in_flight(&self) -> usize {
        self.games.borrow().len() + self.achievements.borrow().len()
    }

    // == Games ==
    /// Cached game if fresh, otherwise one (shared) fetch.
    pub async fn load_game(&self, id: &str) -> Result<Game> {
        let cached = self.cache.borrow_mut().get_game(id).cloned();
        if let Some(game) = cached {
            debug!(id, "Game cache hit");
            return Ok(game);
        }

        let load = join_or_start(&self.games, id, || self.start_game(id));
        let result = load.clone().await;
        forget(&self.games, id, &load);
        result
    }

    fn start_game(&self, id: &str) -> SharedLoad<Game> {
        let ticket = self.cache.borrow_mut().begin_load(id, LoadKind::Game);
        let api = Rc::clone(&self.api);
        let cache = Rc::clone(&self.cache);
        let id = id.to_string();

        async move {
            let result = api.fetch_game(&id).await;
            if let Err(e) = &result {
                warn!(id = %id, error = %e, "Game fetch failed");
            }
            cache.borrow_mut().finish_game(&ticket, &result);
            result
        }
        .boxed_local()
        .shared()
    }

    // == Achievements ==
    /// Cached achievements if fresh and non-empty, otherwise loads the game
    /// (if needed) and one shared achievements fetch.
    pub async fn load_achievements(&self, id: &str) -> Result<Vec<Achievement>> {
        let cached = self
            .cache
            .borrow_mut()
            .get_achievements(id)
            .map(<[Achievement]>::to_vec);
        if let Some(achievements) = cached {
            debug!(id, "Achievements cache hit");
            return Ok(achievements);
        }

        self.load_game(id).await?;

        let load = join_or_start(&self.achievements, id, || self.start_achievements(id));
        let result = load.clone().await;
        forget(&self.achievements, id, &load);
        result
    }

    fn start_achievements(&self, id: &str) -> SharedLoad<Vec<Achievement>> {
        let ticket = self
            .cache
            .borrow_mut()
            .begin_load(id, LoadKind::Achievements);
        let api = Rc::clone(&self.api);
        let cache = Rc::clone(&self.cache);
        let id = id.to_string();

        async move {
            let result = api.fetch_achievements(&id).await;
            if let Err(e) = &result {
                warn!(id = %id, error = %e, "Achievements fetch failed");
            }
            cache.borrow_mut().finish_achievements(&ticket, &result);
            result
        }
        .boxed_local()
        .shared()
    }
}

/// Joins the running load for `id`, or registers a new one.
fn join_or_start<T: Clone>(
    in_flight: &InFlight<T>,
    id: &str,
    start: impl FnOnce() -> SharedLoad<T>,
) -> SharedLoad<T> {
    if let Some(load) = in_flight.borrow().get(id) {
        if load.peek().is_none() {
            debug!(id, "Joining in-flight load");
            return load.clone();
        }
    }
    let load = start();
    in_flight.borrow_mut().insert(id.to_string(), load.clone());
    load
}

/// Drops the registration for `id` if it still points at `load`.
fn forget<T: Clone>(in_flight: &InFlight<T>, id: &str, load: &SharedLoad<T>) {
    let mut map = in_flight.borrow_mut();
    if map.get(id).is_some_and(|current| current.ptr_eq(load)) {
        map.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InMemoryCatalog;
    use crate::clock::ManualClock;
    use crate::error::SyncError;

    fn loader() -> (
        Rc<InMemoryCatalog>,
        GameLoader<InMemoryCatalog, ManualClock>,
        ManualClock,
    ) {
        let clock = ManualClock::new(0);
        let api = Rc::new(InMemoryCatalog::seeded().unwrap());
        let cache = Rc::new(RefCell::new(GameCache::with_clock(1_000, clock.clone())));
        (api.clone(), GameLoader::new(api, cache), clock)
    }

    #[tokio::test]
    async fn test_second_load_is_cache_hit() {
        let (api, loader, _clock) = loader();

        loader.load_game("star-harbor").await.unwrap();
        loader.load_game("star-harbor").await.unwrap();

        assert_eq!(api.calls().fetch_game, 1);
    }

    #[tokio::test]
    async fn test_concurrent_loads_coalesce() {
        let (api, loader, _clock) = loader();

        let (a, b, c) = futures::join!(
            loader.load_game("ember-road"),
            loader.load_game("ember-road"),
            loader.load_game("ember-road"),
        );

        assert_eq!(a.unwrap().title, "Ember Road");
        assert_eq!(b.unwrap(), c.unwrap());
        assert_eq!(api.calls().fetch_game, 1);
        assert_eq!(loader.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_marker_visible_while_in_flight() {
        let (_api, loader, _clock) = loader();
        let cache = loader.cache();

        let load = loader.load_game("quiet-signal");
        futures::pin_mut!(load);
        assert!(futures::poll!(load.as_mut()).is_pending());
        assert!(cache.borrow().is_game_loading("quiet-signal"));

        load.await.unwrap();
        assert!(!cache.borrow().is_game_loading("quiet-signal"));
    }

    #[tokio::test]
    async fn test_stale_entry_refetches() {
        let (api, loader, clock) = loader();

        loader.load_game("star-harbor").await.unwrap();
        clock.advance(1_000);
        loader.load_game("star-harbor").await.unwrap();

        assert_eq!(api.calls().fetch_game, 2);
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_not_cached() {
        let (api, loader, _clock) = loader();
        api.fail_next(1);

        let (a, b) = futures::join!(loader.load_game("iron-tide"), loader.load_game("iron-tide"));
        assert!(matches!(a, Err(SyncError::Fetch(_))));
        assert_eq!(a, b);
        assert_eq!(api.calls().fetch_game, 1);

        assert!(loader.load_game("iron-tide").await.is_ok());
        assert_eq!(api.calls().fetch_game, 2);
    }

    #[tokio::test]
    async fn test_load_achievements_attaches_and_recomputes() {
        let (api, loader, _clock) = loader();

        let achievements = loader.load_achievements("hollow-depths").await.unwrap();
        assert_eq!(achievements.len(), 6);

        let game = loader.load_game("hollow-depths").await.unwrap();
        assert_eq!(game.unlocked_count, 2);
        assert_eq!(game.completion_rate, 33);

        loader.load_achievements("hollow-depths").await.unwrap();
        let calls = api.calls();
        assert_eq!(calls.fetch_game, 1);
        assert_eq!(calls.fetch_achievements, 1);
    }

    #[tokio::test]
    async fn test_unknown_game_is_not_found() {
        let (api, loader, _clock) = loader();

        let err = loader.load_achievements("missing").await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
        assert_eq!(api.calls().fetch_achievements, 0);
    }
}
