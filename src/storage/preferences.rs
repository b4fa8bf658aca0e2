//! Durable user preferences. One storage key per field, each defaulted on
//! its own so a corrupt value never blocks the rest.

use std::rc::Rc;

use chrono::Utc;
use tracing::warn;

use super::{load_or_default, save_json, storage_key, Storage};
use crate::models::{Collection, Density, PlatformId, Theme, UserProfile, ViewMode};

// == Keys ==
pub const THEME: &str = "theme";
pub const DENSITY: &str = "density";
pub const VIEW_MODE: &str = "view-mode";
pub const USER: &str = "user";
pub const COLLECTIONS: &str = "collections";
pub const FAVORITES: &str = "favorites";
pub const RECENT: &str = "recent";
pub const DEFAULT_PLATFORMS: &str = "default-platforms";
pub const SHOW_HIDDEN: &str = "show-hidden";
pub const AUTO_TRACK: &str = "auto-track";

/// Cap on the recently viewed list.
pub const MAX_RECENT: usize = 20;

pub struct Preferences {
    storage: Rc<dyn Storage>,
    pub theme: Theme,
    pub density: Density,
    pub view_mode: ViewMode,
    pub user: Option<UserProfile>,
    pub collections: Vec<Collection>,
    pub favorites: Vec<String>,
    /// Most recent first
    pub recent: Vec<String>,
    pub default_platforms: Vec<PlatformId>,
    pub show_hidden: bool,
    pub auto_track: bool,
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preferences")
            .field("theme", &self.theme)
            .field("density", &self.density)
            .field("view_mode", &self.view_mode)
            .field("signed_in", &self.user.is_some())
            .field("collections", &self.collections.len())
            .field("favorites", &self.favorites.len())
            .field("recent", &self.recent.len())
            .finish()
    }
}

impl Preferences {
    // == Load ==
    pub fn load(storage: Rc<dyn Storage>) -> Self {
        let s = storage.as_ref();
        let mut recent: Vec<String> = load_or_default(s, RECENT, Vec::new());
        recent.truncate(MAX_RECENT);

        Self {
            theme: load_or_default(s, THEME, Theme::default()),
            density: load_or_default(s, DENSITY, Density::default()),
            view_mode: load_or_default(s, VIEW_MODE, ViewMode::default()),
            user: load_or_default(s, USER, None),
            collections: load_or_default(s, COLLECTIONS, Vec::new()),
            favorites: load_or_default(s, FAVORITES, Vec::new()),
            recent,
            default_platforms: load_or_default(s, DEFAULT_PLATFORMS, vec![PlatformId::Steam]),
            show_hidden: load_or_default(s, SHOW_HIDDEN, false),
            auto_track: load_or_default(s, AUTO_TRACK, true),
            storage,
        }
    }

    fn persist<T: serde::Serialize + ?Sized>(&self, name: &str, value: &T) {
        if let Err(e) = save_json(self.storage.as_ref(), name, value) {
            warn!(key = name, error = %e, "Failed to persist preference");
        }
    }

    // == Appearance ==
    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        self.persist(THEME, &theme);
    }

    pub fn set_density(&mut self, density: Density) {
        self.density = density;
        self.persist(DENSITY, &density);
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) {
        self.view_mode = view_mode;
        self.persist(VIEW_MODE, &view_mode);
    }

    // == Account ==
    pub fn sign_in(&mut self, user: UserProfile) {
        self.persist(USER, &user);
        self.user = Some(user);
    }

    /// Signs out and forgets collections, favorites and recent views.
    pub fn sign_out(&mut self) {
        self.user = None;
        if let Err(e) = self.storage.remove_item(&storage_key(USER)) {
            warn!(key = USER, error = %e, "Failed to remove stored user");
        }
        self.collections.clear();
        self.favorites.clear();
        self.recent.clear();
        self.persist(COLLECTIONS, &self.collections);
        self.persist(FAVORITES, &self.favorites);
        self.persist(RECENT, &self.recent);
    }

    // == Favorites & Recent ==
    pub fn is_favorite(&self, game_id: &str) -> bool {
        self.favorites.iter().any(|id| id == game_id)
    }

    /// Returns whether the game is a favorite afterwards.
    pub fn toggle_favorite(&mut self, game_id: &str) -> bool {
        let now_favorite = match self.favorites.iter().position(|id| id == game_id) {
            Some(index) => {
                self.favorites.remove(index);
                false
            }
            None => {
                self.favorites.push(game_id.to_string());
                true
            }
        };
        self.persist(FAVORITES, &self.favorites);
        now_favorite
    }

    /// Moves `game_id` to the front, capped at [`MAX_RECENT`].
    pub fn add_recently_viewed(&mut self, game_id: &str) {
        self.recent.retain(|id| id != game_id);
        self.recent.insert(0, game_id.to_string());
        self.recent.truncate(MAX_RECENT);
        self.persist(RECENT, &self.recent);
    }

    pub fn clear_recently_viewed(&mut self) {
        self.recent.clear();
        self.persist(RECENT, &self.recent);
    }

    // == Collections ==
    pub fn create_collection(&mut self, name: &str, description: Option<String>) -> &Collection {
        let now = Utc::now();
        let collection = Collection {
            id: format!("collection-{}-{}", now.timestamp_millis(), self.collections.len()),
            name: name.to_string(),
            description,
            game_ids: Vec::new(),
            is_public: false,
            created_at: now,
            updated_at: now,
        };
        self.collections.push(collection);
        self.persist(COLLECTIONS, &self.collections);
        let last = self.collections.len() - 1;
        &self.collections[last]
    }

    pub fn delete_collection(&mut self, id: &str) -> bool {
        let before = self.collections.len();
        self.collections.retain(|c| c.id != id);
        let removed = self.collections.len() != before;
        if removed {
            self.persist(COLLECTIONS, &self.collections);
        }
        removed
    }

    pub fn add_to_collection(&mut self, collection_id: &str, game_id: &str) -> bool {
        let Some(collection) = self.collections.iter_mut().find(|c| c.id == collection_id) else {
            return false;
        };
        if collection.game_ids.iter().any(|id| id == game_id) {
            return false;
        }
        collection.game_ids.push(game_id.to_string());
        collection.updated_at = Utc::now();
        self.persist(COLLECTIONS, &self.collections);
        true
    }

    pub fn remove_from_collection(&mut self, collection_id: &str, game_id: &str) -> bool {
        let Some(collection) = self.collections.iter_mut().find(|c| c.id == collection_id) else {
            return false;
        };
        let before = collection.game_ids.len();
        collection.game_ids.retain(|id| id != game_id);
        if collection.game_ids.len() == before {
            return false;
        }
        collection.updated_at = Utc::now();
        self.persist(COLLECTIONS, &self.collections);
        true
    }

    // == Tracking ==
    pub fn set_default_platforms(&mut self, platforms: Vec<PlatformId>) {
        self.default_platforms = crate::models::search::dedup_in_order(platforms);
        self.persist(DEFAULT_PLATFORMS, &self.default_platforms);
    }

    pub fn set_show_hidden(&mut self, show: bool) {
        self.show_hidden = show;
        self.persist(SHOW_HIDDEN, &show);
    }

    pub fn set_auto_track(&mut self, auto_track: bool) {
        self.auto_track = auto_track;
        self.persist(AUTO_TRACK, &auto_track);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn storage() -> Rc<MemoryStorage> {
        Rc::new(MemoryStorage::new())
    }

    fn profile() -> UserProfile {
        UserProfile {
            id: "user-1".to_string(),
            display_name: "Demo".to_string(),
            avatar: None,
            country: Some("US".to_string()),
            bio: None,
            platform_ids: vec![PlatformId::Steam],
            totals: Default::default(),
        }
    }

    #[test]
    fn test_defaults_when_empty() {
        let prefs = Preferences::load(storage());

        assert_eq!(prefs.theme, Theme::Dark);
        assert_eq!(prefs.density, Density::Comfortable);
        assert_eq!(prefs.view_mode, ViewMode::Grid);
        assert_eq!(prefs.default_platforms, vec![PlatformId::Steam]);
        assert!(!prefs.show_hidden);
        assert!(prefs.auto_track);
        assert!(prefs.user.is_none());
    }

    #[test]
    fn test_corrupt_key_does_not_block_others() {
        let storage = storage();
        storage.set_item(&storage_key(THEME), "\"contrast\"").unwrap();
        storage.set_item(&storage_key(FAVORITES), "[1, oops").unwrap();
        storage.set_item(&storage_key(SHOW_HIDDEN), "true").unwrap();
        storage.set_item(&storage_key(DENSITY), "\"gigantic\"").unwrap();

        let prefs = Preferences::load(storage);

        assert_eq!(prefs.theme, Theme::Contrast);
        assert!(prefs.favorites.is_empty());
        assert!(prefs.show_hidden);
        assert_eq!(prefs.density, Density::Comfortable);
    }

    #[test]
    fn test_bare_theme_word_loads() {
        let storage = storage();
        storage.set_item(&storage_key(THEME), "contrast").unwrap();

        assert_eq!(Preferences::load(storage).theme, Theme::Contrast);
    }

    #[test]
    fn test_mutators_persist() {
        let storage = storage();
        let mut prefs = Preferences::load(storage.clone());
        prefs.set_theme(Theme::Contrast);
        prefs.set_view_mode(ViewMode::List);
        prefs.toggle_favorite("g1");
        prefs.set_auto_track(false);
        prefs.sign_in(profile());

        let reloaded = Preferences::load(storage);
        assert_eq!(reloaded.theme, Theme::Contrast);
        assert_eq!(reloaded.view_mode, ViewMode::List);
        assert_eq!(reloaded.favorites, vec!["g1".to_string()]);
        assert!(!reloaded.auto_track);
        assert_eq!(reloaded.user.map(|u| u.id), Some("user-1".to_string()));
    }

    #[test]
    fn test_recent_moves_to_front_and_caps() {
        let mut prefs = Preferences::load(storage());
        for i in 0..25 {
            prefs.add_recently_viewed(&format!("g{i}"));
        }
        prefs.add_recently_viewed("g10");

        assert_eq!(prefs.recent.len(), MAX_RECENT);
        assert_eq!(prefs.recent[0], "g10");
        assert_eq!(prefs.recent[1], "g24");
        assert_eq!(prefs.recent.iter().filter(|id| *id == "g10").count(), 1);
    }

    #[test]
    fn test_toggle_favorite() {
        let mut prefs = Preferences::load(storage());
        assert!(prefs.toggle_favorite("g1"));
        assert!(prefs.is_favorite("g1"));
        assert!(!prefs.toggle_favorite("g1"));
        assert!(!prefs.is_favorite("g1"));
    }

    #[test]
    fn test_collections() {
        let storage = storage();
        let mut prefs = Preferences::load(storage.clone());
        let id = prefs.create_collection("Backlog", None).id.clone();

        assert!(prefs.add_to_collection(&id, "g1"));
        assert!(!prefs.add_to_collection(&id, "g1"));
        assert!(!prefs.add_to_collection("missing", "g1"));

        let reloaded = Preferences::load(storage.clone());
        assert_eq!(reloaded.collections[0].game_ids, vec!["g1".to_string()]);

        assert!(prefs.remove_from_collection(&id, "g1"));
        assert!(prefs.delete_collection(&id));
        assert!(Preferences::load(storage).collections.is_empty());
    }

    #[test]
    fn test_sign_out_clears_user_data() {
        let storage = storage();
        let mut prefs = Preferences::load(storage.clone());
        prefs.sign_in(profile());
        prefs.toggle_favorite("g1");
        prefs.add_recently_viewed("g2");

        prefs.sign_out();

        let reloaded = Preferences::load(storage);
        assert!(reloaded.user.is_none());
        assert!(reloaded.favorites.is_empty());
        assert!(reloaded.recent.is_empty());
    }
}
