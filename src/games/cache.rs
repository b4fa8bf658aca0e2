//! Game Cache
//!
//! Per-game cache entries holding the game and its achievements. Derived
//! aggregates on the game are recomputed inside every call that changes
//! achievements, so they are never observably stale.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{CacheStats, Sweep, TtlCache};
use crate::clock::{Clock, SystemClock};
use crate::error::{Result, SyncError};
use crate::models::{Achievement, AchievementPatch, Game, GamePatch};

/// One cached game and whatever achievements have been attached to it.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRecord {
    pub game: Game,
    /// Empty until attached
    pub achievements: Vec<Achievement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadKind {
    Game,
    Achievements,
}

/// Issued when a load starts; only the newest ticket per id and kind may
/// write its result back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub id: String,
    pub kind: LoadKind,
    generation: u64,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

// == Stats ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RarityBreakdown {
    /// rarity >= 50
    pub common: usize,
    /// 20 <= rarity < 50
    pub uncommon: usize,
    /// 5 <= rarity < 20
    pub rare: usize,
    /// rarity < 5
    pub epic: usize,
}

impl RarityBreakdown {
    fn count(&mut self, rarity: f64) {
        match rarity {
            r if r >= 50.0 => self.common += 1,
            r if r >= 20.0 => self.uncommon += 1,
            r if r >= 5.0 => self.rare += 1,
            _ => self.epic += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PointTotals {
    pub total: u32,
    pub earned: u32,
}

/// Summary over the attached achievements of one game.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameStats {
    pub total_achievements: usize,
    pub unlocked_achievements: usize,
    /// Unrounded percentage over attached achievements
    pub completion_rate: f64,
    pub rarity: RarityBreakdown,
    pub unlocked_by_rarity: RarityBreakdown,
    pub points: PointTotals,
}

// == Game Cache ==
#[derive(Debug)]
pub struct GameCache<C = SystemClock> {
    entries: TtlCache<String, GameRecord, C>,
    /// Loads in flight, keyed by kind and id, holding the current ticket's
    /// generation. Entries are dropped once their load settles.
    in_flight: HashMap<(LoadKind, String), u64>,
    /// Cache-wide, so a pruned key never hands out a generation again.
    next_generation: u64,
}

impl GameCache<SystemClock> {
    pub fn new(ttl_ms: u64) -> Self {
        Self::with_clock(ttl_ms, SystemClock)
    }
}

impl<C: Clock> GameCache<C> {
    pub fn with_clock(ttl_ms: u64, clock: C) -> Self {
        Self {
            entries: TtlCache::with_clock(ttl_ms, clock),
            in_flight: HashMap::new(),
            next_generation: 0,
        }
    }

    // == Reads ==
    /// Fresh game, or `None` when absent or stale.
    pub fn get_game(&mut self, id: &str) -> Option<&Game> {
        self.entries.get(id).map(|record| &record.game)
    }

    /// Fresh, non-empty achievement list.
    pub fn get_achievements(&mut self, id: &str) -> Option<&[Achievement]> {
        self.entries
            .get(id)
            .filter(|record| !record.achievements.is_empty())
            .map(|record| record.achievements.as_slice())
    }

    pub fn get_record(&mut self, id: &str) -> Option<&GameRecord> {
        self.entries.get(id)
    }

    /// When the entry was last loaded or mutated, in clock milliseconds.
    pub fn loaded_at(&mut self, id: &str) -> Option<u64> {
        self.entries.entry(id).map(|entry| entry.inserted_at)
    }

    pub fn contains(&mut self, id: &str) -> bool {
        self.entries.has(id)
    }

    // == Writes ==
    /// Inserts or replaces the game, keeping attached achievements and
    /// resetting the freshness window.
    pub fn set_game(&mut self, game: Game) {
        let achievements = self
            .entries
            .remove(game.id.as_str())
            .map(|record| record.achievements)
            .unwrap_or_default();
        let mut record = GameRecord { game, achievements };
        recompute(&mut record);
        self.entries.set(record.game.id.clone(), record);
    }

    /// Stores achievements for a cached game and recomputes its aggregates.
    pub fn attach_achievements(&mut self, id: &str, achievements: Vec<Achievement>) -> Result<()> {
        let record = self
            .entries
            .refresh(id)
            .ok_or_else(|| SyncError::NotFound(format!("game '{id}' is not cached")))?;
        record.achievements = achievements;
        recompute(record);
        Ok(())
    }

    /// Inserts games whose ids are not cached yet. Returns how many were added.
    pub fn preload<I>(&mut self, games: I) -> usize
    where
        I: IntoIterator<Item = Game>,
    {
        let mut added = 0;
        for game in games {
            if !self.entries.has(game.id.as_str()) {
                self.set_game(game);
                added += 1;
            }
        }
        added
    }

    // == Mutations ==
    /// Applies an explicit set of game field changes.
    pub fn patch_game(&mut self, id: &str, patch: GamePatch) -> Result<()> {
        let record = self.record_mut(id)?;
        let game = &mut record.game;
        if let Some(title) = patch.title {
            game.title = title;
        }
        if let Some(subtitle) = patch.subtitle {
            game.subtitle = Some(subtitle);
        }
        if let Some(rating) = patch.rating {
            game.rating = Some(rating);
        }
        if let Some(price) = patch.price {
            game.price = Some(price);
        }
        if let Some(tags) = patch.tags {
            game.tags = tags;
        }
        if let Some(hours) = patch.average_playtime_hours {
            game.average_playtime_hours = Some(hours);
        }
        recompute(record);
        Ok(())
    }

    /// Applies an explicit set of achievement field changes, then
    /// recomputes the parent game in the same call.
    pub fn update_achievement(
        &mut self,
        game_id: &str,
        achievement_id: &str,
        patch: AchievementPatch,
    ) -> Result<()> {
        let now = self.unlock_timestamp();
        let record = self.record_mut(game_id)?;
        let achievement = record
            .achievements
            .iter_mut()
            .find(|a| a.id == achievement_id)
            .ok_or_else(|| SyncError::NotFound(format!("achievement '{achievement_id}'")))?;

        if let Some(unlocked) = patch.unlocked {
            if unlocked != achievement.unlocked {
                achievement.unlocked_at = unlocked.then_some(now);
            }
            achievement.unlocked = unlocked;
        }
        if let Some(rarity) = patch.rarity {
            achievement.rarity = rarity;
        }
        if let Some(points) = patch.points {
            achievement.points = Some(points);
        }
        recompute(record);
        Ok(())
    }

    /// Flips one achievement. Returns its new unlocked state.
    pub fn toggle_achievement(&mut self, game_id: &str, achievement_id: &str) -> Result<bool> {
        let unlocked = self
            .record_mut(game_id)?
            .achievements
            .iter()
            .find(|a| a.id == achievement_id)
            .map(|a| !a.unlocked)
            .ok_or_else(|| SyncError::NotFound(format!("achievement '{achievement_id}'")))?;

        self.update_achievement(game_id, achievement_id, AchievementPatch::unlocked(unlocked))?;
        Ok(unlocked)
    }

    fn record_mut(&mut self, id: &str) -> Result<&mut GameRecord> {
        self.entries
            .refresh(id)
            .ok_or_else(|| SyncError::NotFound(format!("game '{id}' is not cached")))
    }

    fn unlock_timestamp(&self) -> DateTime<Utc> {
        let ms = i64::try_from(self.entries.clock().now_ms()).unwrap_or(i64::MAX);
        DateTime::from_timestamp_millis(ms).unwrap_or_default()
    }

    // == Loading ==
    /// Marks `id` as loading and issues a ticket superseding older ones.
    pub fn begin_load(&mut self, id: &str, kind: LoadKind) -> LoadTicket {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.in_flight.insert((kind, id.to_string()), generation);
        LoadTicket {
            id: id.to_string(),
            kind,
            generation,
        }
    }

    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        self.in_flight
            .get(&(ticket.kind, ticket.id.clone()))
            .is_some_and(|generation| *generation == ticket.generation)
    }

    pub fn is_loading(&self, id: &str, kind: LoadKind) -> bool {
        self.in_flight.contains_key(&(kind, id.to_string()))
    }

    /// Number of (kind, id) loads still awaiting their result.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_game_loading(&self, id: &str) -> bool {
        self.is_loading(id, LoadKind::Game)
    }

    pub fn is_achievements_loading(&self, id: &str) -> bool {
        self.is_loading(id, LoadKind::Achievements)
    }

    /// Writes a finished game load back. Returns false when the ticket was
    /// superseded and the result dropped.
    pub fn finish_game(&mut self, ticket: &LoadTicket, result: &Result<Game>) -> bool {
        if !self.settle(ticket) {
            return false;
        }
        if let Ok(game) = result {
            self.set_game(game.clone());
        }
        true
    }

    /// Writes a finished achievements load back.
    pub fn finish_achievements(
        &mut self,
        ticket: &LoadTicket,
        result: &Result<Vec<Achievement>>,
    ) -> bool {
        if !self.settle(ticket) {
            return false;
        }
        if let Ok(achievements) = result {
            if let Err(e) = self.attach_achievements(&ticket.id, achievements.clone()) {
                warn!(id = %ticket.id, error = %e, "Dropping achievements for uncached game");
            }
        }
        true
    }

    fn settle(&mut self, ticket: &LoadTicket) -> bool {
        if !self.is_current(ticket) {
            debug!(
                id = %ticket.id,
                kind = ?ticket.kind,
                generation = ticket.generation,
                "Discarding superseded load"
            );
            return false;
        }
        self.in_flight.remove(&(ticket.kind, ticket.id.clone()));
        true
    }

    // == Removal ==
    /// Drops the entry and its loading markers; in-flight loads for it are
    /// superseded.
    pub fn remove(&mut self, id: &str) -> Option<GameRecord> {
        for kind in [LoadKind::Game, LoadKind::Achievements] {
            self.in_flight.remove(&(kind, id.to_string()));
        }
        self.entries.remove(id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.in_flight.clear();
    }

    // == Queries ==
    /// Fresh cached games matching `term`, ordered by title.
    pub fn search_cached(&self, term: &str) -> Vec<Game> {
        let mut games: Vec<Game> = self
            .entries
            .iter_fresh()
            .map(|(_, record)| &record.game)
            .filter(|game| game.matches_term(term))
            .cloned()
            .collect();
        games.sort_by(|a, b| a.title.cmp(&b.title));
        games
    }

    pub fn stats(&mut self, id: &str) -> Option<GameStats> {
        let record = self.entries.get(id)?;
        let achievements = &record.achievements;

        let mut stats = GameStats {
            total_achievements: achievements.len(),
            unlocked_achievements: 0,
            completion_rate: 0.0,
            rarity: RarityBreakdown::default(),
            unlocked_by_rarity: RarityBreakdown::default(),
            points: PointTotals::default(),
        };
        for achievement in achievements {
            let points = achievement.points.unwrap_or(0);
            stats.rarity.count(achievement.rarity);
            stats.points.total += points;
            if achievement.unlocked {
                stats.unlocked_achievements += 1;
                stats.unlocked_by_rarity.count(achievement.rarity);
                stats.points.earned += points;
            }
        }
        if stats.total_achievements > 0 {
            stats.completion_rate =
                stats.unlocked_achievements as f64 / stats.total_achievements as f64 * 100.0;
        }
        Some(stats)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.entries.stats()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C: Clock> Sweep for GameCache<C> {
    fn sweep(&mut self) -> usize {
        self.entries.sweep()
    }
}

/// Recomputes derived aggregates. With achievements attached they are the
/// source of the unlocked count; otherwise the fetched count stands.
fn recompute(record: &mut GameRecord) {
    let game = &mut record.game;
    if !record.achievements.is_empty() {
        let unlocked = record.achievements.iter().filter(|a| a.unlocked).count();
        game.unlocked_count = u32::try_from(unlocked).unwrap_or(u32::MAX);
    }
    game.completion_rate = completion_rate(game.unlocked_count, game.total_achievements);
}

/// `round(unlocked / total * 100)`, or 0 when `total` is 0.
pub fn completion_rate(unlocked: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (f64::from(unlocked) / f64::from(total) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn achievement(id: &str, game_id: &str, rarity: f64, unlocked: bool, points: u32) -> Achievement {
        Achievement {
            id: id.to_string(),
            game_id: game_id.to_string(),
            name: id.to_uppercase(),
            description: None,
            icon: None,
            rarity,
            unlocked,
            unlocked_at: None,
            points: Some(points),
        }
    }

    fn fixture() -> (ManualClock, GameCache<ManualClock>) {
        let clock = ManualClock::new(0);
        let mut cache = GameCache::with_clock(1_000, clock.clone());
        cache.set_game(Game::new("g1", "Hollow Depths", 3));
        cache
            .attach_achievements(
                "g1",
                vec![
                    achievement("a", "g1", 80.0, true, 10),
                    achievement("b", "g1", 12.0, false, 50),
                    achievement("c", "g1", 2.0, false, 100),
                ],
            )
            .unwrap();
        (clock, cache)
    }

    #[test]
    fn test_completion_rate_rounding() {
        assert_eq!(completion_rate(1, 3), 33);
        assert_eq!(completion_rate(2, 3), 67);
        assert_eq!(completion_rate(1, 2), 50);
        assert_eq!(completion_rate(0, 0), 0);
        assert_eq!(completion_rate(5, 0), 0);
    }

    #[test]
    fn test_attach_recomputes_aggregates() {
        let (_clock, mut cache) = fixture();
        let game = cache.get_game("g1").unwrap();

        assert_eq!(game.unlocked_count, 1);
        assert_eq!(game.completion_rate, 33);
    }

    #[test]
    fn test_attach_to_uncached_game_fails() {
        let mut cache = GameCache::with_clock(1_000, ManualClock::new(0));
        let err = cache.attach_achievements("nope", Vec::new()).unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[test]
    fn test_toggle_recomputes_in_same_call() {
        let (clock, mut cache) = fixture();
        clock.advance(500);

        assert!(cache.toggle_achievement("g1", "b").unwrap());
        let game = cache.get_game("g1").unwrap().clone();
        assert_eq!(game.unlocked_count, 2);
        assert_eq!(game.completion_rate, 67);

        let unlocked_at = cache.get_achievements("g1").unwrap()[1].unlocked_at;
        assert_eq!(unlocked_at.map(|t| t.timestamp_millis()), Some(500));

        assert!(!cache.toggle_achievement("g1", "b").unwrap());
        assert_eq!(cache.get_game("g1").unwrap().completion_rate, 33);
        assert_eq!(cache.get_achievements("g1").unwrap()[1].unlocked_at, None);
    }

    #[test]
    fn test_mutation_refreshes_loaded_at() {
        let (clock, mut cache) = fixture();
        clock.advance(900);
        cache.toggle_achievement("g1", "a").unwrap();
        clock.advance(900);

        assert!(cache.get_game("g1").is_some(), "toggle restarted the window");
        assert_eq!(cache.loaded_at("g1"), Some(900));
    }

    #[test]
    fn test_stale_entry_is_a_miss() {
        let (clock, mut cache) = fixture();
        clock.advance(999);
        assert!(cache.get_game("g1").is_some());
        clock.advance(1);
        assert!(cache.get_game("g1").is_none());
        assert!(cache.toggle_achievement("g1", "a").is_err());
    }

    #[test]
    fn test_set_game_keeps_achievements() {
        let (_clock, mut cache) = fixture();
        let mut refetched = Game::new("g1", "Hollow Depths: Remastered", 3);
        refetched.unlocked_count = 0;
        cache.set_game(refetched);

        assert_eq!(cache.get_achievements("g1").unwrap().len(), 3);
        let game = cache.get_game("g1").unwrap();
        assert_eq!(game.title, "Hollow Depths: Remastered");
        assert_eq!(game.unlocked_count, 1);
        assert_eq!(game.completion_rate, 33);
    }

    #[test]
    fn test_empty_achievements_are_a_miss() {
        let mut cache = GameCache::with_clock(1_000, ManualClock::new(0));
        cache.set_game(Game::new("g2", "Iron Tide", 0));

        assert!(cache.get_game("g2").is_some());
        assert!(cache.get_achievements("g2").is_none());
    }

    #[test]
    fn test_patch_game_leaves_aggregates_consistent() {
        let (_clock, mut cache) = fixture();
        cache
            .patch_game(
                "g1",
                GamePatch {
                    rating: Some(4.9),
                    tags: Some(vec!["Indie".to_string()]),
                    ..GamePatch::default()
                },
            )
            .unwrap();

        let game = cache.get_game("g1").unwrap();
        assert_eq!(game.rating, Some(4.9));
        assert_eq!(game.tags, vec!["Indie".to_string()]);
        assert_eq!(game.completion_rate, 33);
    }

    #[test]
    fn test_update_achievement_patch() {
        let (_clock, mut cache) = fixture();
        cache
            .update_achievement(
                "g1",
                "c",
                AchievementPatch {
                    unlocked: Some(true),
                    points: Some(5),
                    ..AchievementPatch::default()
                },
            )
            .unwrap();

        let stats = cache.stats("g1").unwrap();
        assert_eq!(stats.unlocked_achievements, 2);
        assert_eq!(stats.points, PointTotals { total: 65, earned: 15 });
        assert!(cache.update_achievement("g1", "zzz", AchievementPatch::default()).is_err());
    }

    #[test]
    fn test_stats_buckets() {
        let (_clock, mut cache) = fixture();
        let stats = cache.stats("g1").unwrap();

        assert_eq!(stats.total_achievements, 3);
        assert_eq!(
            stats.rarity,
            RarityBreakdown {
                common: 1,
                uncommon: 0,
                rare: 1,
                epic: 1
            }
        );
        assert_eq!(stats.unlocked_by_rarity.common, 1);
        assert_eq!(stats.points, PointTotals { total: 160, earned: 10 });
        assert!((stats.completion_rate - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_load_tickets_supersede() {
        let mut cache = GameCache::with_clock(1_000, ManualClock::new(0));
        let first = cache.begin_load("g1", LoadKind::Game);
        let second = cache.begin_load("g1", LoadKind::Game);
        assert!(cache.is_game_loading("g1"));

        assert!(!cache.finish_game(&first, &Ok(Game::new("g1", "Old", 1))));
        assert!(cache.get_game("g1").is_none());
        assert!(cache.is_game_loading("g1"));

        assert!(cache.finish_game(&second, &Ok(Game::new("g1", "New", 1))));
        assert_eq!(cache.get_game("g1").unwrap().title, "New");
        assert!(!cache.is_game_loading("g1"));
    }

    #[test]
    fn test_failed_load_clears_marker_only() {
        let mut cache = GameCache::with_clock(1_000, ManualClock::new(0));
        let ticket = cache.begin_load("g1", LoadKind::Achievements);
        assert!(cache.is_achievements_loading("g1"));

        assert!(cache.finish_achievements(&ticket, &Err(SyncError::Fetch("boom".into()))));
        assert!(!cache.is_achievements_loading("g1"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_supersedes_in_flight() {
        let (_clock, mut cache) = fixture();
        let ticket = cache.begin_load("g1", LoadKind::Game);
        assert!(cache.remove("g1").is_some());
        assert!(!cache.is_game_loading("g1"));

        assert!(!cache.finish_game(&ticket, &Ok(Game::new("g1", "Late", 3))));
        assert!(cache.get_game("g1").is_none());
    }

    #[test]
    fn test_preload_skips_cached() {
        let (_clock, mut cache) = fixture();
        let added = cache.preload(vec![
            Game::new("g1", "Should Not Replace", 3),
            Game::new("g2", "Star Harbor", 5),
        ]);

        assert_eq!(added, 1);
        assert_eq!(cache.get_game("g1").unwrap().title, "Hollow Depths");
        assert!(cache.contains("g2"));
    }

    #[test]
    fn test_search_cached_and_sweep() {
        let (clock, mut cache) = fixture();
        clock.advance(600);
        cache.set_game(Game::new("g2", "Star Harbor", 5));

        assert_eq!(cache.search_cached("star").len(), 1);
        assert!(cache.search_cached(" ").is_empty());

        clock.advance(500);
        assert!(cache.search_cached("hollow").is_empty());
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_supersedes_everything() {
        let (_clock, mut cache) = fixture();
        let ticket = cache.begin_load("g1", LoadKind::Achievements);
        cache.clear();

        assert!(cache.is_empty());
        assert!(!cache.is_current(&ticket));
        assert_eq!(cache.in_flight_count(), 0);
    }

    #[test]
    fn test_settled_loads_are_pruned() {
        let (_clock, mut cache) = fixture();
        for id in ["g1", "g2", "g3"] {
            let ticket = cache.begin_load(id, LoadKind::Game);
            cache.finish_game(&ticket, &Ok(Game::new(id, id, 0)));
            let ticket = cache.begin_load(id, LoadKind::Achievements);
            cache.finish_achievements(&ticket, &Err(SyncError::Fetch("boom".into())));
        }
        assert_eq!(cache.in_flight_count(), 0);

        let first = cache.begin_load("g1", LoadKind::Game);
        let second = cache.begin_load("g1", LoadKind::Game);
        assert_eq!(cache.in_flight_count(), 1);
        cache.finish_game(&second, &Ok(Game::new("g1", "New", 0)));
        assert_eq!(cache.in_flight_count(), 0);
        assert!(!cache.finish_game(&first, &Ok(Game::new("g1", "Old", 0))));
        assert_eq!(cache.get_game("g1").unwrap().title, "New");
    }

    #[test]
    fn test_pruned_key_never_reissues_a_generation() {
        let (_clock, mut cache) = fixture();
        let stale = cache.begin_load("g1", LoadKind::Game);
        cache.remove("g1");
        assert_eq!(cache.in_flight_count(), 0);

        let fresh = cache.begin_load("g1", LoadKind::Game);
        assert_ne!(fresh.generation(), stale.generation());
        assert!(!cache.is_current(&stale));
        assert!(!cache.finish_game(&stale, &Ok(Game::new("g1", "Late", 3))));
        assert!(cache.is_game_loading("g1"));

        assert!(cache.finish_game(&fresh, &Ok(Game::new("g1", "Fresh", 3))));
        assert_eq!(cache.get_game("g1").unwrap().title, "Fresh");
    }
}
