//! Catalog entities: games, their achievements and the platforms they ship on.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

// == Platform ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformId {
    Steam,
    Xbox,
    Playstation,
    Gog,
    Epic,
    Nintendo,
}

impl PlatformId {
    pub const ALL: [PlatformId; 6] = [
        PlatformId::Steam,
        PlatformId::Xbox,
        PlatformId::Playstation,
        PlatformId::Gog,
        PlatformId::Epic,
        PlatformId::Nintendo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformId::Steam => "steam",
            PlatformId::Xbox => "xbox",
            PlatformId::Playstation => "playstation",
            PlatformId::Gog => "gog",
            PlatformId::Epic => "epic",
            PlatformId::Nintendo => "nintendo",
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformId {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlatformId::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| SyncError::invalid_param("platforms", format!("unknown platform '{s}'")))
    }
}

// == Achievement ==
/// A sub-entity of a game that a player can unlock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    pub game_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    /// Percentage of players holding it, 0..100 (lower is rarer)
    pub rarity: f64,
    #[serde(default)]
    pub unlocked: bool,
    #[serde(default)]
    pub unlocked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub points: Option<u32>,
}

/// Fields of an achievement a caller may change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AchievementPatch {
    pub unlocked: Option<bool>,
    pub rarity: Option<f64>,
    pub points: Option<u32>,
}

impl AchievementPatch {
    pub fn unlocked(unlocked: bool) -> Self {
        Self {
            unlocked: Some(unlocked),
            ..Self::default()
        }
    }
}

// == Game ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub platforms: Vec<PlatformId>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub developer: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub average_playtime_hours: Option<f64>,
    #[serde(default)]
    pub completion_estimate_hours: Option<f64>,
    /// Derived: percentage of achievements unlocked, recomputed by the game cache
    #[serde(default)]
    pub completion_rate: u32,
    pub total_achievements: u32,
    /// Derived: number of unlocked achievements, recomputed by the game cache
    #[serde(default)]
    pub unlocked_count: u32,
    /// 0..5
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Game {
    /// Minimal game, mostly useful for fixtures.
    pub fn new(id: impl Into<String>, title: impl Into<String>, total_achievements: u32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            subtitle: None,
            platforms: Vec::new(),
            genres: Vec::new(),
            release_date: None,
            developer: None,
            publisher: None,
            average_playtime_hours: None,
            completion_estimate_hours: None,
            completion_rate: 0,
            total_achievements,
            unlocked_count: 0,
            rating: None,
            price: None,
            tags: Vec::new(),
        }
    }

    /// Case-insensitive match over title, developer, publisher, genres and tags.
    pub fn matches_term(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return false;
        }
        let hit = |s: &str| s.to_lowercase().contains(&term);

        hit(&self.title)
            || self.developer.as_deref().is_some_and(hit)
            || self.publisher.as_deref().is_some_and(hit)
            || self.genres.iter().any(|g| hit(g))
            || self.tags.iter().any(|t| hit(t))
    }
}

/// Fields of a game a caller may change. Derived aggregates are deliberately absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GamePatch {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub rating: Option<f64>,
    pub price: Option<String>,
    pub tags: Option<Vec<String>>,
    pub average_playtime_hours: Option<f64>,
}
