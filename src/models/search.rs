//! Search state: query, filters, sort and pagination, plus result pages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::catalog::PlatformId;
use crate::error::SyncError;

// == Sort Key ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Relevance,
    Popularity,
    Rarity,
    Completion,
    Alphabetical,
}

impl SortKey {
    pub const NAMES: [&'static str; 5] = [
        "relevance",
        "popularity",
        "rarity",
        "completion",
        "alphabetical",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Relevance => "relevance",
            SortKey::Popularity => "popularity",
            SortKey::Rarity => "rarity",
            SortKey::Completion => "completion",
            SortKey::Alphabetical => "alphabetical",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relevance" => Ok(SortKey::Relevance),
            "popularity" => Ok(SortKey::Popularity),
            "rarity" => Ok(SortKey::Rarity),
            "completion" => Ok(SortKey::Completion),
            "alphabetical" => Ok(SortKey::Alphabetical),
            other => Err(SyncError::invalid_param("sort", format!("unknown sort '{other}'"))),
        }
    }
}

// == Filters ==
/// Optional inclusive bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeFilter {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl RangeFilter {
    pub fn new(min: Option<i64>, max: Option<i64>) -> Self {
        Self { min, max }
    }

    pub fn is_active(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    /// Tests `value` against the bounds, substituting `floor`/`ceil` for
    /// unset ends.
    pub fn contains(&self, value: f64, floor: i64, ceil: i64) -> bool {
        let min = self.min.unwrap_or(floor) as f64;
        let max = self.max.unwrap_or(ceil) as f64;
        value >= min && value <= max
    }
}

/// One filter category; each contributes at most 1 to the active count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterCategory {
    Platforms,
    Genres,
    Tags,
    Rarity,
    Completion,
    Playtime,
}

impl FilterCategory {
    pub const ALL: [FilterCategory; 6] = [
        FilterCategory::Platforms,
        FilterCategory::Genres,
        FilterCategory::Tags,
        FilterCategory::Rarity,
        FilterCategory::Completion,
        FilterCategory::Playtime,
    ];
}

/// Set-valued filters keep first-insertion order and never hold duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    pub platforms: Vec<PlatformId>,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub rarity: RangeFilter,
    pub completion: RangeFilter,
    pub playtime: RangeFilter,
}

impl FilterSet {
    pub fn is_active(&self, category: FilterCategory) -> bool {
        match category {
            FilterCategory::Platforms => !self.platforms.is_empty(),
            FilterCategory::Genres => !self.genres.is_empty(),
            FilterCategory::Tags => !self.tags.is_empty(),
            FilterCategory::Rarity => self.rarity.is_active(),
            FilterCategory::Completion => self.completion.is_active(),
            FilterCategory::Playtime => self.playtime.is_active(),
        }
    }

    /// Number of active categories, in `0..=6`.
    pub fn active_count(&self) -> usize {
        FilterCategory::ALL
            .into_iter()
            .filter(|c| self.is_active(*c))
            .count()
    }

    pub fn clear(&mut self, category: FilterCategory) {
        match category {
            FilterCategory::Platforms => self.platforms.clear(),
            FilterCategory::Genres => self.genres.clear(),
            FilterCategory::Tags => self.tags.clear(),
            FilterCategory::Rarity => self.rarity = RangeFilter::default(),
            FilterCategory::Completion => self.completion = RangeFilter::default(),
            FilterCategory::Playtime => self.playtime = RangeFilter::default(),
        }
    }

    pub fn toggle_platform(&mut self, platform: PlatformId) {
        toggle(&mut self.platforms, platform);
    }

    pub fn toggle_genre(&mut self, genre: &str) {
        toggle(&mut self.genres, genre.to_string());
    }

    pub fn toggle_tag(&mut self, tag: &str) {
        toggle(&mut self.tags, tag.to_string());
    }
}

fn toggle<T: PartialEq>(items: &mut Vec<T>, item: T) {
    match items.iter().position(|existing| *existing == item) {
        Some(index) => {
            items.remove(index);
        }
        None => items.push(item),
    }
}

/// Removes later duplicates, keeping first occurrences in order.
pub fn dedup_in_order<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

// == Search State ==
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchState {
    pub query: String,
    pub filters: FilterSet,
    pub sort: SortKey,
    /// `>= 1`
    pub page: u32,
    /// `> 0`
    pub limit: u32,
}

impl SearchState {
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            ..Self::default()
        }
    }
}

impl Default for SearchState {
    fn default() -> Self {
        Self {
            query: String::new(),
            filters: FilterSet::default(),
            sort: SortKey::default(),
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

// == Result Page ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPage<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl<T> ResultPage<T> {
    pub fn new(data: Vec<T>, total: u64, page: u32, limit: u32) -> Self {
        Self {
            data,
            total,
            page,
            limit,
            has_more: has_more(page, limit, total),
        }
    }
}

/// `page * limit < total`, without overflow.
pub fn has_more(page: u32, limit: u32, total: u64) -> bool {
    u64::from(page) * u64::from(limit) < total
}
