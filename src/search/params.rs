//! URL mapping for search state.

use crate::models::search::dedup_in_order;
use crate::models::{FilterSet, PlatformId, RangeFilter, SearchState, SortKey};
use crate::query_params::{ParamMap, ParamSpec, ParamValue, QueryParamSchema};

// == Keys ==
pub const QUERY: &str = "q";
pub const SORT: &str = "sort";
pub const PAGE: &str = "page";
pub const PLATFORMS: &str = "platforms";
pub const GENRES: &str = "genres";
pub const TAGS: &str = "tags";
pub const RARITY_MIN: &str = "rarity_min";
pub const RARITY_MAX: &str = "rarity_max";
pub const COMPLETION_MIN: &str = "completion_min";
pub const COMPLETION_MAX: &str = "completion_max";
pub const PLAYTIME_MIN: &str = "playtime_min";
pub const PLAYTIME_MAX: &str = "playtime_max";

/// Every recognized search key. `limit` is session configuration and
/// never travels in the URL.
pub fn search_schema() -> QueryParamSchema {
    QueryParamSchema::new()
        .param(QUERY, ParamSpec::text())
        .param(SORT, ParamSpec::one_of("relevance", &SortKey::NAMES))
        .param(PAGE, ParamSpec::positive_int(1))
        .param(
            PLATFORMS,
            ParamSpec::list_of(|item| {
                item.to_lowercase()
                    .parse::<PlatformId>()
                    .map(|p| p.as_str().to_string())
            }),
        )
        .param(GENRES, ParamSpec::list())
        .param(TAGS, ParamSpec::list())
        .param(RARITY_MIN, ParamSpec::optional_int())
        .param(RARITY_MAX, ParamSpec::optional_int())
        .param(COMPLETION_MIN, ParamSpec::optional_int())
        .param(COMPLETION_MAX, ParamSpec::optional_int())
        .param(PLAYTIME_MIN, ParamSpec::optional_int())
        .param(PLAYTIME_MAX, ParamSpec::optional_int())
}

impl SearchState {
    pub fn to_params(&self) -> ParamMap {
        let f = &self.filters;
        ParamMap::new()
            .with(QUERY, ParamValue::text(self.query.as_str()))
            .with(SORT, ParamValue::text(self.sort.as_str()))
            .with(PAGE, ParamValue::Int(i64::from(self.page)))
            .with(PLATFORMS, ParamValue::list(f.platforms.iter().map(PlatformId::as_str)))
            .with(GENRES, ParamValue::list(f.genres.iter().cloned()))
            .with(TAGS, ParamValue::list(f.tags.iter().cloned()))
            .with(RARITY_MIN, f.rarity.min.into())
            .with(RARITY_MAX, f.rarity.max.into())
            .with(COMPLETION_MIN, f.completion.min.into())
            .with(COMPLETION_MAX, f.completion.max.into())
            .with(PLAYTIME_MIN, f.playtime.min.into())
            .with(PLAYTIME_MAX, f.playtime.max.into())
    }

    /// Builds a whole state from parsed params; anything missing or
    /// ill-typed takes its default.
    pub fn from_params(params: &ParamMap, limit: u32) -> Self {
        let range = |min: &str, max: &str| RangeFilter::new(params.int(min), params.int(max));

        Self {
            query: params.text(QUERY).unwrap_or_default().to_string(),
            sort: params
                .text(SORT)
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            page: params
                .int(PAGE)
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n >= 1)
                .unwrap_or(1),
            limit: limit.max(1),
            filters: FilterSet {
                platforms: dedup_in_order(
                    params
                        .list(PLATFORMS)
                        .iter()
                        .filter_map(|p| p.parse().ok())
                        .collect(),
                ),
                genres: dedup_in_order(params.list(GENRES).to_vec()),
                tags: dedup_in_order(params.list(TAGS).to_vec()),
                rarity: range(RARITY_MIN, RARITY_MAX),
                completion: range(COMPLETION_MIN, COMPLETION_MAX),
                playtime: range(PLAYTIME_MIN, PLAYTIME_MAX),
            },
        }
    }
}
