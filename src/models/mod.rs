//! Domain models shared by the caches, the session and the fetch contract.

pub mod catalog;
pub mod profile;
pub mod search;

// Re-export commonly used types
pub use catalog::{Achievement, AchievementPatch, Game, GamePatch, PlatformId};
pub use profile::{Collection, Density, Theme, UserProfile, UserTotals, ViewMode};
pub use search::{FilterCategory, FilterSet, RangeFilter, ResultPage, SearchState, SortKey};
