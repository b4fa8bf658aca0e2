//! Search Module
//!
//! The search session state machine, its history, and its URL mapping.

mod history;
mod params;
mod session;

pub use history::{SearchHistory, DEFAULT_HISTORY_LIMIT, HISTORY_KEY};
pub use params::search_schema;
pub use session::{FetchMode, SearchSession, SearchTicket, SessionStatus};

/// URL keys recognized by [`search_schema`].
pub mod keys {
    pub use super::params::{
        COMPLETION_MAX, COMPLETION_MIN, GENRES, PAGE, PLATFORMS, PLAYTIME_MAX, PLAYTIME_MIN, QUERY,
        RARITY_MAX, RARITY_MIN, SORT, TAGS,
    };
}
