//! Query Parameter Module
//!
//! Maps structured state to a URL query string and back, and keeps the
//! two in sync through a navigation interface.

mod schema;
mod sync;


// Re-export public types
pub use schema::{ParamMap, ParamSpec, ParamValue, QueryParamSchema, LIST_SEPARATOR};
pub use sync::{MemoryNavigator, NavigationMode, Navigator, QuerySync};
