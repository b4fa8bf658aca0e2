//! Scheduler Module
//!
//! Temporal gating on a single-threaded logical event queue: every timer,
//! debouncer and throttler of a session runs on one `TimerQueue`, so no two
//! callbacks ever execute concurrently.

mod debounce;
mod throttle;
mod timer;

pub use debounce::{DebounceOptions, Debouncer};
pub use throttle::Throttler;
pub use timer::{TimerId, TimerQueue};
