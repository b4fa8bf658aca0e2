//! Background Tasks Module
//!
//! Periodic housekeeping scheduled on the logical timer queue.
//!
//! # Tasks
//! - Sweep: evicts expired cache entries at a configured interval

mod sweep;

pub use sweep::schedule_sweep;
