//! Sweep Task
//!
//! Periodic full eviction pass over an expiring store. Lazy expiry on read
//! keeps reads correct on its own; the sweep only bounds memory held by
//! keys nobody reads again.

use std::cell::RefCell;
use std::rc::Weak;

use tracing::{debug, info};

use crate::cache::Sweep;
use crate::scheduler::{TimerId, TimerQueue};

/// Schedules `target.sweep()` every `period_ms` on `timers`.
///
/// The timer holds a weak reference: once the target is dropped each run is
/// a no-op, and the returned id should be cancelled. A run that finds the
/// target already borrowed is skipped until the next period.
pub fn schedule_sweep<S>(
    timers: &TimerQueue,
    target: Weak<RefCell<S>>,
    period_ms: u64,
    label: &'static str,
) -> TimerId
where
    S: Sweep + 'static,
{
    info!(cache = label, period_ms, "Starting sweep task");

    timers.schedule_every(period_ms, move || {
        let Some(target) = target.upgrade() else {
            debug!(cache = label, "Sweep target dropped");
            return;
        };
        let Ok(mut store) = target.try_borrow_mut() else {
            debug!(cache = label, "Sweep skipped, store busy");
            return;
        };

        let removed = store.sweep();
        if removed > 0 {
            info!(cache = label, removed, "Sweep removed {} expired entries", removed);
        } else {
            debug!(cache = label, "Sweep found no expired entries");
        }
    })
}
