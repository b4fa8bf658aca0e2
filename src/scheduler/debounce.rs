//! Debouncer
//!
//! Defers emission of a value stream until input has been quiet for a fixed
//! delay, with optional leading-edge emission and a `max_wait` ceiling.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::timer::{TimerId, TimerQueue};

/// Debounce tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceOptions {
    /// Quiet period required before the latest value is emitted
    pub delay_ms: u64,
    /// Emit the first value of a quiet period synchronously
    pub immediate: bool,
    /// Guarantee an emission at least this often under continuous input
    pub max_wait_ms: Option<u64>,
}

impl DebounceOptions {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            immediate: false,
            max_wait_ms: None,
        }
    }

    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn max_wait(mut self, max_wait_ms: u64) -> Self {
        self.max_wait_ms = Some(max_wait_ms);
        self
    }
}

struct DebounceState<T> {
    pending: Option<T>,
    timer: Option<TimerId>,
    max_timer: Option<TimerId>,
    /// A burst is in progress (only meaningful in immediate mode)
    window_open: bool,
}

struct DebounceCore<T> {
    timers: TimerQueue,
    options: DebounceOptions,
    on_emit: Box<dyn Fn(T)>,
    state: RefCell<DebounceState<T>>,
}

impl<T> DebounceCore<T> {
    fn clear_timers(&self, state: &mut DebounceState<T>) {
        if let Some(id) = state.timer.take() {
            self.timers.cancel(id);
        }
        if let Some(id) = state.max_timer.take() {
            self.timers.cancel(id);
        }
    }

    /// Emits whatever is pending and closes the burst.
    fn fire(&self) {
        let value = {
            let mut state = self.state.borrow_mut();
            self.clear_timers(&mut state);
            state.window_open = false;
            state.pending.take()
        };
        if let Some(value) = value {
            (self.on_emit)(value);
        }
    }
}

// == Debouncer ==
/// Debounced intake feeding `on_emit`.
///
/// Timers hold only weak references, so dropping the debouncer silently
/// discards anything pending.
pub struct Debouncer<T> {
    core: Rc<DebounceCore<T>>,
}

impl<T: 'static> Debouncer<T> {
    pub fn new<F>(timers: &TimerQueue, options: DebounceOptions, on_emit: F) -> Self
    where
        F: Fn(T) + 'static,
    {
        Self {
            core: Rc::new(DebounceCore {
                timers: timers.clone(),
                options,
                on_emit: Box::new(on_emit),
                state: RefCell::new(DebounceState {
                    pending: None,
                    timer: None,
                    max_timer: None,
                    window_open: false,
                }),
            }),
        }
    }

    pub fn options(&self) -> DebounceOptions {
        self.core.options
    }

    // == Push ==
    /// Feeds a value. Restarts the quiet-period timer; in immediate mode the
    /// first value of a quiet period is emitted before this returns.
    pub fn push(&self, value: T) {
        let options = self.core.options;
        let mut state = self.core.state.borrow_mut();
        let emit_now = options.immediate && !state.window_open;
        state.window_open = true;

        if let Some(id) = state.timer.take() {
            self.core.timers.cancel(id);
        }
        state.timer = Some(self.arm(options.delay_ms));

        let leading = if emit_now {
            Some(value)
        } else {
            state.pending = Some(value);
            if let (Some(max_wait), None) = (options.max_wait_ms, state.max_timer) {
                state.max_timer = Some(self.arm(max_wait));
            }
            None
        };
        drop(state);

        if let Some(value) = leading {
            (self.core.on_emit)(value);
        }
    }

    fn arm(&self, delay_ms: u64) -> TimerId {
        let core: Weak<DebounceCore<T>> = Rc::downgrade(&self.core);
        self.core.timers.schedule(delay_ms, move || {
            if let Some(core) = core.upgrade() {
                core.fire();
            }
        })
    }

    // == Controls ==
    /// Drops any pending value and clears all timers without emitting.
    pub fn cancel(&self) {
        let mut state = self.core.state.borrow_mut();
        self.core.clear_timers(&mut state);
        state.pending = None;
        state.window_open = false;
    }

    /// Emits any pending value now and clears all timers.
    pub fn flush(&self) {
        self.core.fire();
    }

    /// True while a value is waiting to be emitted.
    pub fn is_pending(&self) -> bool {
        self.core.state.borrow().pending.is_some()
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.core.state.try_borrow_mut() {
            self.core.clear_timers(&mut state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};

    type Log = Rc<RefCell<Vec<(u64, u32)>>>;

    fn recorder(options: DebounceOptions) -> (TimerQueue, Debouncer<u32>, Log) {
        let timers = TimerQueue::new(ManualClock::new(0));
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let (sink, clock) = (log.clone(), timers.clock());
        let debouncer = Debouncer::new(&timers, options, move |v| {
            sink.borrow_mut().push((clock.now_ms(), v))
        });
        (timers, debouncer, log)
    }

    #[test]
    fn test_burst_emits_last_value_once() {
        let (timers, debouncer, log) = recorder(DebounceOptions::new(300));

        for (i, v) in [1, 2, 3, 4].into_iter().enumerate() {
            if i > 0 {
                timers.advance(100);
            }
            debouncer.push(v);
        }
        // final input at t=300
        timers.advance(1_000);

        assert_eq!(*log.borrow(), vec![(600, 4)]);
    }

    #[test]
    fn test_separate_bursts_emit_separately() {
        let (timers, debouncer, log) = recorder(DebounceOptions::new(100));

        debouncer.push(1);
        timers.advance(150);
        debouncer.push(2);
        timers.advance(150);

        assert_eq!(*log.borrow(), vec![(100, 1), (250, 2)]);
    }

    #[test]
    fn test_immediate_emits_leading_then_coalesces() {
        let (timers, debouncer, log) = recorder(DebounceOptions::new(100).immediate());

        debouncer.push(1);
        assert_eq!(*log.borrow(), vec![(0, 1)], "leading value is synchronous");

        timers.advance(50);
        debouncer.push(2);
        timers.advance(50);
        debouncer.push(3);
        timers.advance(500);

        assert_eq!(*log.borrow(), vec![(0, 1), (200, 3)]);

        // quiet again: next value leads immediately
        debouncer.push(4);
        assert_eq!(log.borrow().last(), Some(&(600, 4)));
    }

    #[test]
    fn test_immediate_single_value_emits_once() {
        let (timers, debouncer, log) = recorder(DebounceOptions::new(100).immediate());

        debouncer.push(7);
        timers.advance(1_000);

        assert_eq!(*log.borrow(), vec![(0, 7)]);
    }

    #[test]
    fn test_max_wait_under_continuous_input() {
        let (timers, debouncer, log) = recorder(DebounceOptions::new(100).max_wait(250));

        for v in 0..10 {
            debouncer.push(v);
            timers.advance(50);
        }
        timers.advance(1_000);

        let log = log.borrow();
        // max-wait fires at 250, is re-armed by the next input and fires again at 500
        assert_eq!(log[0], (250, 4));
        assert_eq!(log[1], (500, 9));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_cancel_discards_pending() {
        let (timers, debouncer, log) = recorder(DebounceOptions::new(100).max_wait(150));

        debouncer.push(1);
        assert!(debouncer.is_pending());
        debouncer.cancel();
        assert!(!debouncer.is_pending());

        timers.advance(1_000);
        assert!(log.borrow().is_empty());
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn test_flush_emits_now() {
        let (timers, debouncer, log) = recorder(DebounceOptions::new(100));

        debouncer.push(1);
        timers.advance(10);
        debouncer.flush();
        assert_eq!(*log.borrow(), vec![(10, 1)]);

        timers.advance(1_000);
        assert_eq!(log.borrow().len(), 1, "flush clears the timer");
    }

    #[test]
    fn test_flush_without_pending_is_noop() {
        let (_timers, debouncer, log) = recorder(DebounceOptions::new(100));
        debouncer.flush();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_drop_clears_timers() {
        let (timers, debouncer, log) = recorder(DebounceOptions::new(100));

        debouncer.push(1);
        drop(debouncer);
        timers.advance(1_000);

        assert!(log.borrow().is_empty());
        assert_eq!(timers.pending(), 0);
    }
}
