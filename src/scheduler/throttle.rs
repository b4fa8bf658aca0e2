//! Throttler
//!
//! Bounds invocation frequency to at most once per window, leading edge
//! first, with a single trailing call carrying the most recent arguments.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::timer::{TimerId, TimerQueue};

struct ThrottleState<A> {
    last_run: Option<u64>,
    trailing_timer: Option<TimerId>,
    trailing_args: Option<A>,
}

struct ThrottleCore<A> {
    timers: TimerQueue,
    delay_ms: u64,
    f: Box<dyn Fn(A)>,
    state: RefCell<ThrottleState<A>>,
}

impl<A> ThrottleCore<A> {
    fn run_trailing(&self) {
        let args = {
            let mut state = self.state.borrow_mut();
            if let Some(id) = state.trailing_timer.take() {
                self.timers.cancel(id);
            }
            let args = state.trailing_args.take();
            if args.is_some() {
                state.last_run = Some(self.timers.now_ms());
            }
            args
        };
        if let Some(args) = args {
            (self.f)(args);
        }
    }
}

// == Throttler ==
pub struct Throttler<A> {
    core: Rc<ThrottleCore<A>>,
}

impl<A: 'static> Throttler<A> {
    pub fn new<F>(timers: &TimerQueue, delay_ms: u64, f: F) -> Self
    where
        F: Fn(A) + 'static,
    {
        Self {
            core: Rc::new(ThrottleCore {
                timers: timers.clone(),
                delay_ms,
                f: Box::new(f),
                state: RefCell::new(ThrottleState {
                    last_run: None,
                    trailing_timer: None,
                    trailing_args: None,
                }),
            }),
        }
    }

    // == Call ==
    /// Invokes immediately when a full window has passed since the last
    /// invocation; otherwise schedules one trailing invocation at the window
    /// boundary with the latest arguments.
    pub fn call(&self, args: A) {
        let now = self.core.timers.now_ms();
        let delay = self.core.delay_ms;
        let mut state = self.core.state.borrow_mut();
        let elapsed = state.last_run.map(|at| now.saturating_sub(at));

        match elapsed {
            Some(elapsed) if elapsed < delay => {
                state.trailing_args = Some(args);
                if state.trailing_timer.is_none() {
                    state.trailing_timer = Some(self.arm(delay - elapsed));
                }
            }
            _ => {
                state.last_run = Some(now);
                if let Some(id) = state.trailing_timer.take() {
                    self.core.timers.cancel(id);
                }
                state.trailing_args = None;
                drop(state);
                (self.core.f)(args);
            }
        }
    }

    fn arm(&self, delay_ms: u64) -> TimerId {
        let core: Weak<ThrottleCore<A>> = Rc::downgrade(&self.core);
        self.core.timers.schedule(delay_ms, move || {
            if let Some(core) = core.upgrade() {
                core.run_trailing();
            }
        })
    }

    /// Drops the trailing call, if any.
    pub fn cancel(&self) {
        let mut state = self.core.state.borrow_mut();
        if let Some(id) = state.trailing_timer.take() {
            self.core.timers.cancel(id);
        }
        state.trailing_args = None;
    }

    /// Runs the trailing call now, if any.
    pub fn flush(&self) {
        self.core.run_trailing();
    }

    pub fn is_pending(&self) -> bool {
        self.core.state.borrow().trailing_args.is_some()
    }
}

impl<A> Drop for Throttler<A> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.core.state.try_borrow_mut() {
            if let Some(id) = state.trailing_timer.take() {
                self.core.timers.cancel(id);
            }
        }
    }
}
