//! Timer Queue
//!
//! Cooperative timer queue driven by a `ManualClock`. The host advances
//! logical time; due callbacks run in due-time order, ties broken by
//! scheduling order.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::clock::{Clock, ManualClock};

/// Handle for a scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

struct Timer {
    due: u64,
    period: Option<u64>,
    task: Box<dyn FnMut()>,
}

#[derive(Default)]
struct QueueInner {
    next_id: u64,
    /// (due, id) ordering; ids are monotonic so ties keep insertion order
    ordered: BTreeSet<(u64, u64)>,
    timers: HashMap<u64, Timer>,
    /// Repeating timer currently executing, and whether it was cancelled from inside
    running: Option<(u64, bool)>,
}

// == Timer Queue ==
/// Cloneable handle to a shared logical event queue.
#[derive(Clone)]
pub struct TimerQueue {
    inner: Rc<RefCell<QueueInner>>,
    clock: ManualClock,
}

impl fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("now_ms", &self.now_ms())
            .field("pending", &self.pending())
            .finish()
    }
}

impl TimerQueue {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            inner: Rc::new(RefCell::new(QueueInner::default())),
            clock,
        }
    }

    /// The logical clock this queue advances.
    pub fn clock(&self) -> ManualClock {
        self.clock.clone()
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    // == Schedule ==
    /// Runs `task` once, `delay_ms` from now.
    pub fn schedule<F>(&self, delay_ms: u64, task: F) -> TimerId
    where
        F: FnOnce() + 'static,
    {
        let mut task = Some(task);
        self.insert(
            delay_ms,
            None,
            Box::new(move || {
                if let Some(task) = task.take() {
                    task();
                }
            }),
        )
    }

    /// Runs `task` every `period_ms` until cancelled.
    pub fn schedule_every<F>(&self, period_ms: u64, task: F) -> TimerId
    where
        F: FnMut() + 'static,
    {
        let period = period_ms.max(1);
        self.insert(period, Some(period), Box::new(task))
    }

    fn insert(&self, delay_ms: u64, period: Option<u64>, task: Box<dyn FnMut()>) -> TimerId {
        let due = self.clock.now_ms() + delay_ms;
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.ordered.insert((due, id));
        inner.timers.insert(id, Timer { due, period, task });
        TimerId(id)
    }

    // == Cancel ==
    /// Cancels a timer. Idempotent; returns whether anything was pending.
    pub fn cancel(&self, id: TimerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        if let Some((running, cancelled)) = inner.running.as_mut() {
            if *running == id.0 {
                *cancelled = true;
                return true;
            }
        }
        match inner.timers.remove(&id.0) {
            Some(timer) => {
                inner.ordered.remove(&(timer.due, id.0));
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.inner.borrow().timers.contains_key(&id.0)
    }

    /// Number of timers waiting to fire.
    pub fn pending(&self) -> usize {
        self.inner.borrow().timers.len()
    }

    /// Due time of the earliest pending timer.
    pub fn next_due(&self) -> Option<u64> {
        self.inner.borrow().ordered.iter().next().map(|(due, _)| *due)
    }

    // == Advance ==
    /// Moves logical time forward by `ms`, running every callback that
    /// falls due on the way. Returns the number of callbacks run.
    pub fn advance(&self, ms: u64) -> usize {
        self.advance_to(self.clock.now_ms() + ms)
    }

    /// Moves logical time forward to `target_ms`.
    pub fn advance_to(&self, target_ms: u64) -> usize {
        let mut fired = 0;
        loop {
            let next = {
                let mut inner = self.inner.borrow_mut();
                let Some(&(due, id)) = inner.ordered.iter().next() else {
                    break;
                };
                if due > target_ms {
                    break;
                }
                inner.ordered.remove(&(due, id));
                let timer = inner.timers.remove(&id);
                if timer.as_ref().is_some_and(|t| t.period.is_some()) {
                    inner.running = Some((id, false));
                }
                timer.map(|timer| (id, timer))
            };
            let Some((id, mut timer)) = next else {
                continue;
            };

            self.clock.set(timer.due);
            (timer.task)();
            fired += 1;

            if let Some(period) = timer.period {
                let mut inner = self.inner.borrow_mut();
                let cancelled = matches!(inner.running.take(), Some((_, true)));
                if !cancelled {
                    timer.due += period;
                    inner.ordered.insert((timer.due, id));
                    inner.timers.insert(id, timer);
                }
            }
        }
        self.clock.set(target_ms);
        fired
    }

    /// Runs pending one-shot work until the queue only holds repeating
    /// timers, advancing the clock as far as needed.
    pub fn run_until_idle(&self) -> usize {
        let mut fired = 0;
        loop {
            let next_once = {
                let inner = self.inner.borrow();
                inner
                    .ordered
                    .iter()
                    .find(|(_, id)| inner.timers.get(id).is_some_and(|t| t.period.is_none()))
                    .map(|(due, _)| *due)
            };
            match next_once {
                Some(due) => fired += self.advance_to(due.max(self.clock.now_ms())),
                None => return fired,
            }
        }
    }
}
