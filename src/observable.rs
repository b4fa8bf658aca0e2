//! Observable Module
//!
//! Explicit change notification: a value container whose subscribers are
//! called synchronously, in subscription order, on every mutation.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<T> = Box<dyn FnMut(&T)>;

struct Subscribers<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
    /// Ids unsubscribed while a notification was running
    removed: Vec<u64>,
}

// == Observable ==
/// Shared, observable value. Clones observe and mutate the same value.
pub struct Observable<T> {
    value: Rc<RefCell<T>>,
    subscribers: Rc<RefCell<Subscribers<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            value: Rc::clone(&self.value),
            subscribers: Rc::clone(&self.subscribers),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Observable").field(&*self.value.borrow()).finish()
    }
}

impl<T: Clone + 'static> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Rc::new(RefCell::new(value)),
            subscribers: Rc::new(RefCell::new(Subscribers {
                next_id: 0,
                entries: Vec::new(),
                removed: Vec::new(),
            })),
        }
    }

    /// Borrows the current value.
    pub fn get(&self) -> Ref<'_, T> {
        self.value.borrow()
    }

    /// Replaces the value and notifies subscribers.
    pub fn set(&self, value: T) {
        *self.value.borrow_mut() = value;
        self.notify();
    }

    /// Mutates the value in place as one change, then notifies once.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = f(&mut *self.value.borrow_mut());
        self.notify();
        result
    }

    // == Subscribe ==
    /// Registers `callback`; it stays registered until the returned
    /// subscription is dropped or explicitly unsubscribed.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&T) + 'static,
    {
        let id = {
            let mut subs = self.subscribers.borrow_mut();
            let id = subs.next_id;
            subs.next_id += 1;
            subs.entries.push((id, Box::new(callback)));
            id
        };

        let weak: Weak<RefCell<Subscribers<T>>> = Rc::downgrade(&self.subscribers);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(subs) = weak.upgrade() {
                    let mut subs = subs.borrow_mut();
                    let before = subs.entries.len();
                    subs.entries.retain(|(entry_id, _)| *entry_id != id);
                    if subs.entries.len() == before {
                        subs.removed.push(id);
                    }
                }
            })),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().entries.len()
    }

    fn notify(&self) {
        // Callbacks see a snapshot and run with the list taken out, so they
        // may subscribe, unsubscribe, read or even set the value. A set from
        // inside a callback is not re-delivered to the list being run.
        let snapshot = self.value.borrow().clone();
        let mut running = std::mem::take(&mut self.subscribers.borrow_mut().entries);
        for (_, callback) in running.iter_mut() {
            callback(&snapshot);
        }

        let mut subs = self.subscribers.borrow_mut();
        let removed = std::mem::take(&mut subs.removed);
        running.retain(|(id, _)| !removed.contains(id));
        let added = std::mem::take(&mut subs.entries);
        running.extend(added);
        subs.entries = running;
    }
}

// == Subscription ==
/// Handle returned by [`Observable::subscribe`].
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
