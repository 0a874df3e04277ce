//! Blocking FIFO shared between threads.
//!
//! A single mutex guards both the items and the not-empty predicate the
//! condition variable waits on, so a push can never slip between a waiter's
//! check and its suspension.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Unbounded thread-safe queue with a blocking `pop`.
#[derive(Debug)]
pub struct WorkQueue<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
        }
    }

    // A panic while holding the lock cannot leave the deque half-modified,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item and wake one waiter.
    pub fn push_back(&self, item: T) {
        self.lock().push_back(item);
        self.not_empty.notify_one();
    }

    /// Insert an item ahead of everything queued and wake one waiter.
    ///
    /// Used for high-priority items such as shutdown signals.
    pub fn push_front(&self, item: T) {
        self.lock().push_front(item);
        self.not_empty.notify_one();
    }

    /// Append every item of `items` in a single lock acquisition.
    ///
    /// Unlike the single pushes this wakes every waiter rather than one. A
    /// batch can satisfy several blocked consumers, and waking only one of
    /// them would leave the rest asleep beside available items. Waiters that
    /// find the queue drained go back to waiting.
    pub fn extend<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        self.lock().extend(items);
        self.not_empty.notify_all();
    }

    /// Remove and return the front item, waiting until one is available.
    pub fn pop(&self) -> T {
        let mut guard = self.lock();
        loop {
            if let Some(item) = guard.pop_front() {
                return item;
            }
            guard = self
                .not_empty
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Remove and return the front item without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Remove the front item, or return `default` if the queue is empty.
    pub fn pop_or(&self, default: T) -> T {
        self.try_pop().unwrap_or(default)
    }

    /// Remove the front item, or build one with `f` if the queue is empty.
    ///
    /// `f` runs after the lock is released.
    pub fn pop_or_else<F>(&self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        self.try_pop().unwrap_or_else(f)
    }

    /// Snapshot of emptiness; may be stale as soon as it returns.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of the queue length.
    pub fn len(&self) -> usize {
        self.lock().len()
    }
}
