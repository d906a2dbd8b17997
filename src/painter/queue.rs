// src/painter/queue.rs
//! MessageQueue - blocking FIFO between producer threads and the loop worker.
//!
//! Any number of threads may `push`; one consumer calls `pull`, which parks
//! on a condition variable while the queue is empty. The waiter count is
//! read and written only under the queue mutex, so a push can never slip in
//! between a consumer seeing an empty queue and starting to wait.

use log::trace;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

struct Inner<T> {
    items: VecDeque<T>,
    waiting: usize,
}

pub struct MessageQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Condvar,
}

impl<T> Default for MessageQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MessageQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                waiting: 0,
            }),
            available: Condvar::new(),
        }
    }

    // Elements are plain data; a panic elsewhere cannot leave them half-written.
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `item` at the tail and wakes the consumer if it is waiting.
    pub fn push(&self, item: T) {
        let mut inner = self.lock();
        inner.items.push_back(item);
        if inner.waiting > 0 && inner.items.len() == 1 {
            trace!("MessageQueue: Waking blocked consumer");
            self.available.notify_one();
        }
    }

    /// Removes the head element, blocking while the queue is empty.
    pub fn pull(&self) -> T {
        let mut inner = self.lock();
        loop {
            if let Some(item) = inner.items.pop_front() {
                return item;
            }
            inner.waiting += 1;
            inner = self
                .available
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
            inner.waiting -= 1;
        }
    }

    /// Removes the head element if there is one.
    pub fn try_pull(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    /// Snapshot; may be stale as soon as it returns.
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Consumers currently parked in `pull`.
    #[cfg(test)]
    fn waiting(&self) -> usize {
        self.lock().waiting
    }
}
