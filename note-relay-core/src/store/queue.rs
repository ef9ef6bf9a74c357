//! Fixed-capacity, newest-first queue

use parking_lot::Mutex;
use std::collections::VecDeque;

/// A thread-safe queue that keeps the `capacity` most recent items.
///
/// New items go to the front; once the capacity is exceeded the oldest
/// items are dropped from the back while the lock is still held, so a
/// reader never observes an over-capacity state.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    capacity: usize,
    items: Mutex<VecDeque<T>>,
}

impl<T: Clone> BoundedQueue<T> {
    /// Create an empty queue. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity + 1)),
        }
    }

    /// Insert at the front, evicting from the back past capacity
    pub fn add(&self, item: T) {
        let mut items = self.items.lock();
        items.push_front(item);
        while items.len() > self.capacity {
            items.pop_back();
        }
    }

    /// Independent copy of the contents, newest first
    pub fn snapshot(&self) -> Vec<T> {
        self.items.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
