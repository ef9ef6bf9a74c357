//! Per-origin message store

use super::queue::BoundedQueue;
use crate::config::schema::DEFAULT_CAPACITY;
use crate::message::{Message, Origin};

/// Holds the most recent messages for each origin.
///
/// Each origin has its own queue and lock, so local publishes never wait
/// on remote consumption and vice versa.
#[derive(Debug)]
pub struct MessageStore {
    local: BoundedQueue<Message>,
    remote: BoundedQueue<Message>,
}

impl MessageStore {
    /// Create a store keeping `capacity` messages per origin
    pub fn new(capacity: usize) -> Self {
        Self {
            local: BoundedQueue::new(capacity),
            remote: BoundedQueue::new(capacity),
        }
    }

    fn queue(&self, origin: Origin) -> &BoundedQueue<Message> {
        match origin {
            Origin::Local => &self.local,
            Origin::Remote => &self.remote,
        }
    }

    /// Add a message to the queue for `origin`
    pub fn add(&self, origin: Origin, message: Message) {
        self.queue(origin).add(message);
    }

    /// Snapshot of `origin`'s messages, newest first
    pub fn list(&self, origin: Origin) -> Vec<Message> {
        self.queue(origin).snapshot()
    }

    /// Number of messages currently held for `origin`
    pub fn len(&self, origin: Origin) -> usize {
        self.queue(origin).len()
    }

    pub fn capacity(&self) -> usize {
        self.local.capacity()
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
