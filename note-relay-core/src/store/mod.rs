//! In-memory storage of recently seen messages

pub mod message_store;
pub mod queue;

pub use message_store::MessageStore;
pub use queue::BoundedQueue;
