//! Topic-based message bus
//!
//! Locally published notes are emitted on one topic and notes from the
//! peer arrive on another. The bus itself only moves serialized records;
//! decoding happens in the relay. [`peer`] carries the two topics between
//! processes over a WebSocket.

pub mod events;
pub mod peer;
pub mod queue;

pub use events::{BusRecord, Envelope};
pub use peer::{spawn_peer_connector, PeerListener};
pub use queue::{BusPublisher, Subscription, TopicBus, DEFAULT_TOPIC_CAPACITY};
