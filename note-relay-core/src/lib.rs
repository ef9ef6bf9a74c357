//! Core of note-relay
//!
//! Relays short notes between a local API and a remote peer over a topic
//! bus, keeping the most recent messages from each side in memory.

pub mod bus;
pub mod config;
pub mod error;
pub mod logging;
pub mod message;
pub mod notes;
pub mod relay;
pub mod store;

pub use error::{DecodeError, Error, PublishError, RelayError, Result};
pub use message::{Message, Origin};
