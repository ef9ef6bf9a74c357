//! Error types for note-relay

use crate::message::Message;
use thiserror::Error;

/// The main error type for note-relay operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An inbound or published message could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A stored message could not be handed to the bus
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    /// Peer link errors
    #[error("Peer error: {0}")]
    Peer(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure to turn a raw envelope into a [`Message`](crate::message::Message).
///
/// A message that fails to decode is never stored and never relayed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The `notes` field was neither null, a string, nor an object
    #[error("unexpected {kind} while decoding notes; expected string, object, or null")]
    UnexpectedNotes { kind: &'static str },

    /// `notes.comment` was an object or array
    #[error("unexpected {kind} in notes.comment; expected string, number, boolean, or null")]
    UnexpectedComment { kind: &'static str },

    /// A required field was missing or had the wrong type
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),
}

/// Failure to emit an already stored message onto the bus.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The bus no longer accepts records for this topic
    #[error("bus closed for topic {topic}")]
    Closed { topic: String },

    /// The outbound payload could not be encoded
    #[error("failed to encode outbound message: {0}")]
    Encode(String),
}

/// Outcome of a failed local publish.
///
/// `Decode` means nothing was stored; fix the input and retry. `Relay`
/// means the message is already visible locally and only the bus
/// emission needs to be re-attempted.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("message {} stored locally but not relayed: {source}", .message.id)]
    Relay {
        message: Box<Message>,
        #[source]
        source: RelayError,
    },
}

impl From<PublishError> for Error {
    fn from(e: PublishError) -> Self {
        match e {
            PublishError::Decode(e) => Error::Decode(e),
            PublishError::Relay { source, .. } => Error::Relay(source),
        }
    }
}

/// A specialized Result type for note-relay operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
