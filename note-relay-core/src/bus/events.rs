//! Record types carried by the bus

use serde::{Deserialize, Serialize};

/// Raw wire representation of a message before decoding
pub type Envelope = serde_json::Value;

/// One record published on a topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusRecord {
    /// Topic the record was published to
    pub topic: String,
    /// Optional partitioning key (the message id for relayed notes)
    pub key: Option<String>,
    /// Serialized message body
    pub payload: String,
}

impl BusRecord {
    /// Create a new record
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            payload: payload.into(),
        }
    }

    /// Set the record key
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Parse the payload into an [`Envelope`]
    pub fn envelope(&self) -> serde_json::Result<Envelope> {
        serde_json::from_str(&self.payload)
    }
}
