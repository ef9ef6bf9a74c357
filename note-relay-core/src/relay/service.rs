//! Relay service

use crate::bus::{BusPublisher, BusRecord, Envelope};
use crate::config::schema::TopicsConfig;
use crate::error::{DecodeError, PublishError, RelayError};
use crate::message::{Message, Origin};
use crate::store::MessageStore;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Stateless coordinator over the message store and the bus.
///
/// Local publishes are stored before they are emitted, and a failed
/// emission does not undo the store write.
#[derive(Clone)]
pub struct RelayService {
    store: Arc<MessageStore>,
    publisher: Arc<dyn BusPublisher>,
    outbound_topic: String,
}

impl RelayService {
    /// Create a new relay service emitting on `topics.local_outbound`
    pub fn new(
        store: Arc<MessageStore>,
        publisher: Arc<dyn BusPublisher>,
        topics: &TopicsConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            outbound_topic: topics.local_outbound.clone(),
        }
    }

    /// Decode, store and relay a locally published envelope
    pub async fn publish(&self, envelope: &Envelope) -> Result<Message, PublishError> {
        let message = Message::from_envelope(envelope, Origin::Local).map_err(|e| {
            warn!("Rejected local message: {}", e);
            e
        })?;
        self.publish_message(message).await
    }

    /// Store and relay an already constructed local message
    pub async fn publish_message(&self, message: Message) -> Result<Message, PublishError> {
        // The store lock is released before the bus is touched.
        self.store.add(Origin::Local, message.clone());
        info!("Stored local message id={}", message.id);

        match self.emit(&message).await {
            Ok(()) => Ok(message),
            Err(source) => {
                error!(
                    "Failed to relay message id={} to {}: {}",
                    message.id, self.outbound_topic, source
                );
                Err(PublishError::Relay {
                    message: Box::new(message),
                    source,
                })
            }
        }
    }

    async fn emit(&self, message: &Message) -> Result<(), RelayError> {
        let payload =
            serde_json::to_string(message).map_err(|e| RelayError::Encode(e.to_string()))?;
        let record = BusRecord::new(&self.outbound_topic, payload).with_key(&message.id);
        self.publisher.send(record).await
    }

    /// Store a message received from the peer.
    ///
    /// A malformed envelope is logged and dropped; the error is returned
    /// for reporting only and the store is left untouched.
    pub fn consume(&self, envelope: &Envelope) -> Result<Message, DecodeError> {
        match Message::from_envelope(envelope, Origin::Remote) {
            Ok(message) => {
                info!("Received remote message id={}", message.id);
                self.store.add(Origin::Remote, message.clone());
                Ok(message)
            }
            Err(e) => {
                warn!("Dropping malformed remote message: {}", e);
                Err(e)
            }
        }
    }

    /// Parse a raw bus record and [`consume`](Self::consume) it
    pub fn consume_record(&self, record: &BusRecord) -> Result<Message, DecodeError> {
        let envelope = record.envelope().map_err(|e| {
            warn!("Dropping unparsable record on {}: {}", record.topic, e);
            DecodeError::InvalidEnvelope(e.to_string())
        })?;
        self.consume(&envelope)
    }

    /// Local messages, newest first
    pub fn list_local(&self) -> Vec<Message> {
        self.store.list(Origin::Local)
    }

    /// Remote messages, newest first
    pub fn list_remote(&self) -> Vec<Message> {
        self.store.list(Origin::Remote)
    }

    /// Messages for `origin`, newest first
    pub fn list(&self, origin: Origin) -> Vec<Message> {
        self.store.list(origin)
    }

    pub fn outbound_topic(&self) -> &str {
        &self.outbound_topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<BusRecord>>,
    }

    #[async_trait]
    impl BusPublisher for RecordingPublisher {
        async fn send(&self, record: BusRecord) -> Result<(), RelayError> {
            self.sent.lock().push(record);
            Ok(())
        }
    }

    struct DownPublisher;

    #[async_trait]
    impl BusPublisher for DownPublisher {
        async fn send(&self, record: BusRecord) -> Result<(), RelayError> {
            Err(RelayError::Closed {
                topic: record.topic,
            })
        }
    }

    fn service(publisher: Arc<dyn BusPublisher>) -> RelayService {
        RelayService::new(
            Arc::new(MessageStore::default()),
            publisher,
            &TopicsConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_publish_stores_and_emits_canonical_form() {
        let publisher = Arc::new(RecordingPublisher::default());
        let relay = service(publisher.clone());

        let stored = relay
            .publish(&json!({"id": "a", "payload": "p", "notes": {"comment": "c"}}))
            .await
            .unwrap();

        assert_eq!(relay.list_local()[0], stored);

        let sent = publisher.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "notes.local");
        assert_eq!(sent[0].key.as_deref(), Some("a"));
        let wire: serde_json::Value = serde_json::from_str(&sent[0].payload).unwrap();
        assert_eq!(wire["notes"], json!("c"));
    }

    #[tokio::test]
    async fn test_publish_absent_note_is_omitted_on_wire() {
        let publisher = Arc::new(RecordingPublisher::default());
        let relay = service(publisher.clone());

        relay
            .publish(&json!({"id": "a", "payload": "p", "notes": null}))
            .await
            .unwrap();

        let wire: serde_json::Value =
            serde_json::from_str(&publisher.sent.lock()[0].payload).unwrap();
        assert!(wire.get("notes").is_none());
    }

    #[tokio::test]
    async fn test_publish_decode_error_stores_and_sends_nothing() {
        let publisher = Arc::new(RecordingPublisher::default());
        let relay = service(publisher.clone());

        let err = relay
            .publish(&json!({"id": "a", "payload": "p", "notes": [1, 2]}))
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Decode(_)));
        assert!(relay.list_local().is_empty());
        assert!(publisher.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_relay_failure_keeps_local_write() {
        let relay = service(Arc::new(DownPublisher));

        let err = relay
            .publish(&json!({"id": "kept", "payload": "p"}))
            .await
            .unwrap_err();

        match err {
            PublishError::Relay { message, source } => {
                assert_eq!(message.id, "kept");
                assert!(matches!(source, RelayError::Closed { .. }));
            }
            other => panic!("expected relay error, got {other:?}"),
        }
        let local = relay.list_local();
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].id, "kept");
    }

    #[tokio::test]
    async fn test_published_message_is_newest() {
        let relay = service(Arc::new(RecordingPublisher::default()));
        for i in 0..5 {
            relay
                .publish_message(Message::new("p").with_id(i.to_string()))
                .await
                .unwrap();
        }
        assert_eq!(relay.list_local()[0].id, "4");
    }

    #[test]
    fn test_consume_drops_bad_input_then_continues() {
        let relay = service(Arc::new(RecordingPublisher::default()));

        assert!(relay.consume(&json!({"id": "x", "payload": "p", "notes": 42})).is_err());
        assert!(relay.consume(&json!({"payload": "no id"})).is_err());
        assert!(relay.list_remote().is_empty());

        let ok = relay
            .consume(&json!({"id": "y", "payload": "p", "notes": "legacy"}))
            .unwrap();
        assert_eq!(ok.notes.as_deref(), Some("legacy"));
        assert_eq!(relay.list_remote(), vec![ok]);
        assert!(relay.list_local().is_empty());
    }

    #[test]
    fn test_consume_record_rejects_non_json() {
        let relay = service(Arc::new(RecordingPublisher::default()));
        let err = relay
            .consume_record(&BusRecord::new("notes.remote", "{not json"))
            .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidEnvelope(_)));
        assert!(relay.list_remote().is_empty());
    }
}
