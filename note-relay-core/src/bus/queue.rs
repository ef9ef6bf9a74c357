//! In-process topic bus

use super::events::BusRecord;
use crate::error::RelayError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Records buffered per subscriber before it starts lagging
pub const DEFAULT_TOPIC_CAPACITY: usize = 1024;

/// Outbound side of a bus
#[async_trait]
pub trait BusPublisher: Send + Sync {
    /// Publish a record. Delivery is fire-and-forget: success means the bus
    /// accepted the record, not that anyone received it.
    async fn send(&self, record: BusRecord) -> Result<(), RelayError>;
}

/// A subscription to one topic
pub struct Subscription {
    topic: String,
    receiver: broadcast::Receiver<BusRecord>,
}

impl Subscription {
    /// The subscribed topic
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next record.
    ///
    /// Returns `Lagged(n)` if this subscriber fell `n` records behind and
    /// `Closed` once the bus has shut down.
    pub async fn recv(&mut self) -> Result<BusRecord, broadcast::error::RecvError> {
        self.receiver.recv().await
    }
}

type TopicMap = HashMap<String, broadcast::Sender<BusRecord>>;

/// Async publish/subscribe bus keyed by topic name
///
/// Each topic is a broadcast channel created on first use, so every
/// subscriber of a topic sees every record sent after it subscribed.
#[derive(Clone)]
pub struct TopicBus {
    /// `None` once the bus is closed
    topics: Arc<RwLock<Option<TopicMap>>>,
    closed_tx: Arc<watch::Sender<bool>>,
    capacity: usize,
}

impl TopicBus {
    /// Create a new bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    /// Create a bus buffering `capacity` records per subscriber
    pub fn with_capacity(capacity: usize) -> Self {
        let (closed_tx, _) = watch::channel(false);
        Self {
            topics: Arc::new(RwLock::new(Some(HashMap::new()))),
            closed_tx: Arc::new(closed_tx),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to a topic
    ///
    /// Subscribing to a closed bus yields a subscription whose first
    /// `recv` reports `Closed`.
    pub async fn subscribe(&self, topic: impl Into<String>) -> Subscription {
        let topic = topic.into();
        let mut guard = self.topics.write().await;
        let Some(topics) = guard.as_mut() else {
            let (_, receiver) = broadcast::channel(1);
            return Subscription { topic, receiver };
        };

        let receiver = match topics.get(&topic) {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = broadcast::channel(self.capacity);
                topics.insert(topic.clone(), sender);
                receiver
            }
        };
        debug!("New subscriber on topic {}", topic);
        Subscription { topic, receiver }
    }

    /// Forward every record published on `from` to `to`.
    ///
    /// Used to make a single process act as its own peer. The task ends
    /// when the bus is closed.
    pub async fn bridge(&self, from: impl Into<String>, to: impl Into<String>) -> JoinHandle<()> {
        let mut subscription = self.subscribe(from).await;
        let to = to.into();
        let bus = self.clone();

        tokio::spawn(async move {
            debug!("Bridging {} -> {}", subscription.topic(), to);
            loop {
                match subscription.recv().await {
                    Ok(record) => {
                        let forwarded = BusRecord {
                            topic: to.clone(),
                            key: record.key,
                            payload: record.payload,
                        };
                        if let Err(e) = bus.send(forwarded).await {
                            debug!("Bridge stopped: {}", e);
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Bridge to {} skipped {} records", to, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Bridge to {} stopped", to);
        })
    }

    /// Stop accepting records and end all subscriptions
    pub async fn close(&self) {
        // Dropping the senders wakes every receiver with `Closed`.
        self.topics.write().await.take();
        self.closed_tx.send_replace(true);
        debug!("Topic bus closed");
    }

    /// Check if the bus has been closed
    pub async fn is_closed(&self) -> bool {
        self.topics.read().await.is_none()
    }

    /// Resolve once the bus has been closed
    pub async fn closed(&self) {
        let mut closed_rx = self.closed_tx.subscribe();
        // The sender lives as long as `self`, so this only errors if it is dropped.
        let _ = closed_rx.wait_for(|closed| *closed).await;
    }
}

impl Default for TopicBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusPublisher for TopicBus {
    async fn send(&self, record: BusRecord) -> Result<(), RelayError> {
        let guard = self.topics.read().await;
        let Some(topics) = guard.as_ref() else {
            return Err(RelayError::Closed {
                topic: record.topic,
            });
        };

        match topics.get(&record.topic) {
            Some(sender) => {
                let topic = record.topic.clone();
                if sender.send(record).is_err() {
                    debug!("No active subscribers on topic {}", topic);
                }
            }
            None => debug!("No subscribers on topic {}", record.topic),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_bus_creation() {
        let bus = TopicBus::new();
        assert!(!bus.is_closed().await);
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let bus = TopicBus::new();
        let mut sub = bus.subscribe("notes.remote").await;

        bus.send(BusRecord::new("notes.remote", "hello").with_key("k"))
            .await
            .unwrap();

        let record = sub.recv().await.unwrap();
        assert_eq!(record.payload, "hello");
        assert_eq!(record.key.as_deref(), Some("k"));
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let bus = TopicBus::new();
        let mut sub = bus.subscribe("a").await;

        bus.send(BusRecord::new("b", "other")).await.unwrap();
        bus.send(BusRecord::new("a", "mine")).await.unwrap();

        assert_eq!(sub.recv().await.unwrap().payload, "mine");
    }

    #[tokio::test]
    async fn test_send_without_subscribers_succeeds() {
        let bus = TopicBus::new();
        assert!(bus.send(BusRecord::new("nobody", "x")).await.is_ok());
    }

    #[tokio::test]
    async fn test_close_rejects_sends_and_ends_subscriptions() {
        let bus = TopicBus::new();
        let mut sub = bus.subscribe("t").await;

        bus.close().await;

        let err = bus.send(BusRecord::new("t", "x")).await.unwrap_err();
        assert_eq!(err, RelayError::Closed { topic: "t".to_string() });
        assert!(matches!(
            sub.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_bridge_forwards_records() {
        let bus = TopicBus::new();
        let mut sub = bus.subscribe("to").await;
        let handle = bus.bridge("from", "to").await;

        bus.send(BusRecord::new("from", "payload").with_key("id-1"))
            .await
            .unwrap();

        let record = timeout(Duration::from_secs(1), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.topic, "to");
        assert_eq!(record.payload, "payload");
        assert_eq!(record.key.as_deref(), Some("id-1"));

        bus.close().await;
        timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_subscribe_after_close_ends_immediately() {
        let bus = TopicBus::new();
        bus.close().await;

        let mut sub = bus.subscribe("late").await;
        assert!(matches!(
            timeout(Duration::from_secs(1), sub.recv()).await.unwrap(),
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_subscribe_racing_close_never_hangs() {
        for _ in 0..50 {
            let bus = TopicBus::new();
            let subscribers: Vec<_> = (0..8)
                .map(|i| {
                    let bus = bus.clone();
                    tokio::spawn(async move { bus.subscribe(format!("t{}", i % 2)).await })
                })
                .collect();
            bus.close().await;

            for handle in subscribers {
                let mut sub = handle.await.unwrap();
                let next = timeout(Duration::from_secs(1), sub.recv())
                    .await
                    .expect("subscription outlived close");
                assert!(matches!(next, Err(broadcast::error::RecvError::Closed)));
            }
        }
    }

    #[tokio::test]
    async fn test_closed_resolves_after_close() {
        let bus = TopicBus::new();
        let waiter = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.closed().await })
        };

        bus.close().await;
        timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        // Already closed: resolves without waiting.
        timeout(Duration::from_secs(1), bus.closed()).await.unwrap();
    }
}
