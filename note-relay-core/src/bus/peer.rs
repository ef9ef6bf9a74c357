//! WebSocket link between two relays
//!
//! Each connection carries records from our outbound topic to the peer as
//! text frames, and republishes the peer's text frames on our inbound
//! topic. Either side may listen; the other dials. A frame's body is the
//! record payload, so the relay on the far side decodes exactly what the
//! local relay emitted.

use super::events::BusRecord;
use super::queue::{BusPublisher, Subscription, TopicBus};
use crate::config::TopicsConfig;
use crate::error::{Error, Result};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::{accept_async, connect_async, tungstenite::Message as WsMessage, WebSocketStream};
use tracing::{debug, error, info, warn};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Accepts peer connections and links each one to the local bus
pub struct PeerListener {
    listener: TcpListener,
    bus: TopicBus,
    topics: TopicsConfig,
    connections: Arc<AtomicUsize>,
}

impl PeerListener {
    pub async fn bind(addr: &str, bus: TopicBus, topics: &TopicsConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Peer(format!("failed to listen on {}: {}", addr, e)))?;
        Ok(Self {
            listener,
            bus,
            topics: topics.clone(),
            connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Number of peer connections linked so far.
    ///
    /// A connection is counted once it is subscribed to the outbound topic,
    /// so records published after the count moves reach that peer.
    pub fn connection_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.connections)
    }

    /// Run the accept loop until the bus closes
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Accepting peer connections");
            loop {
                tokio::select! {
                    _ = self.bus.closed() => break,
                    accepted = self.listener.accept() => match accepted {
                        Ok((stream, addr)) => {
                            let bus = self.bus.clone();
                            let topics = self.topics.clone();
                            let connections = Arc::clone(&self.connections);
                            tokio::spawn(async move {
                                let ws = match timeout(HANDSHAKE_TIMEOUT, accept_async(stream)).await {
                                    Ok(Ok(ws)) => ws,
                                    Ok(Err(e)) => {
                                        warn!("Peer handshake with {} failed: {}", addr, e);
                                        return;
                                    }
                                    Err(_) => {
                                        warn!("Peer handshake with {} timed out", addr);
                                        return;
                                    }
                                };
                                let mut outbound = bus.subscribe(&topics.local_outbound).await;
                                connections.fetch_add(1, Ordering::SeqCst);
                                info!("Peer {} connected", addr);
                                pump(ws, &bus, &mut outbound, &topics.remote_inbound, &addr.to_string()).await;
                            });
                        }
                        Err(e) => warn!("Failed to accept peer connection: {}", e),
                    }
                }
            }
            debug!("Peer listener stopped");
        })
    }
}

/// Dial `url` and keep the link up, redialing after `retry` whenever it
/// drops. The task ends when the bus closes.
///
/// The outbound subscription outlives individual connections, so records
/// published while the peer is away are delivered on reconnect, up to the
/// bus's per-subscriber buffer.
pub fn spawn_peer_connector(
    url: String,
    bus: TopicBus,
    topics: &TopicsConfig,
    retry: Duration,
) -> JoinHandle<()> {
    let topics = topics.clone();
    tokio::spawn(async move {
        let mut outbound = bus.subscribe(&topics.local_outbound).await;
        loop {
            tokio::select! {
                _ = bus.closed() => break,
                connected = connect_async(url.as_str()) => match connected {
                    Ok((ws, _)) => {
                        info!("Connected to peer {}", url);
                        pump(ws, &bus, &mut outbound, &topics.remote_inbound, &url).await;
                    }
                    Err(e) => error!("Failed to connect to peer {}: {}", url, e),
                }
            }

            if bus.is_closed().await {
                break;
            }
            info!("Reconnecting to peer {} in {:?}", url, retry);
            tokio::select! {
                _ = bus.closed() => break,
                _ = sleep(retry) => {}
            }
        }
        debug!("Peer connector for {} stopped", url);
    })
}

async fn pump<S>(
    ws: WebSocketStream<S>,
    bus: &TopicBus,
    outbound: &mut Subscription,
    inbound_topic: &str,
    peer: &str,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut write, mut read) = ws.split();
    loop {
        tokio::select! {
            record = outbound.recv() => match record {
                Ok(record) => {
                    if let Err(e) = write.send(WsMessage::Text(record.payload)).await {
                        warn!("Failed to send to peer {}: {}", peer, e);
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Peer {} link skipped {} outbound records", peer, skipped);
                }
                Err(RecvError::Closed) => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    break;
                }
            },
            frame = read.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    if let Err(e) = bus.send(BusRecord::new(inbound_topic, text)).await {
                        debug!("Dropping frame from peer {}: {}", peer, e);
                        break;
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!("Peer {} disconnected", peer);
                    break;
                }
                Some(Err(e)) => {
                    warn!("Peer {} connection error: {}", peer, e);
                    break;
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{spawn_subscriber, RelayService};
    use crate::store::MessageStore;
    use crate::Message;
    use serde_json::json;

    struct Node {
        bus: TopicBus,
        relay: RelayService,
        subscriber: JoinHandle<()>,
    }

    async fn node() -> Node {
        let bus = TopicBus::new();
        let relay = RelayService::new(
            Arc::new(MessageStore::default()),
            Arc::new(bus.clone()),
            &TopicsConfig::default(),
        );
        let subscription = bus.subscribe(&TopicsConfig::default().remote_inbound).await;
        let subscriber = spawn_subscriber(relay.clone(), subscription);
        Node {
            bus,
            relay,
            subscriber,
        }
    }

    async fn wait_for_remote(relay: &RelayService, count: usize) -> Vec<Message> {
        timeout(Duration::from_secs(3), async {
            loop {
                let remote = relay.list_remote();
                if remote.len() >= count {
                    return remote;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("peer messages did not arrive")
    }

    #[tokio::test]
    async fn test_relays_between_two_nodes_in_both_directions() {
        let a = node().await;
        let b = node().await;

        let listener = PeerListener::bind("127.0.0.1:0", b.bus.clone(), &TopicsConfig::default())
            .await
            .unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let connections = listener.connection_counter();
        let listener_handle = listener.spawn();
        let connector = spawn_peer_connector(
            url,
            a.bus.clone(),
            &TopicsConfig::default(),
            Duration::from_millis(50),
        );

        timeout(Duration::from_secs(3), async {
            while connections.load(Ordering::SeqCst) < 1 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("peer never connected");

        a.relay
            .publish(&json!({"id": "from-a", "payload": "hi b", "notes": {"comment": "c"}}))
            .await
            .unwrap();
        b.relay
            .publish(&json!({"id": "from-b", "payload": "hi a", "notes": "legacy"}))
            .await
            .unwrap();

        let at_b = wait_for_remote(&b.relay, 1).await;
        assert_eq!(at_b[0].id, "from-a");
        assert_eq!(at_b[0].notes.as_deref(), Some("c"));
        let at_a = wait_for_remote(&a.relay, 1).await;
        assert_eq!(at_a[0].id, "from-b");
        assert_eq!(at_a[0].notes.as_deref(), Some("legacy"));

        // Local publishes stay on the local side.
        assert_eq!(a.relay.list_local()[0].id, "from-a");
        assert_eq!(b.relay.list_local()[0].id, "from-b");

        a.bus.close().await;
        b.bus.close().await;
        for handle in [connector, listener_handle, a.subscriber, b.subscriber] {
            timeout(Duration::from_secs(3), handle).await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_connector_stops_on_close_while_peer_is_unreachable() {
        let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", unused.local_addr().unwrap());
        drop(unused);

        let bus = TopicBus::new();
        let connector = spawn_peer_connector(
            url,
            bus.clone(),
            &TopicsConfig::default(),
            Duration::from_millis(20),
        );
        sleep(Duration::from_millis(100)).await;

        bus.close().await;
        timeout(Duration::from_secs(3), connector).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_is_peer_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        let err = PeerListener::bind(&addr, TopicBus::new(), &TopicsConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Peer(_)));
    }
}
