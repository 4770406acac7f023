//! Connection manager for tracking client connections and subscriptions.
//!
//! The transport owns the subscription registry. The authorization engine only
//! decides whether a subscription may be created; this manager records it,
//! fans publications out to subscribers, and drops everything on disconnect.
//!
//! Commands of one connection run concurrently, so subscription changes carry
//! the sequence number of the frame that caused them. A change never undoes
//! one made by a later frame of the same connection.

use super::ConnectionId;
use crate::error::ServerError;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Outbound queue for a single connection. A writer task drains it into the
/// WebSocket sink.
pub type OutboundSender = mpsc::Sender<Message>;

/// Capacity of each connection's outbound queue. Messages for a connection
/// whose queue is full are dropped.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 1000;

/// Position of a frame within its connection, assigned in arrival order.
pub type Sequence = u64;

#[derive(Debug)]
struct ConnectionEntry {
    remote_addr: SocketAddr,
    user_id: Option<String>,
    connected_at: SystemTime,
    outbound: OutboundSender,
    /// Channel -> sequence of the frame that last confirmed the subscription
    subscriptions: HashMap<String, Sequence>,
    /// Channel -> sequence of the latest applied unsubscribe
    unsubscribed: HashMap<String, Sequence>,
}

/// Central manager for all client connections.
///
/// # Architecture
///
/// * Uses `RwLock<HashMap>` for connection and channel storage
/// * Implements atomic connection ID generation
/// * Keeps a channel -> subscribers index for publication fan-out
///
/// Lock order is `connections` before `channels`.
#[derive(Debug)]
pub struct ConnectionManager {
    connections: RwLock<HashMap<ConnectionId, ConnectionEntry>>,
    channels: RwLock<HashMap<String, HashSet<ConnectionId>>>,
    next_id: AtomicUsize,
    max_connections: usize,
}

impl ConnectionManager {
    /// Creates a new connection manager accepting at most `max_connections`
    /// concurrent connections.
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            channels: RwLock::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            max_connections,
        }
    }

    /// Adds a new connection and returns its unique ID.
    ///
    /// Fails with [`ServerError::Internal`] when the connection limit has
    /// been reached.
    pub async fn add_connection(
        &self,
        remote_addr: SocketAddr,
        outbound: OutboundSender,
    ) -> Result<ConnectionId, ServerError> {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.max_connections {
            return Err(ServerError::Internal(format!(
                "connection limit of {} reached",
                self.max_connections
            )));
        }

        let connection_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        connections.insert(
            connection_id,
            ConnectionEntry {
                remote_addr,
                user_id: None,
                connected_at: SystemTime::now(),
                outbound,
                subscriptions: HashMap::new(),
                unsubscribed: HashMap::new(),
            },
        );
        info!("🔗 Connection {} from {}", connection_id, remote_addr);
        Ok(connection_id)
    }

    /// Removes a connection together with every subscription it held.
    ///
    /// Returns the channels the connection was subscribed to.
    pub async fn remove_connection(&self, connection_id: ConnectionId) -> Vec<String> {
        let removed = self.connections.write().await.remove(&connection_id);
        let Some(entry) = removed else {
            return Vec::new();
        };

        let mut channels = self.channels.write().await;
        for channel in entry.subscriptions.keys() {
            if let Some(subscribers) = channels.get_mut(channel) {
                subscribers.remove(&connection_id);
                if subscribers.is_empty() {
                    channels.remove(channel);
                }
            }
        }

        let connected_for = entry.connected_at.elapsed().unwrap_or_default();
        info!(
            "❌ Connection {} from {} disconnected after {:?}",
            connection_id, entry.remote_addr, connected_for
        );
        entry.subscriptions.into_keys().collect()
    }

    /// Records the authenticated user for a connection.
    pub async fn set_user_id(&self, connection_id: ConnectionId, user_id: &str) {
        let mut connections = self.connections.write().await;
        if let Some(entry) = connections.get_mut(&connection_id) {
            entry.user_id = Some(user_id.to_string());
        }
    }

    pub async fn user_id(&self, connection_id: ConnectionId) -> Option<String> {
        let connections = self.connections.read().await;
        connections.get(&connection_id).and_then(|c| c.user_id.clone())
    }

    /// Records a subscription made by frame `sequence`.
    ///
    /// Returns `false` if it already existed, the connection is gone, or a
    /// later frame already unsubscribed from the channel.
    pub async fn subscribe(&self, connection_id: ConnectionId, channel: &str, sequence: Sequence) -> bool {
        let mut connections = self.connections.write().await;
        let Some(entry) = connections.get_mut(&connection_id) else {
            return false;
        };
        if entry.unsubscribed.get(channel).is_some_and(|&later| later > sequence) {
            debug!(
                "Connection {} left '{}' before subscribe #{} completed",
                connection_id, channel, sequence
            );
            return false;
        }
        if let Some(confirmed) = entry.subscriptions.get_mut(channel) {
            *confirmed = (*confirmed).max(sequence);
            return false;
        }
        entry.subscriptions.insert(channel.to_string(), sequence);

        self.channels
            .write()
            .await
            .entry(channel.to_string())
            .or_default()
            .insert(connection_id);
        debug!("📥 Connection {} subscribed to '{}'", connection_id, channel);
        true
    }

    /// Drops a subscription on behalf of frame `sequence`.
    ///
    /// Returns `false` if there was nothing to drop or the subscription was
    /// made by a later frame.
    pub async fn unsubscribe(&self, connection_id: ConnectionId, channel: &str, sequence: Sequence) -> bool {
        let mut connections = self.connections.write().await;
        let Some(entry) = connections.get_mut(&connection_id) else {
            return false;
        };
        let latest = entry.unsubscribed.entry(channel.to_string()).or_default();
        *latest = (*latest).max(sequence);

        let removed = match entry.subscriptions.get(channel) {
            Some(&confirmed) if confirmed < sequence => {
                entry.subscriptions.remove(channel);
                true
            }
            _ => false,
        };

        if removed {
            let mut channels = self.channels.write().await;
            if let Some(subscribers) = channels.get_mut(channel) {
                subscribers.remove(&connection_id);
                if subscribers.is_empty() {
                    channels.remove(channel);
                }
            }
            debug!("📤 Connection {} unsubscribed from '{}'", connection_id, channel);
        }
        removed
    }

    /// Channels a connection is currently subscribed to, sorted.
    pub async fn subscriptions(&self, connection_id: ConnectionId) -> Vec<String> {
        let connections = self.connections.read().await;
        let mut channels: Vec<String> = connections
            .get(&connection_id)
            .map(|entry| entry.subscriptions.keys().cloned().collect())
            .unwrap_or_default();
        channels.sort();
        channels
    }

    /// Connections currently subscribed to `channel`, sorted.
    pub async fn subscribers(&self, channel: &str) -> Vec<ConnectionId> {
        let channels = self.channels.read().await;
        let mut subscribers: Vec<ConnectionId> = channels
            .get(channel)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        subscribers.sort_unstable();
        subscribers
    }

    /// Queues a message for a specific connection.
    ///
    /// Returns `false` if the connection is unknown, its queue is full, or its
    /// writer has gone away.
    pub async fn send_to_connection(&self, connection_id: ConnectionId, message: Message) -> bool {
        let connections = self.connections.read().await;
        match connections.get(&connection_id) {
            Some(entry) => enqueue(connection_id, &entry.outbound, message),
            None => false,
        }
    }

    /// Fans a message out to every subscriber of `channel`.
    ///
    /// Returns the number of connections the message was queued for.
    pub async fn publish_to_channel(&self, channel: &str, message: Message) -> usize {
        let subscribers = self.subscribers(channel).await;
        let connections = self.connections.read().await;
        let mut delivered = 0;
        for connection_id in subscribers {
            if let Some(entry) = connections.get(&connection_id) {
                if enqueue(connection_id, &entry.outbound, message.clone()) {
                    delivered += 1;
                }
            }
        }
        debug!("📡 Published to '{}' for {} connections", channel, delivered);
        delivered
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

fn enqueue(connection_id: ConnectionId, outbound: &OutboundSender, message: Message) -> bool {
    match outbound.try_send(message) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("⚠️ Outbound queue of connection {} is full, dropping message", connection_id);
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().expect("valid test address")
    }

    #[tokio::test]
    async fn enforces_connection_limit() {
        let manager = ConnectionManager::new(1);
        let (tx, _rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        manager
            .add_connection(addr(), tx.clone())
            .await
            .expect("first connection fits");
        assert!(manager.add_connection(addr(), tx).await.is_err());
        assert_eq!(manager.connection_count().await, 1);
    }

    #[tokio::test]
    async fn subscription_lifecycle() {
        let manager = ConnectionManager::new(10);
        let (tx, _rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let id = manager.add_connection(addr(), tx).await.unwrap();

        assert!(manager.subscribe(id, "lobby", 1).await);
        assert!(!manager.subscribe(id, "lobby", 2).await);
        assert!(manager.subscribe(id, "game_1", 3).await);
        assert_eq!(manager.subscriptions(id).await, vec!["game_1", "lobby"]);
        assert_eq!(manager.subscribers("lobby").await, vec![id]);

        assert!(manager.unsubscribe(id, "lobby", 4).await);
        assert!(!manager.unsubscribe(id, "lobby", 5).await);
        assert!(manager.subscribers("lobby").await.is_empty());

        let dropped = manager.remove_connection(id).await;
        assert_eq!(dropped, vec!["game_1".to_string()]);
        assert!(manager.subscribers("game_1").await.is_empty());
    }

    #[tokio::test]
    async fn publish_reaches_only_subscribers() {
        let manager = ConnectionManager::new(10);
        let (tx_a, mut rx_a) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let (tx_b, mut rx_b) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let a = manager.add_connection(addr(), tx_a).await.unwrap();
        let _b = manager.add_connection(addr(), tx_b).await.unwrap();

        manager.subscribe(a, "lobby", 1).await;
        let delivered = manager
            .publish_to_channel("lobby", Message::Text("hello".into()))
            .await;

        assert_eq!(delivered, 1);
        assert_eq!(rx_a.recv().await, Some(Message::Text("hello".into())));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn late_subscribe_does_not_undo_unsubscribe() {
        let manager = ConnectionManager::new(10);
        let (tx, _rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let id = manager.add_connection(addr(), tx).await.unwrap();

        // Frame 2 (unsubscribe) completes before frame 1 (subscribe).
        assert!(!manager.unsubscribe(id, "game_1", 2).await);
        assert!(!manager.subscribe(id, "game_1", 1).await);
        assert!(manager.subscribers("game_1").await.is_empty());

        // A later subscribe still goes through.
        assert!(manager.subscribe(id, "game_1", 3).await);
        assert_eq!(manager.subscribers("game_1").await, vec![id]);
    }

    #[tokio::test]
    async fn late_unsubscribe_keeps_newer_subscription() {
        let manager = ConnectionManager::new(10);
        let (tx, _rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let id = manager.add_connection(addr(), tx).await.unwrap();

        assert!(manager.subscribe(id, "lobby", 3).await);
        assert!(!manager.unsubscribe(id, "lobby", 2).await);
        assert_eq!(manager.subscriptions(id).await, vec!["lobby"]);
    }

    #[tokio::test]
    async fn full_queue_drops_publication() {
        let manager = ConnectionManager::new(10);
        let (tx, mut rx) = mpsc::channel(1);
        let id = manager.add_connection(addr(), tx).await.unwrap();
        manager.subscribe(id, "lobby", 1).await;

        assert_eq!(manager.publish_to_channel("lobby", Message::Text("one".into())).await, 1);
        assert_eq!(manager.publish_to_channel("lobby", Message::Text("two".into())).await, 0);
        assert!(!manager.send_to_connection(id, Message::Text("three".into())).await);

        assert_eq!(rx.recv().await, Some(Message::Text("one".into())));
        assert!(rx.try_recv().is_err());
        assert!(manager.send_to_connection(id, Message::Text("four".into())).await);
    }

    #[tokio::test]
    async fn user_id_is_recorded() {
        let manager = ConnectionManager::new(10);
        let (tx, _rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let id = manager.add_connection(addr(), tx).await.unwrap();
        assert_eq!(manager.user_id(id).await, None);
        manager.set_user_id(id, "42").await;
        assert_eq!(manager.user_id(id).await.as_deref(), Some("42"));
    }
}
