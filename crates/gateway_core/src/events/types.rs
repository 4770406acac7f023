//! Event and reply types for every transport callback.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    ClientClosed,
    ConnectionError(String),
    ServerShutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectEvent {
    pub reason: DisconnectReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeEvent {
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeEvent {
    pub channel: String,
}

/// Client-originated write to a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishEvent {
    pub channel: String,
    pub data: serde_json::Value,
}

/// Remote procedure call; `data` is the opaque request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcEvent {
    pub method: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshEvent {
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRefreshEvent {
    pub channel: String,
}

/// Client-to-server push outside RPC and publish.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEvent {
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceStatsEvent {
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEvent {
    pub channel: String,
    pub limit: Option<usize>,
}

/// Every event the transport can deliver.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Alive,
    Disconnect(DisconnectEvent),
    Subscribe(SubscribeEvent),
    Unsubscribe(UnsubscribeEvent),
    Publish(PublishEvent),
    Rpc(RpcEvent),
    Refresh(RefreshEvent),
    SubRefresh(SubRefreshEvent),
    Message(MessageEvent),
    Presence(PresenceEvent),
    PresenceStats(PresenceStatsEvent),
    History(HistoryEvent),
}

impl ClientEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::Alive => "alive",
            ClientEvent::Disconnect(_) => "disconnect",
            ClientEvent::Subscribe(_) => "subscribe",
            ClientEvent::Unsubscribe(_) => "unsubscribe",
            ClientEvent::Publish(_) => "publish",
            ClientEvent::Rpc(_) => "rpc",
            ClientEvent::Refresh(_) => "refresh",
            ClientEvent::SubRefresh(_) => "sub_refresh",
            ClientEvent::Message(_) => "message",
            ClientEvent::Presence(_) => "presence",
            ClientEvent::PresenceStats(_) => "presence_stats",
            ClientEvent::History(_) => "history",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubscribeReply {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishReply {}

/// Successful RPC; `data` is the JSON-encoded handler result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpcReply {
    pub data: Vec<u8>,
}

/// Session renewal. `expire_at` of `None` means the session never expires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubRefreshReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub user_id: String,
    pub client_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PresenceReply {
    pub clients: BTreeMap<String, ClientInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PresenceStatsReply {
    pub num_clients: u32,
    pub num_users: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub offset: u64,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryReply {
    pub publications: Vec<Publication>,
}

/// Reply produced for a [`ClientEvent`]. Fire-and-forget events answer `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum EventReply {
    None,
    Subscribe(SubscribeReply),
    Publish(PublishReply),
    Rpc(RpcReply),
    Refresh(RefreshReply),
    SubRefresh(SubRefreshReply),
    Presence(PresenceReply),
    PresenceStats(PresenceStatsReply),
    History(HistoryReply),
}
