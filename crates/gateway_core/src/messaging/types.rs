//! Message type definitions for client-gateway communication.
//!
//! Clients send one JSON command per WebSocket text frame and receive either a
//! reply correlated by `id` or an asynchronous channel push.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::Message;

/// A command sent from a client to the gateway.
///
/// # Fields
///
/// * `id` - Correlation id echoed in the reply; `0` asks for no reply to a
///   successfully parsed command
/// * `method` - Command name (`connect`, `subscribe`, `rpc`, ...)
/// * `params` - Command parameters as a JSON value
///
/// # Examples
///
/// Subscribing to a game channel:
/// ```json
/// { "id": 2, "method": "subscribe", "params": { "channel": "game_100" } }
/// ```
///
/// Calling an RPC:
/// ```json
/// { "id": 3, "method": "rpc", "params": { "method": "join_game", "data": { "game_id": 100 } } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCommand {
    #[serde(default)]
    pub id: u64,

    pub method: String,

    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectParams {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelParams {
    pub channel: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishParams {
    pub channel: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcParams {
    pub method: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshParams {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendParams {
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryParams {
    pub channel: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u32,
    pub message: String,
}

impl From<&GatewayError> for ErrorBody {
    fn from(err: &GatewayError) -> Self {
        Self {
            code: err.code(),
            message: err.client_message(),
        }
    }
}

/// Reply to a [`ClientCommand`]; exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerReply {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl ServerReply {
    pub fn ok(id: u64, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: u64, err: &GatewayError) -> Self {
        Self {
            id,
            result: None,
            error: Some(ErrorBody::from(err)),
        }
    }

    pub fn to_message(&self) -> serde_json::Result<Message> {
        Ok(Message::Text(serde_json::to_string(self)?.into()))
    }
}

/// Publication delivered to channel subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerPush {
    pub push: PushBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushBody {
    pub channel: String,
    pub data: serde_json::Value,
}

impl ServerPush {
    pub fn new(channel: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            push: PushBody {
                channel: channel.into(),
                data,
            },
        }
    }

    pub fn to_message(&self) -> serde_json::Result<Message> {
        Ok(Message::Text(serde_json::to_string(self)?.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_defaults() {
        let command: ClientCommand = serde_json::from_str(r#"{"method":"ping"}"#).unwrap();
        assert_eq!(command.id, 0);
        assert_eq!(command.method, "ping");
        assert!(command.params.is_null());
    }

    #[test]
    fn error_reply_shape() {
        let reply = ServerReply::error(9, &GatewayError::MethodNotFound);
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"id": 9, "error": {"code": 104, "message": "method not found"}})
        );
    }

    #[test]
    fn push_shape() {
        let push = ServerPush::new("lobby", json!({"text": "hi"}));
        assert_eq!(
            serde_json::to_value(&push).unwrap(),
            json!({"push": {"channel": "lobby", "data": {"text": "hi"}}})
        );
    }
}
