//! Message routing logic for dispatching client commands to the event surface.
//!
//! Parses a command, drives the matching [`EventSurface`] hook, applies the
//! transport-side effects of a successful outcome (recording subscriptions,
//! fanning out publications) and queues the reply.

use super::types::*;
use crate::{
    connection::{Client, ConnectionManager, Sequence},
    error::{GatewayError, ServerError},
    events::*,
};
use tracing::{debug, error, trace};

/// A parsed client command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Authenticate the connection; must be the first command
    Connect { token: String },
    /// Any other command, mapped onto the event surface
    Event(ClientEvent),
}

fn params<T: serde::de::DeserializeOwned>(value: &serde_json::Value) -> Result<T, GatewayError> {
    serde_json::from_value(value.clone()).map_err(|_| GatewayError::BadRequest)
}

fn params_or_default<T: serde::de::DeserializeOwned + Default>(
    value: &serde_json::Value,
) -> Result<T, GatewayError> {
    if value.is_null() {
        Ok(T::default())
    } else {
        params(value)
    }
}

/// Maps a [`ClientCommand`] onto a [`Command`].
///
/// Unknown command names and malformed parameters yield
/// [`GatewayError::BadRequest`].
pub fn parse_command(command: &ClientCommand) -> Result<Command, GatewayError> {
    let p = &command.params;
    let event = match command.method.as_str() {
        "connect" => {
            let ConnectParams { token } = params(p)?;
            return Ok(Command::Connect { token });
        }
        "ping" => ClientEvent::Alive,
        "subscribe" => {
            let ChannelParams { channel } = params(p)?;
            ClientEvent::Subscribe(SubscribeEvent { channel })
        }
        "unsubscribe" => {
            let ChannelParams { channel } = params(p)?;
            ClientEvent::Unsubscribe(UnsubscribeEvent { channel })
        }
        "publish" => {
            let PublishParams { channel, data } = params(p)?;
            ClientEvent::Publish(PublishEvent { channel, data })
        }
        "rpc" => {
            let RpcParams { method, data } = params(p)?;
            let data = match data {
                Some(value) => serde_json::to_vec(&value).map_err(|_| GatewayError::BadRequest)?,
                None => Vec::new(),
            };
            ClientEvent::Rpc(RpcEvent { method, data })
        }
        "refresh" => {
            let RefreshParams { token } = params_or_default(p)?;
            ClientEvent::Refresh(RefreshEvent { token })
        }
        "sub_refresh" => {
            let ChannelParams { channel } = params(p)?;
            ClientEvent::SubRefresh(SubRefreshEvent { channel })
        }
        "send" => {
            let SendParams { data } = params_or_default(p)?;
            ClientEvent::Message(MessageEvent { data })
        }
        "presence" => {
            let ChannelParams { channel } = params(p)?;
            ClientEvent::Presence(PresenceEvent { channel })
        }
        "presence_stats" => {
            let ChannelParams { channel } = params(p)?;
            ClientEvent::PresenceStats(PresenceStatsEvent { channel })
        }
        "history" => {
            let HistoryParams { channel, limit } = params(p)?;
            ClientEvent::History(HistoryEvent { channel, limit })
        }
        _ => return Err(GatewayError::BadRequest),
    };
    Ok(Command::Event(event))
}

/// Converts an event outcome into the JSON `result` of a reply.
pub fn reply_result(reply: EventReply) -> Result<serde_json::Value, GatewayError> {
    let encoded = match reply {
        EventReply::None => Ok(serde_json::json!({})),
        EventReply::Subscribe(r) => serde_json::to_value(r),
        EventReply::Publish(r) => serde_json::to_value(r),
        EventReply::Rpc(RpcReply { data }) => serde_json::from_slice::<serde_json::Value>(&data)
            .map(|data| serde_json::json!({ "data": data })),
        EventReply::Refresh(r) => serde_json::to_value(r),
        EventReply::SubRefresh(r) => serde_json::to_value(r),
        EventReply::Presence(r) => serde_json::to_value(r),
        EventReply::PresenceStats(r) => serde_json::to_value(r),
        EventReply::History(r) => serde_json::to_value(r),
    };
    encoded.map_err(|e| GatewayError::Internal(e.to_string()))
}

/// Queues `reply` for `client` unless the command asked for none.
pub async fn send_reply(connections: &ConnectionManager, client: &Client, reply: ServerReply) {
    if reply.id == 0 {
        return;
    }
    queue_reply(connections, client, reply).await;
}

/// Queues an error reply even when `id` is `0`.
///
/// Used for frames that could not be read as a command, so there is no id
/// the client could have asked to suppress the reply with.
pub async fn send_error(connections: &ConnectionManager, client: &Client, id: u64, err: &GatewayError) {
    queue_reply(connections, client, ServerReply::error(id, err)).await;
}

async fn queue_reply(connections: &ConnectionManager, client: &Client, reply: ServerReply) {
    match reply.to_message() {
        Ok(message) => {
            if !connections.send_to_connection(client.connection_id(), message).await {
                debug!("Reply {} dropped, connection {} is gone", reply.id, client.connection_id());
            }
        }
        Err(e) => error!("Failed to encode reply {}: {}", reply.id, e),
    }
}

/// Routes a command from an authenticated client.
///
/// # Message Flow
///
/// 1. Parse the raw text as a [`ClientCommand`]
/// 2. Map it onto a [`ClientEvent`]
/// 3. Run the matching [`EventSurface`] hook
/// 4. Apply transport side effects of a successful subscribe, unsubscribe or publish
/// 5. Queue the reply
///
/// `sequence` is the frame's position within its connection and orders the
/// subscription changes of concurrently routed frames.
///
/// Every failure still produces a reply; a frame that is not a command gets
/// a `BadRequest` reply with id `0`. The returned error is only for the
/// caller's diagnostics.
pub async fn route_client_message(
    text: &str,
    sequence: Sequence,
    client: &Client,
    connections: &ConnectionManager,
    surface: &dyn EventSurface,
) -> Result<(), ServerError> {
    let command: ClientCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            send_error(connections, client, 0, &GatewayError::BadRequest).await;
            return Err(ServerError::Network(format!("Invalid JSON: {e}")));
        }
    };

    let event = match parse_command(&command) {
        Ok(Command::Event(event)) => event,
        Ok(Command::Connect { .. }) => {
            // Identity is fixed for the lifetime of the connection.
            send_reply(connections, client, ServerReply::error(command.id, &GatewayError::BadRequest)).await;
            return Ok(());
        }
        Err(err) => {
            send_reply(connections, client, ServerReply::error(command.id, &err)).await;
            return Ok(());
        }
    };

    trace!(
        "📨 Routing '{}' from user {} on connection {}",
        event.kind(),
        client.user_id(),
        client.connection_id()
    );

    let outcome = dispatch_event(surface, client, &event).await;
    if outcome.is_ok() {
        apply_transport_effects(&event, sequence, client, connections).await;
    }

    let reply = match outcome.and_then(reply_result) {
        Ok(result) => ServerReply::ok(command.id, result),
        Err(err) => ServerReply::error(command.id, &err),
    };
    send_reply(connections, client, reply).await;
    Ok(())
}

async fn apply_transport_effects(
    event: &ClientEvent,
    sequence: Sequence,
    client: &Client,
    connections: &ConnectionManager,
) {
    match event {
        ClientEvent::Subscribe(e) => {
            connections.subscribe(client.connection_id(), &e.channel, sequence).await;
        }
        ClientEvent::Unsubscribe(e) => {
            connections.unsubscribe(client.connection_id(), &e.channel, sequence).await;
        }
        ClientEvent::Publish(e) => match ServerPush::new(&e.channel, e.data.clone()).to_message() {
            Ok(message) => {
                connections.publish_to_channel(&e.channel, message).await;
            }
            Err(err) => error!("Failed to encode publication for '{}': {}", e.channel, err),
        },
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn command(value: serde_json::Value) -> ClientCommand {
        serde_json::from_value(value).expect("valid command")
    }

    #[test]
    fn parses_every_command() {
        let cases = [
            (json!({"method": "ping"}), "alive"),
            (json!({"method": "subscribe", "params": {"channel": "lobby"}}), "subscribe"),
            (json!({"method": "unsubscribe", "params": {"channel": "lobby"}}), "unsubscribe"),
            (json!({"method": "publish", "params": {"channel": "lobby", "data": 1}}), "publish"),
            (json!({"method": "rpc", "params": {"method": "find_game"}}), "rpc"),
            (json!({"method": "refresh"}), "refresh"),
            (json!({"method": "sub_refresh", "params": {"channel": "lobby"}}), "sub_refresh"),
            (json!({"method": "send", "params": {"data": "x"}}), "message"),
            (json!({"method": "presence", "params": {"channel": "lobby"}}), "presence"),
            (json!({"method": "presence_stats", "params": {"channel": "lobby"}}), "presence_stats"),
            (json!({"method": "history", "params": {"channel": "lobby", "limit": 5}}), "history"),
        ];
        for (value, kind) in cases {
            match parse_command(&command(value)) {
                Ok(Command::Event(event)) => assert_eq!(event.kind(), kind),
                other => panic!("unexpected parse for {kind}: {other:?}"),
            }
        }
    }

    #[test]
    fn rpc_payload_is_encoded_json() {
        let parsed = parse_command(&command(json!({
            "method": "rpc",
            "params": {"method": "join_game", "data": {"game_id": 7}}
        })));
        let Ok(Command::Event(ClientEvent::Rpc(rpc))) = parsed else {
            panic!("expected rpc, got {parsed:?}");
        };
        assert_eq!(rpc.method, "join_game");
        assert_eq!(rpc.data, br#"{"game_id":7}"#.to_vec());
    }

    #[test]
    fn connect_and_bad_commands() {
        assert_eq!(
            parse_command(&command(json!({"method": "connect", "params": {"token": "t"}}))),
            Ok(Command::Connect { token: "t".to_string() })
        );
        assert_eq!(
            parse_command(&command(json!({"method": "connect"}))),
            Err(GatewayError::BadRequest)
        );
        assert_eq!(
            parse_command(&command(json!({"method": "subscribe", "params": {}}))),
            Err(GatewayError::BadRequest)
        );
        assert_eq!(
            parse_command(&command(json!({"method": "teleport"}))),
            Err(GatewayError::BadRequest)
        );
    }

    #[test]
    fn rpc_reply_embeds_handler_json() {
        let result = reply_result(EventReply::Rpc(RpcReply {
            data: br#"{"game_id":1}"#.to_vec(),
        }))
        .unwrap();
        assert_eq!(result, json!({"data": {"game_id": 1}}));
        assert_eq!(reply_result(EventReply::None).unwrap(), json!({}));
        assert_eq!(
            reply_result(EventReply::Presence(PresenceReply::default())).unwrap(),
            json!({"clients": {}})
        );
    }
}
