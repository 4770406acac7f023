//! Connection handling logic for WebSocket clients.
//!
//! This module contains the core connection handling logic that manages
//! the lifecycle of individual client connections, including WebSocket
//! handshaking, authentication, command processing, and cleanup.

use crate::{
    connection::{Client, ConnectionId, ConnectionManager, Sequence, OUTBOUND_QUEUE_CAPACITY},
    error::{GatewayError, ServerError},
    events::{dispatch_event, ClientEvent, DisconnectEvent, DisconnectReason, EventSurface},
    identity::IdentityResolver,
    messaging::{parse_command, route_client_message, send_error, send_reply, ClientCommand, Command, ServerReply},
};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, trace, warn};

/// Commands a single connection may have in flight. Further frames are not
/// read from the socket until one finishes.
pub const MAX_IN_FLIGHT_COMMANDS: usize = 64;

/// Handles a single client connection from establishment to cleanup.
///
/// # Connection Flow
///
/// 1. Perform WebSocket handshake
/// 2. Register connection with the connection manager
/// 3. Start the writer task draining the outbound queue into the socket
/// 4. Authenticate the first `connect` command through the [`IdentityResolver`]
/// 5. Process every further command on its own task, at most
///    [`MAX_IN_FLIGHT_COMMANDS`] at a time
/// 6. Emit the disconnect event and release every subscription
///
/// # Arguments
///
/// * `stream` - The TCP stream for the client connection
/// * `addr` - The remote address of the client
/// * `connections` - Manager for tracking connections and subscriptions
/// * `surface` - The event surface answering client events
/// * `identity` - Resolver turning the connect token into a user id
/// * `shutdown` - Flips to `true` when the server is stopping
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connections: Arc<ConnectionManager>,
    surface: Arc<dyn EventSurface>,
    identity: Arc<dyn IdentityResolver>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed: {e}")))?;

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (outbound, mut outbound_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE_CAPACITY);

    let connection_id = match connections.add_connection(addr, outbound).await {
        Ok(id) => id,
        Err(e) => {
            warn!("Rejecting {}: {}", addr, e);
            let _ = ws_sender.send(Message::Close(None)).await;
            return Err(e);
        }
    };

    // Outgoing message task; ends once the connection is removed and every
    // in-flight command has dropped its sender.
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if let Err(e) = ws_sender.send(message).await {
                debug!("Failed to send message to connection {}: {}", connection_id, e);
                break;
            }
            if closing {
                break;
            }
        }
    });

    let client = match authenticate(&mut ws_receiver, connection_id, addr, &connections, identity.as_ref()).await {
        Some(client) => Arc::new(client),
        None => {
            connections.send_to_connection(connection_id, Message::Close(None)).await;
            connections.remove_connection(connection_id).await;
            let _ = writer.await;
            return Ok(());
        }
    };

    info!("👋 User {} connected from {}", client.user_id(), addr);

    let in_flight = Arc::new(Semaphore::new(MAX_IN_FLIGHT_COMMANDS));
    let mut sequence: Sequence = 0;

    let reason = loop {
        tokio::select! {
            msg = ws_receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let Ok(permit) = in_flight.clone().acquire_owned().await else {
                        break DisconnectReason::ConnectionError("command limiter closed".to_string());
                    };
                    sequence += 1;
                    let sequence = sequence;
                    let connections = connections.clone();
                    let surface = surface.clone();
                    let client = client.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(e) =
                            route_client_message(text.as_str(), sequence, &client, &connections, surface.as_ref()).await
                        {
                            trace!("❌ Message routing error: {}", e);
                        }
                    });
                }
                Some(Ok(Message::Ping(data))) => {
                    connections.send_to_connection(connection_id, Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("🔌 Client {} requested close", connection_id);
                    break DisconnectReason::ClientClosed;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("WebSocket error for connection {}: {}", connection_id, e);
                    break DisconnectReason::ConnectionError(e.to_string());
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    connections.send_to_connection(connection_id, Message::Close(None)).await;
                    break DisconnectReason::ServerShutdown;
                }
            }
        }
    };

    let event = ClientEvent::Disconnect(DisconnectEvent { reason });
    if let Err(e) = dispatch_event(surface.as_ref(), &client, &event).await {
        debug!("Disconnect hook for connection {} failed: {}", connection_id, e);
    }

    let released = connections.remove_connection(connection_id).await;
    trace!("Released {} subscription(s) of connection {}", released.len(), connection_id);
    let _ = writer.await;
    Ok(())
}

/// Waits for the `connect` command and resolves the connection's identity.
///
/// Replies to the command either way. Returns `None` when the connection
/// should be closed.
async fn authenticate<S>(
    ws_receiver: &mut S,
    connection_id: ConnectionId,
    addr: SocketAddr,
    connections: &ConnectionManager,
    identity: &dyn IdentityResolver,
) -> Option<Client>
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let text = match ws_receiver.next().await? {
            Ok(Message::Text(text)) => text,
            Ok(Message::Ping(data)) => {
                connections.send_to_connection(connection_id, Message::Pong(data)).await;
                continue;
            }
            Ok(Message::Close(_)) => return None,
            Ok(_) => continue,
            Err(e) => {
                debug!("Connection {} failed before connect: {}", connection_id, e);
                return None;
            }
        };

        // Anyone sending something other than `connect` first is unauthenticated.
        let Ok(command) = serde_json::from_str::<ClientCommand>(text.as_str()) else {
            reject(connections, connection_id, addr, 0, &GatewayError::PermissionDenied).await;
            return None;
        };
        let token = match parse_command(&command) {
            Ok(Command::Connect { token }) => token,
            Ok(Command::Event(_)) | Err(_) => {
                reject(connections, connection_id, addr, command.id, &GatewayError::PermissionDenied).await;
                return None;
            }
        };

        return match identity.resolve(&token).await {
            Ok(user_id) => {
                connections.set_user_id(connection_id, &user_id).await;
                let client = Client::new(connection_id, user_id, Some(addr));
                let result = serde_json::json!({
                    "client": connection_id.to_string(),
                    "user": client.user_id(),
                });
                send_reply(connections, &client, ServerReply::ok(command.id, result)).await;
                Some(client)
            }
            Err(e) => {
                reject(connections, connection_id, addr, command.id, &e).await;
                None
            }
        };
    }
}

async fn reject(
    connections: &ConnectionManager,
    connection_id: ConnectionId,
    addr: SocketAddr,
    command_id: u64,
    err: &GatewayError,
) {
    debug!("🚫 Connect refused for connection {} from {}", connection_id, addr);
    let anonymous = Client::new(connection_id, "", Some(addr));
    send_error(connections, &anonymous, command_id, err).await;
}
