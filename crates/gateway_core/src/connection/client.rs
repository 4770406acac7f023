//! Authenticated client session.
//!
//! A [`Client`] is created once the transport has resolved the connection's
//! identity and lives until the transport signals disconnect. Event hooks only
//! ever borrow it for the duration of a single callback.

use super::ConnectionId;
use std::net::SocketAddr;
use std::time::SystemTime;

/// Represents an authenticated client connection.
///
/// # Fields
///
/// * `connection_id` - Transport-assigned connection identifier
/// * `user_id` - Authenticated user identifier, fixed for the connection lifetime
/// * `remote_addr` - The network address of the connected client, if known
/// * `connected_at` - Timestamp when the session was established
#[derive(Debug, Clone)]
pub struct Client {
    connection_id: ConnectionId,
    user_id: String,
    remote_addr: Option<SocketAddr>,
    connected_at: SystemTime,
}

impl Client {
    /// Creates a new client session for an authenticated user.
    ///
    /// # Arguments
    ///
    /// * `connection_id` - The transport's identifier for the connection
    /// * `user_id` - The identity produced by the identity resolver
    /// * `remote_addr` - The network address of the client, when available
    pub fn new(
        connection_id: ConnectionId,
        user_id: impl Into<String>,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            connection_id,
            user_id: user_id.into(),
            remote_addr,
            connected_at: SystemTime::now(),
        }
    }

    /// The authenticated user identifier.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn connected_at(&self) -> SystemTime {
        self.connected_at
    }
}
