//! Connection management for client connections.
//!
//! This module owns the transport side of a session: the authenticated
//! [`Client`], outbound message queues, and the subscription registry that
//! the authorization engine gates.

pub mod client;
pub mod manager;

pub use client::Client;
pub use manager::{ConnectionManager, Sequence, OUTBOUND_QUEUE_CAPACITY};

/// Type alias for connection identifiers.
///
/// Connection IDs are used to uniquely identify client connections
/// throughout their lifecycle on the server.
pub type ConnectionId = usize;
