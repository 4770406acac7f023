//! Message handling and routing for client-gateway communication.
//!
//! This module provides the JSON command envelope carried in WebSocket text
//! frames and the routing of parsed commands onto the event surface.

pub mod router;
pub mod types;

pub use router::{parse_command, route_client_message, send_error, send_reply, Command};
pub use types::{ClientCommand, ServerPush, ServerReply};
