//! # Gateway Core - Realtime Game Gateway
//!
//! The authorization and RPC-dispatch core of a realtime messaging gateway
//! for multiplayer games. Clients hold long-lived WebSocket connections,
//! subscribe to named channels and invoke game operations over RPC. The core
//! decides who may subscribe to what and routes RPC calls to the game
//! collaborator; it never implements game rules itself.
//!
//! ## Design Philosophy
//!
//! * **Closed channel namespaces** - raw channel names parse into a small set of
//!   tagged variants, and authorization is a pure match over them
//! * **Static dispatch table** - RPC methods are registered once at startup
//! * **Explicit capability set** - every transport event has a hook on
//!   [`EventSurface`] with no default body
//! * **Transport owns state** - subscriptions and connections live in the
//!   [`ConnectionManager`]; the core only gates their creation
//!
//! ## Architecture Overview
//!
//! ### Core Components
//!
//! * **Channel Authorizer** - [`ChannelAuthorizer`] gates subscriptions
//! * **Dispatch Table** - [`DispatchTable`] maps RPC methods to handlers
//! * **Event Surface** - [`GatewayHandler`] answers every client event
//! * **Game Store** - [`GameStore`] is the in-memory membership oracle and game
//!   operations collaborator
//! * **Server** - [`GatewayServer`] accepts WebSocket clients
//!
//! ### Channel Rules
//!
//! | Channel          | Who may subscribe                                 |
//! |------------------|---------------------------------------------------|
//! | `user_<id>`      | only the client whose user id equals `<id>`       |
//! | `game_<id>`      | members of game `<id>`, per the membership oracle |
//! | anything else    | any authenticated client                          |
//!
//! ### Message Flow
//!
//! 1. Client sends `{"id", "method", "params"}` in a WebSocket text frame
//! 2. The first command must be `connect`; its token resolves the user id
//! 3. Each further command runs on its own task against the [`EventSurface`]
//! 4. Replies carry the command id; publications arrive as `{"push": ...}`
//!
//! ## Dispatching RPC
//!
//! ```rust
//! use gateway_core::{handler_fn, Client, DispatchTable, GatewayError, HandlerError};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let table = DispatchTable::builder()
//!     .method("echo", handler_fn(|_client: Client, payload: Vec<u8>| async move {
//!         Ok::<_, HandlerError>(String::from_utf8_lossy(&payload).into_owned())
//!     }))
//!     .build();
//!
//! let client = Client::new(1, "42", None);
//! assert_eq!(table.dispatch(&client, "echo", b"hi").await.unwrap(), br#""hi""#.to_vec());
//! assert_eq!(
//!     table.dispatch(&client, "missing", b"").await,
//!     Err(GatewayError::MethodNotFound)
//! );
//! # }
//! ```
//!
//! ## Error Handling
//!
//! * [`GatewayError`] - the client-visible taxonomy with wire codes
//! * [`HandlerError`] - application errors, forwarded verbatim
//! * [`OracleError`] - membership lookup failures, surfaced as internal errors
//! * [`ServerError`] - network and startup failures

// Re-export core types and functions for easy access
pub use channel::{Channel, ChannelAuthorizer};
pub use config::{PublishPolicy, ServerConfig};
pub use connection::{Client, ConnectionId, ConnectionManager};
pub use error::{GatewayError, HandlerError, ServerError};
pub use events::{dispatch_event, ClientEvent, EventReply, EventSurface, GatewayHandler};
pub use games::{GameOperations, GameStore, GameSummary, LeftGameReply};
pub use identity::{IdentityResolver, InsecureIdentityResolver, StaticTokenResolver};
pub use membership::{MembershipOracle, OracleError};
pub use rpc::{handler_fn, DispatchTable, DispatchTableBuilder, RpcHandler};
pub use server::GatewayServer;
pub use utils::{create_game_gateway, create_server, create_server_with_config};

// Public module declarations
pub mod channel;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod games;
pub mod identity;
pub mod membership;
pub mod messaging;
pub mod rpc;
pub mod server;
pub mod utils;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;
