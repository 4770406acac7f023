//! Utility functions and helper methods for the gateway.
//!
//! This module provides convenient factory functions for wiring the
//! reference game gateway and creating server instances.

use crate::{
    channel::ChannelAuthorizer,
    config::ServerConfig,
    events::{EventSurface, GatewayHandler},
    games::GameStore,
    identity::IdentityResolver,
    rpc::DispatchTable,
    server::GatewayServer,
};
use std::sync::Arc;

/// Builds the game gateway's event surface around a [`GameStore`].
///
/// The store answers membership lookups for `game_<id>` channels and backs
/// the four game RPC methods. The collaborator deadline and publish policy
/// come from `config`.
///
/// # Example
///
/// ```rust
/// use gateway_core::{create_game_gateway, GameStore, ServerConfig};
/// use std::sync::Arc;
///
/// let handler = create_game_gateway(&ServerConfig::default(), Arc::new(GameStore::new()));
/// assert_eq!(
///     handler.dispatch_table().methods(),
///     vec!["create_game", "find_game", "join_game", "left_game"]
/// );
/// ```
pub fn create_game_gateway(config: &ServerConfig, games: Arc<GameStore>) -> GatewayHandler {
    let authorizer =
        ChannelAuthorizer::new(games.clone()).with_lookup_timeout(config.collaborator_timeout);
    let rpc = DispatchTable::for_games(games)
        .call_timeout(config.collaborator_timeout)
        .build();
    GatewayHandler::new(authorizer, rpc).with_publish_policy(config.publish_policy)
}

/// Creates a new gateway server with default configuration.
pub fn create_server(
    surface: Arc<dyn EventSurface>,
    identity: Arc<dyn IdentityResolver>,
) -> GatewayServer {
    GatewayServer::new(ServerConfig::default(), surface, identity)
}

/// Creates a new gateway server with custom configuration.
///
/// # Example
///
/// ```rust
/// use gateway_core::{
///     create_game_gateway, create_server_with_config, GameStore, InsecureIdentityResolver,
///     ServerConfig,
/// };
/// use std::sync::Arc;
///
/// let config = ServerConfig {
///     bind_address: "0.0.0.0:9000".parse().unwrap(),
///     max_connections: 5000,
///     ..Default::default()
/// };
/// let surface = Arc::new(create_game_gateway(&config, Arc::new(GameStore::new())));
/// let server = create_server_with_config(config, surface, Arc::new(InsecureIdentityResolver));
/// assert_eq!(server.config().max_connections, 5000);
/// ```
pub fn create_server_with_config(
    config: ServerConfig,
    surface: Arc<dyn EventSurface>,
    identity: Arc<dyn IdentityResolver>,
) -> GatewayServer {
    GatewayServer::new(config, surface, identity)
}
