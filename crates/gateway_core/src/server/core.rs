//! Core gateway server implementation.
//!
//! This module contains the main `GatewayServer` struct, which binds the
//! listener, accepts WebSocket clients and hands each socket to
//! [`handle_connection`] together with the shared collaborators.

use crate::{
    config::ServerConfig,
    connection::ConnectionManager,
    error::ServerError,
    events::EventSurface,
    identity::IdentityResolver,
    server::handlers::handle_connection,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, trace};

/// The WebSocket gateway server.
///
/// # Architecture
///
/// * **Connection Management**: connection lifecycle and the subscription registry
/// * **Event Surface**: answers every client event (authorization, RPC, no-op hooks)
/// * **Identity Resolver**: authenticates the `connect` command of each connection
///
/// The server itself contains no authorization or game logic; it only moves
/// commands between sockets and the event surface.
pub struct GatewayServer {
    /// Server configuration settings
    config: ServerConfig,

    /// Manager for client connections and subscriptions
    connection_manager: Arc<ConnectionManager>,

    /// Callbacks answering client events
    surface: Arc<dyn EventSurface>,

    /// Authenticates `connect` tokens
    identity: Arc<dyn IdentityResolver>,
}

impl GatewayServer {
    /// Creates a new gateway server. Nothing is bound until [`start`](Self::start)
    /// or [`bind`](Self::bind) is called.
    pub fn new(
        config: ServerConfig,
        surface: Arc<dyn EventSurface>,
        identity: Arc<dyn IdentityResolver>,
    ) -> Self {
        let connection_manager = Arc::new(ConnectionManager::new(config.max_connections));
        Self {
            config,
            connection_manager,
            surface,
            identity,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn connection_manager(&self) -> Arc<ConnectionManager> {
        self.connection_manager.clone()
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let listener = TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| ServerError::Network(format!("Failed to bind {}: {e}", self.config.bind_address)))?;
        trace!("✅ Listener bound on {}", self.config.bind_address);
        Ok(listener)
    }

    /// Binds the configured address and serves until `shutdown` flips to `true`.
    pub async fn start(&self, shutdown: watch::Receiver<bool>) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Accepts connections on `listener` until `shutdown` flips to `true` or
    /// its sender is dropped.
    ///
    /// Live connections observe the same signal, emit their disconnect event
    /// and close.
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ServerError> {
        let local_addr: Option<SocketAddr> = listener.local_addr().ok();
        info!(
            "🚀 Gateway listening on {}",
            local_addr.map_or_else(|| self.config.bind_address.to_string(), |a| a.to_string())
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let connections = self.connection_manager.clone();
                        let surface = self.surface.clone();
                        let identity = self.identity.clone();
                        let shutdown = shutdown.clone();

                        // Spawn individual connection handler
                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(stream, addr, connections, surface, identity, shutdown).await
                            {
                                error!("Connection error from {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        // Transient accept failures (e.g. fd exhaustion) must not stop the server.
                        error!("Failed to accept connection: {}", e);
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("🛑 Accept loop stopping - shutdown initiated");
                        break;
                    }
                }
            }
        }

        info!(
            "🧹 Server stopped with {} connection(s) still closing",
            self.connection_manager.connection_count().await
        );
        Ok(())
    }
}
