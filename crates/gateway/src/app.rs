//! Main application logic and lifecycle management.
//!
//! This module contains the `Application` struct that wires the gateway
//! collaborators together, runs the server and coordinates shutdown.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::display_banner,
    signals::termination_signal,
};
use gateway_core::{
    create_game_gateway, create_server_with_config, GameStore, GatewayServer, IdentityResolver,
    InsecureIdentityResolver, StaticTokenResolver,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Main application struct.
///
/// # Architecture
///
/// * **Configuration Management**: Loads and validates configuration from files and CLI
/// * **Gateway Wiring**: Game store, channel authorizer, dispatch table, identity resolver
/// * **Graceful Shutdown**: Handles termination signals and drains connections
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Gateway server instance
    server: GatewayServer,
    /// In-memory game sessions, kept for shutdown statistics
    games: Arc<GameStore>,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Build the game store, event surface and identity resolver
    /// 5. Create the gateway server
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address;
        }

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let server_config = config.to_server_config()?;
        let games = Arc::new(GameStore::new());
        let surface = Arc::new(create_game_gateway(&server_config, games.clone()));
        let identity = identity_resolver(&config);
        let server = create_server_with_config(server_config, surface, identity);

        Ok(Self {
            config,
            server,
            games,
        })
    }

    /// Runs the gateway until a termination signal arrives.
    ///
    /// A second signal during shutdown exits the process immediately.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting game gateway");
        self.log_configuration_summary();

        let listener = self.server.bind().await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let Self {
            config,
            server,
            games,
        } = self;
        let connections = server.connection_manager();

        let mut server_handle = tokio::spawn(async move { server.serve(listener, shutdown_rx).await });

        info!("✅ Gateway is now running!");
        info!("🎮 Ready to accept connections on {}", config.server.bind_address);
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        tokio::select! {
            signal = termination_signal() => {
                info!("📡 {} received, draining the gateway", signal?);
            }
            finished = &mut server_handle => {
                return match finished {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.into()),
                    Err(e) => Err(e.into()),
                };
            }
        }

        // A second signal abandons the drain.
        tokio::spawn(async move {
            match termination_signal().await {
                Ok(signal) => {
                    warn!("⚠️ {} received during drain, exiting now", signal);
                    std::process::exit(1);
                }
                Err(e) => error!("Failed to watch for a second termination signal: {e}"),
            }
        });

        info!("🛑 Shutdown signal received, closing connections...");
        let _ = shutdown_tx.send(true);

        match tokio::time::timeout(tokio::time::Duration::from_secs(8), server_handle).await {
            Ok(Ok(Ok(()))) => info!("✅ Accept loop stopped"),
            Ok(Ok(Err(e))) => error!("❌ Server error during shutdown: {}", e),
            Ok(Err(e)) => error!("❌ Server task failed: {}", e),
            Err(_) => warn!("⏰ Server task did not stop within timeout, proceeding"),
        }

        // Connections observe the same signal; give them a moment to say goodbye.
        for _ in 0..30 {
            if connections.connection_count().await == 0 {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }

        info!("📊 Final Statistics:");
        info!("  - Open connections: {}", connections.connection_count().await);
        info!("  - Active games: {}", games.game_count().await);
        info!("✅ Gateway shutdown complete");

        Ok(())
    }

    /// Logs the configuration summary at startup.
    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  👥 Max connections: {}", self.config.server.max_connections);
        match self.config.server.collaborator_timeout_ms {
            0 => info!("  ⏱️ Collaborator timeout: disabled"),
            ms => info!("  ⏱️ Collaborator timeout: {}ms", ms),
        }
        info!("  📢 Publish policy: {:?}", self.config.server.publish_policy);
        info!("  🔑 Configured tokens: {}", self.config.auth.tokens.len());
    }
}

/// Picks the identity resolver the configuration asks for.
fn identity_resolver(config: &AppConfig) -> Arc<dyn IdentityResolver> {
    if config.auth.allow_insecure_identity {
        warn!("⚠️ Insecure identity enabled: connect tokens are trusted as user ids");
        Arc::new(InsecureIdentityResolver)
    } else {
        Arc::new(StaticTokenResolver::new(config.auth.tokens.clone()))
    }
}
