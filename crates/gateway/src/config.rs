//! Configuration management for the gateway.
//!
//! This module handles loading, validation, and conversion of gateway
//! configuration from TOML files and command-line arguments.

use gateway_core::{PublishPolicy, ServerConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Connection authentication settings
    #[serde(default)]
    pub auth: AuthSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Server-specific configuration settings.
///
/// Controls network binding, connection limits, collaborator deadlines and
/// the publish policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:8000")
    pub bind_address: String,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Deadline for membership lookups and RPC handlers in milliseconds (0 disables it)
    #[serde(default)]
    pub collaborator_timeout_ms: u64,
    /// Who may publish into a channel
    #[serde(default)]
    pub publish_policy: PublishPolicy,
}

/// Default for max_connections
fn default_max_connections() -> usize {
    1000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            max_connections: default_max_connections(),
            collaborator_timeout_ms: 0,
            publish_policy: PublishPolicy::AllowAll,
        }
    }
}

/// How `connect` tokens become user ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Treat the token itself as the user id. Development only.
    #[serde(default)]
    pub allow_insecure_identity: bool,
    /// Token -> user id table
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration to `path`
    /// and returns it.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the application configuration into the core server settings.
    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let collaborator_timeout = match self.server.collaborator_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            max_connections: self.server.max_connections,
            collaborator_timeout,
            publish_policy: self.server.publish_policy,
        })
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "Invalid bind address: {}",
                &self.server.bind_address
            ));
        }

        if self.server.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }

        if !self.auth.allow_insecure_identity && self.auth.tokens.is_empty() {
            return Err(
                "No identities configured: add [auth.tokens] or enable allow_insecure_identity"
                    .to_string(),
            );
        }

        if let Some((token, _)) = self.auth.tokens.iter().find(|(token, user)| token.is_empty() || user.is_empty()) {
            return Err(format!("Empty token or user id in [auth.tokens] entry '{token}'"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
