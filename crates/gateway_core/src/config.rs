//! Gateway configuration types and defaults.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Who may publish into a channel.
///
/// `AllowAll` matches the historical behaviour: any authenticated connection
/// may publish anywhere, even into channels it could not subscribe to.
/// `SubscribeRules` applies the subscribe authorization to publishes too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishPolicy {
    #[default]
    AllowAll,
    SubscribeRules,
}

/// Configuration structure for the gateway server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// Deadline for membership lookups and RPC handlers (`None` disables it)
    pub collaborator_timeout: Option<Duration>,

    /// Publish authorization policy
    pub publish_policy: PublishPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            max_connections: 1000,
            collaborator_timeout: None,
            publish_policy: PublishPolicy::AllowAll,
        }
    }
}
