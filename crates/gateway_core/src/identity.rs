//! Resolution of connection tokens into user identities.

use crate::error::GatewayError;
use async_trait::async_trait;
use std::collections::HashMap;

/// Turns the credential presented on `connect` into a user identifier.
///
/// A failed resolution is answered with [`GatewayError::PermissionDenied`] and
/// the transport closes the connection.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<String, GatewayError>;
}

/// Fixed token -> user id table, typically loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenResolver {
    tokens: HashMap<String, String>,
}

impl StaticTokenResolver {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl IdentityResolver for StaticTokenResolver {
    async fn resolve(&self, token: &str) -> Result<String, GatewayError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or(GatewayError::PermissionDenied)
    }
}

/// Accepts the token itself as the user id. Development only.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsecureIdentityResolver;

#[async_trait]
impl IdentityResolver for InsecureIdentityResolver {
    async fn resolve(&self, token: &str) -> Result<String, GatewayError> {
        if token.is_empty() {
            Err(GatewayError::PermissionDenied)
        } else {
            Ok(token.to_string())
        }
    }
}
