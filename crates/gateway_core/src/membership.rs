//! Game membership lookups.

use async_trait::async_trait;

/// Failure reported by a membership backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("membership store unavailable: {0}")]
    Unavailable(String),
}

/// Answers whether a user belongs to a game session.
///
/// Implementations are called concurrently from every connection and must
/// bound their own latency.
#[async_trait]
pub trait MembershipOracle: Send + Sync {
    async fn is_member(&self, game_id: i64, user_id: i64) -> Result<bool, OracleError>;
}
