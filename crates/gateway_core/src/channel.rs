//! Channel namespaces and subscription authorization.
//!
//! A channel's prefix fully determines its policy:
//!
//! * `user_<id>` - private to the user whose identifier is `<id>`
//! * `game_<id>` - restricted to members of game `<id>` (`<id>` must be an `i64`)
//! * anything else - unrestricted
//!
//! Authorization is a pure function of the channel name and the subscribing
//! user, plus one membership lookup for the game namespace.

use crate::{connection::Client, error::GatewayError, membership::MembershipOracle};
use std::sync::Arc;
use std::time::Duration;

pub const USER_CHANNEL_PREFIX: &str = "user_";
pub const GAME_CHANNEL_PREFIX: &str = "game_";

/// A channel name classified by namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    /// `user_<id>`; the suffix is kept verbatim
    PrivateUser(String),
    /// `game_<id>`
    Game(i64),
    /// Any name outside the reserved namespaces
    Unrestricted(String),
}

impl Channel {
    /// Classifies a raw channel name.
    ///
    /// Fails with [`GatewayError::BadRequest`] when a `game_` suffix is not a
    /// valid 64-bit integer.
    pub fn parse(name: &str) -> Result<Self, GatewayError> {
        if let Some(user_id) = name.strip_prefix(USER_CHANNEL_PREFIX) {
            return Ok(Channel::PrivateUser(user_id.to_string()));
        }
        if let Some(game_id) = name.strip_prefix(GAME_CHANNEL_PREFIX) {
            return game_id
                .parse::<i64>()
                .map(Channel::Game)
                .map_err(|_| GatewayError::BadRequest);
        }
        Ok(Channel::Unrestricted(name.to_string()))
    }

    /// Canonical channel name for this variant.
    pub fn name(&self) -> String {
        match self {
            Channel::PrivateUser(user_id) => format!("{USER_CHANNEL_PREFIX}{user_id}"),
            Channel::Game(game_id) => format!("{GAME_CHANNEL_PREFIX}{game_id}"),
            Channel::Unrestricted(name) => name.clone(),
        }
    }

    pub fn user(user_id: &str) -> Self {
        Channel::PrivateUser(user_id.to_string())
    }

    pub fn game(game_id: i64) -> Self {
        Channel::Game(game_id)
    }
}

/// Decides whether a client may subscribe to a channel.
///
/// Holds no mutable state; safe to share across every connection.
#[derive(Clone)]
pub struct ChannelAuthorizer {
    oracle: Arc<dyn MembershipOracle>,
    lookup_timeout: Option<Duration>,
}

impl ChannelAuthorizer {
    pub fn new(oracle: Arc<dyn MembershipOracle>) -> Self {
        Self {
            oracle,
            lookup_timeout: None,
        }
    }

    /// Bounds each membership lookup. An elapsed deadline is reported as
    /// [`GatewayError::Internal`].
    pub fn with_lookup_timeout(mut self, lookup_timeout: Option<Duration>) -> Self {
        self.lookup_timeout = lookup_timeout;
        self
    }

    /// Returns `Ok(())` when `client` may subscribe to `channel`.
    ///
    /// # Errors
    ///
    /// * [`GatewayError::PermissionDenied`] - foreign user channel or not a game member
    /// * [`GatewayError::BadRequest`] - non-integer game id, or non-integer user id
    ///   on a game channel
    /// * [`GatewayError::Internal`] - membership lookup failed or timed out
    pub async fn authorize(&self, client: &Client, channel: &str) -> Result<(), GatewayError> {
        match Channel::parse(channel)? {
            Channel::PrivateUser(owner) => {
                if owner == client.user_id() {
                    Ok(())
                } else {
                    Err(GatewayError::PermissionDenied)
                }
            }
            Channel::Game(game_id) => {
                // User ids are integer-formatted by deployment; anything else
                // is a consistency bug but still reported as BadRequest.
                let user_id = client
                    .user_id()
                    .parse::<i64>()
                    .map_err(|_| GatewayError::BadRequest)?;
                if self.is_member(game_id, user_id).await? {
                    Ok(())
                } else {
                    Err(GatewayError::PermissionDenied)
                }
            }
            Channel::Unrestricted(_) => Ok(()),
        }
    }

    async fn is_member(&self, game_id: i64, user_id: i64) -> Result<bool, GatewayError> {
        let lookup = self.oracle.is_member(game_id, user_id);
        let result = match self.lookup_timeout {
            Some(limit) => tokio::time::timeout(limit, lookup).await.map_err(|_| {
                GatewayError::Internal(format!(
                    "membership lookup for game {game_id} timed out after {limit:?}"
                ))
            })?,
            None => lookup.await,
        };
        result.map_err(|e| GatewayError::Internal(e.to_string()))
    }
}

impl std::fmt::Debug for ChannelAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelAuthorizer")
            .field("lookup_timeout", &self.lookup_timeout)
            .finish()
    }
}
