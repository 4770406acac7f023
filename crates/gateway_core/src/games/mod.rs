//! Game session operations invoked over RPC.
//!
//! [`GameOperations`] is the collaborator the dispatch table routes the four
//! game methods to. [`GameStore`] is an in-memory implementation that also
//! serves as the membership oracle for `game_<id>` channels.

pub mod store;
pub mod types;

pub use store::GameStore;
pub use types::{GameSummary, LeftGameReply};

use crate::{connection::Client, error::HandlerError};
use async_trait::async_trait;

/// Business operations behind `find_game`, `create_game`, `join_game` and
/// `left_game`. Implementations must be safe for concurrent calls from any
/// number of clients.
#[async_trait]
pub trait GameOperations: Send + Sync {
    async fn find_game(&self, client: &Client, payload: &[u8]) -> Result<GameSummary, HandlerError>;

    async fn create_game(&self, client: &Client, payload: &[u8]) -> Result<GameSummary, HandlerError>;

    async fn join_game(&self, client: &Client, payload: &[u8]) -> Result<GameSummary, HandlerError>;

    async fn left_game(&self, client: &Client, payload: &[u8]) -> Result<LeftGameReply, HandlerError>;
}
