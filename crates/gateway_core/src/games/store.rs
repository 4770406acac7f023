//! In-memory game session store.
//!
//! Tracks which users are seated in which game. Rules of play are out of
//! scope; this is only the membership bookkeeping the gateway authorizes
//! against.

use super::types::{
    decode, decode_or_default, game_full, game_not_found, invalid_params, not_a_member,
    CreateGameRequest, FindGameRequest, GameSummary, JoinGameRequest, LeftGameReply,
    LeftGameRequest, DEFAULT_MAX_PLAYERS, MAX_PLAYERS, MIN_PLAYERS,
};
use super::GameOperations;
use crate::{
    channel::Channel,
    connection::Client,
    error::HandlerError,
    membership::{MembershipOracle, OracleError},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct GameSession {
    owner_id: i64,
    max_players: u32,
    players: Vec<i64>,
}

impl GameSession {
    fn summary(&self, game_id: i64) -> GameSummary {
        GameSummary {
            game_id,
            owner_id: self.owner_id,
            players: self.players.clone(),
            max_players: self.max_players,
            channel: Channel::game(game_id).name(),
        }
    }

    fn is_full(&self) -> bool {
        self.players.len() >= self.max_players as usize
    }
}

#[derive(Debug)]
struct StoreState {
    next_id: i64,
    games: BTreeMap<i64, GameSession>,
}

/// Thread-safe in-memory store of game sessions.
#[derive(Debug)]
pub struct GameStore {
    state: RwLock<StoreState>,
}

impl Default for GameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GameStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                next_id: 1,
                games: BTreeMap::new(),
            }),
        }
    }

    /// Snapshot of a single game.
    pub async fn game(&self, game_id: i64) -> Option<GameSummary> {
        let state = self.state.read().await;
        state.games.get(&game_id).map(|session| session.summary(game_id))
    }

    pub async fn game_count(&self) -> usize {
        self.state.read().await.games.len()
    }

    /// Creates a game owned and joined by `owner_id`.
    pub async fn create(&self, owner_id: i64, max_players: u32) -> Result<GameSummary, HandlerError> {
        validate_max_players(max_players)?;
        let mut state = self.state.write().await;
        let game_id = state.next_id;
        state.next_id += 1;
        let session = GameSession {
            owner_id,
            max_players,
            players: vec![owner_id],
        };
        let summary = session.summary(game_id);
        state.games.insert(game_id, session);
        info!("🎲 Game {} created by user {} ({} seats)", game_id, owner_id, max_players);
        Ok(summary)
    }

    /// Seats `user_id` in `game_id`. Joining a game twice is a no-op.
    pub async fn join(&self, game_id: i64, user_id: i64) -> Result<GameSummary, HandlerError> {
        let mut state = self.state.write().await;
        let session = state.games.get_mut(&game_id).ok_or_else(|| game_not_found(game_id))?;
        if !session.players.contains(&user_id) {
            if session.is_full() {
                return Err(game_full(game_id));
            }
            session.players.push(user_id);
            debug!("User {} joined game {}", user_id, game_id);
        }
        Ok(session.summary(game_id))
    }

    /// Removes `user_id` from `game_id`, dropping the game once it is empty.
    pub async fn leave(&self, game_id: i64, user_id: i64) -> Result<LeftGameReply, HandlerError> {
        let mut state = self.state.write().await;
        let session = state.games.get_mut(&game_id).ok_or_else(|| game_not_found(game_id))?;
        let position = session
            .players
            .iter()
            .position(|player| *player == user_id)
            .ok_or_else(|| not_a_member(game_id))?;
        session.players.remove(position);

        let remaining_players = session.players.clone();
        let closed = remaining_players.is_empty();
        if closed {
            state.games.remove(&game_id);
            info!("🏁 Game {} closed, last player {} left", game_id, user_id);
        } else {
            debug!("User {} left game {}", user_id, game_id);
        }
        Ok(LeftGameReply {
            game_id,
            remaining_players,
            closed,
        })
    }

    /// Seats `user_id` in the lowest-numbered open game they are not already
    /// in, creating a new game when none has a free seat.
    pub async fn find(&self, user_id: i64, max_players: u32) -> Result<GameSummary, HandlerError> {
        validate_max_players(max_players)?;
        {
            let mut state = self.state.write().await;
            let open = state
                .games
                .iter_mut()
                .find(|(_, session)| !session.is_full() && !session.players.contains(&user_id));
            if let Some((game_id, session)) = open {
                session.players.push(user_id);
                debug!("Matched user {} into game {}", user_id, game_id);
                return Ok(session.summary(*game_id));
            }
        }
        self.create(user_id, max_players).await
    }
}

fn validate_max_players(max_players: u32) -> Result<(), HandlerError> {
    if (MIN_PLAYERS..=MAX_PLAYERS).contains(&max_players) {
        Ok(())
    } else {
        Err(invalid_params(format!(
            "max_players must be between {MIN_PLAYERS} and {MAX_PLAYERS}"
        )))
    }
}

fn numeric_user_id(client: &Client) -> Result<i64, HandlerError> {
    client
        .user_id()
        .parse::<i64>()
        .map_err(|_| invalid_params(format!("user id '{}' is not numeric", client.user_id())))
}

#[async_trait]
impl MembershipOracle for GameStore {
    async fn is_member(&self, game_id: i64, user_id: i64) -> Result<bool, OracleError> {
        let state = self.state.read().await;
        Ok(state
            .games
            .get(&game_id)
            .is_some_and(|session| session.players.contains(&user_id)))
    }
}

#[async_trait]
impl GameOperations for GameStore {
    async fn find_game(&self, client: &Client, payload: &[u8]) -> Result<GameSummary, HandlerError> {
        let user_id = numeric_user_id(client)?;
        let request: FindGameRequest = decode_or_default(payload)?;
        self.find(user_id, request.max_players.unwrap_or(DEFAULT_MAX_PLAYERS))
            .await
    }

    async fn create_game(&self, client: &Client, payload: &[u8]) -> Result<GameSummary, HandlerError> {
        let user_id = numeric_user_id(client)?;
        let request: CreateGameRequest = decode_or_default(payload)?;
        self.create(user_id, request.max_players.unwrap_or(DEFAULT_MAX_PLAYERS))
            .await
    }

    async fn join_game(&self, client: &Client, payload: &[u8]) -> Result<GameSummary, HandlerError> {
        let user_id = numeric_user_id(client)?;
        let request: JoinGameRequest = decode(payload)?;
        self.join(request.game_id, user_id).await
    }

    async fn left_game(&self, client: &Client, payload: &[u8]) -> Result<LeftGameReply, HandlerError> {
        let user_id = numeric_user_id(client)?;
        let request: LeftGameRequest = decode(payload)?;
        self.leave(request.game_id, user_id).await
    }
}
