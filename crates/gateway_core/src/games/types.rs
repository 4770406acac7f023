//! Request and reply payloads for the game RPC methods.

use crate::error::HandlerError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_PLAYERS: u32 = 2;
pub const MIN_PLAYERS: u32 = 2;
pub const MAX_PLAYERS: u32 = 16;

/// Handler error codes. Kept outside the gateway's own code range.
pub const CODE_INVALID_PARAMS: u32 = 4001;
pub const CODE_NOT_A_MEMBER: u32 = 4003;
pub const CODE_GAME_NOT_FOUND: u32 = 4004;
pub const CODE_GAME_FULL: u32 = 4009;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindGameRequest {
    /// Seat count used if no open game exists and a new one is created
    #[serde(default)]
    pub max_players: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGameRequest {
    #[serde(default)]
    pub max_players: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinGameRequest {
    pub game_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeftGameRequest {
    pub game_id: i64,
}

/// Session bookkeeping returned by find/create/join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    pub game_id: i64,
    pub owner_id: i64,
    pub players: Vec<i64>,
    pub max_players: u32,
    /// Channel members of this game may subscribe to
    pub channel: String,
}

impl GameSummary {
    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeftGameReply {
    pub game_id: i64,
    /// Players still seated after the caller left
    pub remaining_players: Vec<i64>,
    /// True when the caller was the last player and the game was removed
    pub closed: bool,
}

pub fn invalid_params(message: impl Into<String>) -> HandlerError {
    HandlerError::new(CODE_INVALID_PARAMS, message)
}

pub fn game_not_found(game_id: i64) -> HandlerError {
    HandlerError::new(CODE_GAME_NOT_FOUND, format!("game {game_id} not found"))
}

pub fn game_full(game_id: i64) -> HandlerError {
    HandlerError::new(CODE_GAME_FULL, format!("game {game_id} is full"))
}

pub fn not_a_member(game_id: i64) -> HandlerError {
    HandlerError::new(CODE_NOT_A_MEMBER, format!("not a member of game {game_id}"))
}

/// Decodes a required JSON payload.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, HandlerError> {
    serde_json::from_slice(payload).map_err(|e| invalid_params(format!("invalid payload: {e}")))
}

/// Decodes an optional JSON payload; an empty body or `null` yields the default.
pub fn decode_or_default<T: DeserializeOwned + Default>(payload: &[u8]) -> Result<T, HandlerError> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    let value: Option<T> = decode(payload)?;
    Ok(value.unwrap_or_default())
}
