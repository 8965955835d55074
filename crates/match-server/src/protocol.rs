//! WebSocket protocol messages for the match server.

use match_core::{EngineSnapshot, Move, MoveEvent, Position};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Start a new session at a level
    StartSession {
        player_name: String,
        level: i32,
        /// Fixed seed for a reproducible board
        #[serde(default)]
        seed: Option<u64>,
    },

    /// Follow someone else's session
    WatchSession { session_id: Uuid },

    /// Leave the current session
    LeaveSession,

    /// Swap two tiles (owner only)
    Move { from: Position, to: Position },

    /// Ask for a suggested move
    RequestHint,

    /// Start the current level over with a fresh board (owner only)
    RestartLevel,

    /// Request session list
    ListSessions,

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome message with assigned player ID
    Welcome { player_id: Uuid },

    /// Session created and owned by the recipient
    SessionStarted { session: SessionInfo },

    /// Now watching a session
    Watching { session: SessionInfo },

    /// Left session successfully
    LeftSession,

    /// Session metadata changed (spectators, status)
    SessionUpdated { session: SessionInfo },

    /// Full board and scores
    BoardState {
        session_id: Uuid,
        state: EngineSnapshot,
        bonus_score: u32,
    },

    /// Outcome of a move request
    MoveResult {
        accepted: bool,
        points: u32,
        events: Vec<MoveEvent>,
        error: Option<String>,
    },

    /// Suggested move, if any exists
    Hint { suggestion: Option<Move> },

    /// The board has no accepted move left
    NoMovesLeft,

    /// The level target was reached
    LevelComplete { level: i32, stars: u32, score: u32 },

    /// List of active sessions
    SessionList { sessions: Vec<SessionInfo> },

    /// Error occurred
    Error { message: String },

    /// Pong response
    Pong,
}

/// Session information for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub owner_name: String,
    pub level: i32,
    pub score: u32,
    pub target_score: u32,
    pub spectators: usize,
    pub status: SessionStatus,
}

/// Session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Playing,
    /// No accepted move remains
    Stuck,
    Complete,
}
