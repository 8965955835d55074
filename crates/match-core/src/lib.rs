//! Fruit Match - a tile-matching puzzle engine
//!
//! This crate provides the core game logic for Fruit Match, including:
//! - Grid coordinates and the tile board
//! - Match detection and cascade resolution
//! - Level tiers, combo/chain scoring and persisted progress
//!
//! # Architecture
//!
//! The engine is platform-agnostic and synchronous. It can be compiled to:
//! - Native Rust for server-side hosting
//! - WebAssembly for client-side play
//!
//! Randomness is always injected, so any game can be replayed from a seed.
//!
//! # Modules
//!
//! - [`position`]: Grid coordinates and adjacency
//! - [`board`]: Tiles and primitive grid mutations
//! - [`engine`]: Moves, match detection and cascades
//! - [`scoring`]: Combo/chain score accumulator
//! - [`level`]: Level tiers
//! - [`progress`]: Cross-session progress store
//! - [`bot`]: Move suggestions

pub mod actions;
pub mod board;
pub mod bot;
pub mod engine;
pub mod level;
pub mod position;
pub mod progress;
pub mod scoring;
#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use actions::{Axis, Move, MoveEvent};
pub use board::{Board, BoardError, Tile, TileId, TileKind};
pub use bot::{Bot, BotDifficulty};
pub use engine::{
    find_all_matches, find_runs, EngineConfig, EngineSnapshot, MatchEngine, MoveError,
    MoveOutcome, Run,
};
pub use level::LevelConfig;
pub use position::{Direction, Position};
pub use progress::{Progress, ProgressError, ProgressStore};
pub use scoring::{MatchScoreSystem, ScoreBreakdown, ScoreSystemConfig};
