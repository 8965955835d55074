//! Moves a player can make and the events a resolved move produces.
//!
//! Events are returned from [`MatchEngine::try_move`] in the order they
//! happened, so a front end can replay a cascade step by step without the
//! engine knowing anything about animation.
//!
//! [`MatchEngine::try_move`]: crate::engine::MatchEngine::try_move

use crate::position::Position;
use serde::{Deserialize, Serialize};

/// A request to swap two cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from: Position,
    pub to: Position,
}

impl Move {
    pub fn new(from: Position, to: Position) -> Self {
        Self { from, to }
    }

    /// Whether the two cells share an edge
    pub fn is_adjacent(&self) -> bool {
        self.from.is_adjacent(&self.to)
    }
}

/// Orientation of a run of matching tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    Row,
    Column,
}

/// Events that occur while a move is applied and resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveEvent {
    /// The two tiles were swapped
    Swapped { from: Position, to: Position },

    /// Matched tiles were removed in one cascade round (1-based)
    TilesCleared {
        round: u32,
        positions: Vec<Position>,
        /// Number of distinct runs that made up this clear
        runs: u32,
        points: u32,
    },

    /// Gravity pulled tiles down into the gaps
    ColumnsCollapsed { round: u32, tiles_moved: u32 },

    /// Empty cells were filled with new tiles
    TilesRefilled { round: u32, tiles_created: u32 },

    /// Resolution stopped at the round limit with matches still on the board
    CascadeCapped { rounds: u32 },
}
