//! Grid coordinates for the tile board.
//!
//! Positions use signed `(row, col)` pairs so that callers driving the board
//! from touch gestures can pass anything, including coordinates that fall off
//! the edge. The board treats those as absent rather than faulting.
//!
//! Row 0 is the top of the board; gravity pulls tiles towards higher rows.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Orthogonal direction on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Towards row 0
    Up,
    /// Towards higher column indices
    Right,
    /// Towards higher row indices (the direction tiles fall)
    Down,
    /// Towards column 0
    Left,
}

impl Direction {
    /// All directions in clockwise order starting from Up
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    /// Row/column delta for one step in this direction
    pub const fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Right => (0, 1),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
        }
    }
}

/// A cell address on the board.
///
/// Equality and hashing are by value so positions work as set/map keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Position {
    /// Zero-based row, 0 is the top
    pub row: i32,
    /// Zero-based column, 0 is the left edge
    pub col: i32,
}

impl Position {
    /// Create a new position
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// The neighbouring position one step away in `direction`.
    ///
    /// Saturates at the `i32` limits; such positions are off any board anyway.
    pub const fn neighbor(&self, direction: Direction) -> Position {
        let (dr, dc) = direction.delta();
        Position::new(self.row.saturating_add(dr), self.col.saturating_add(dc))
    }

    /// The four orthogonal neighbours in clockwise order starting from Up
    pub fn neighbors(&self) -> [Position; 4] {
        Direction::ALL.map(|d| self.neighbor(d))
    }

    /// Manhattan (taxicab) distance to another position
    pub fn manhattan_distance(&self, other: &Position) -> u64 {
        u64::from(self.row.abs_diff(other.row)) + u64::from(self.col.abs_diff(other.col))
    }

    /// True when `other` shares an edge with this position.
    ///
    /// Diagonals are not adjacent, and neither is the position itself.
    pub fn is_adjacent(&self, other: &Position) -> bool {
        self.manhattan_distance(other) == 1
    }

    /// Row-major index into a `rows` x `cols` grid, if in range
    pub(crate) fn index(&self, rows: usize, cols: usize) -> Option<usize> {
        let row = usize::try_from(self.row).ok()?;
        let col = usize::try_from(self.col).ok()?;
        (row < rows && col < cols).then_some(row * cols + col)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}
