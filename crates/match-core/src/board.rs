//! Tile grid representation.
//!
//! This module contains:
//! - Tile kinds (the four fruit-like pieces) and tile identity
//! - The rectangular board grid
//! - Primitive, matching-agnostic mutations: swap, clear, gravity, refill
//!
//! Nothing here knows what a "match" is; see [`crate::engine`] for that.

use crate::position::Position;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of a playable piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    Apple,
    Mushroom,
    Carrot,
    Strawberry,
}

impl TileKind {
    /// All tile kinds
    pub const ALL: [TileKind; 4] = [
        TileKind::Apple,
        TileKind::Mushroom,
        TileKind::Carrot,
        TileKind::Strawberry,
    ];

    /// Pick a kind uniformly at random
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    /// Single-letter symbol used in text layouts
    pub fn symbol(&self) -> char {
        match self {
            TileKind::Apple => 'A',
            TileKind::Mushroom => 'M',
            TileKind::Carrot => 'C',
            TileKind::Strawberry => 'S',
        }
    }

    /// Parse a single-letter symbol
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol.to_ascii_uppercase() {
            'A' => Some(TileKind::Apple),
            'M' => Some(TileKind::Mushroom),
            'C' => Some(TileKind::Carrot),
            'S' => Some(TileKind::Strawberry),
            _ => None,
        }
    }
}

/// Opaque tile identity, unique within a board.
///
/// Front ends use it to animate "the same tile moved". Matching never looks
/// at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(pub u64);

/// A single piece on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Stable identity for the lifetime of the tile
    pub id: TileId,
    /// What the tile is; the only field matching compares
    pub kind: TileKind,
    /// Set when gravity or a refill moved the tile during the last resolution
    pub is_falling: bool,
    /// Set on tiles that are part of a detected match
    pub is_matched: bool,
}

impl Tile {
    /// Create a tile with cleared transient flags
    pub fn new(id: TileId, kind: TileKind) -> Self {
        Self {
            id,
            kind,
            is_falling: false,
            is_matched: false,
        }
    }
}

/// Errors from parsing a text layout
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("Layout has no rows")]
    EmptyLayout,

    #[error("Row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Unknown tile symbol '{0}'")]
    UnknownSymbol(char),
}

/// The tile grid.
///
/// Dimensions are fixed at construction. Every cell is either empty or holds
/// exactly one tile. Positions outside `[0, rows) x [0, cols)` read as absent
/// and writes to them are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    rows: usize,
    cols: usize,
    /// Row-major cells
    cells: Vec<Option<Tile>>,
    /// Next identity to hand out
    next_id: u64,
}

impl Board {
    /// Create a board with every cell empty
    pub fn empty(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![None; rows * cols],
            next_id: 0,
        }
    }

    /// Create a fully populated board with uniformly random tiles
    pub fn random<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Self {
        let mut board = Self::empty(rows, cols);
        board.fill_empty_tiles(rng);
        board.settle_flags();
        board
    }

    /// Build a board from a text layout, one string per row.
    ///
    /// Letters are tile symbols (`A`, `M`, `C`, `S`), `.` is an empty cell and
    /// whitespace is ignored.
    pub fn from_rows(layout: &[&str]) -> Result<Self, BoardError> {
        let parsed: Vec<Vec<char>> = layout
            .iter()
            .map(|line| line.chars().filter(|c| !c.is_whitespace()).collect())
            .collect();

        let cols = parsed.first().map(Vec::len).ok_or(BoardError::EmptyLayout)?;
        let mut board = Self::empty(parsed.len(), cols);

        for (row, symbols) in parsed.iter().enumerate() {
            if symbols.len() != cols {
                return Err(BoardError::RaggedRow {
                    row,
                    expected: cols,
                    found: symbols.len(),
                });
            }
            for (col, &symbol) in symbols.iter().enumerate() {
                if symbol == '.' {
                    continue;
                }
                let kind = TileKind::from_symbol(symbol).ok_or(BoardError::UnknownSymbol(symbol))?;
                let tile = board.spawn_tile(kind);
                board.cells[row * cols + col] = Some(tile);
            }
        }

        Ok(board)
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// All positions in row-major order
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.rows).flat_map(move |row| {
            (0..self.cols).map(move |col| Position::new(row as i32, col as i32))
        })
    }

    /// The tile at a position, or `None` if empty or out of range
    pub fn tile(&self, at: Position) -> Option<&Tile> {
        let idx = at.index(self.rows, self.cols)?;
        self.cells[idx].as_ref()
    }

    /// Kind of the tile at a position
    pub fn kind(&self, at: Position) -> Option<TileKind> {
        self.tile(at).map(|t| t.kind)
    }

    /// Overwrite a cell. Out-of-range positions are silently ignored.
    pub fn set_tile(&mut self, tile: Option<Tile>, at: Position) {
        if let Some(idx) = at.index(self.rows, self.cols) {
            self.cells[idx] = tile;
        }
    }

    /// Exchange the contents of two cells.
    ///
    /// No-op unless both positions are in range and hold a tile. Applying the
    /// same swap twice restores the original contents.
    pub fn swap(&mut self, a: Position, b: Position) {
        let (Some(ia), Some(ib)) = (
            a.index(self.rows, self.cols),
            b.index(self.rows, self.cols),
        ) else {
            return;
        };
        if self.cells[ia].is_some() && self.cells[ib].is_some() {
            self.cells.swap(ia, ib);
        }
    }

    /// Empty every given position
    pub fn clear_matches<'a, I>(&mut self, positions: I)
    where
        I: IntoIterator<Item = &'a Position>,
    {
        for &pos in positions {
            self.set_tile(None, pos);
        }
    }

    /// Flag the tiles at the given positions as matched
    pub fn mark_matched<'a, I>(&mut self, positions: I)
    where
        I: IntoIterator<Item = &'a Position>,
    {
        for pos in positions {
            if let Some(idx) = pos.index(self.rows, self.cols) {
                if let Some(tile) = self.cells[idx].as_mut() {
                    tile.is_matched = true;
                }
            }
        }
    }

    /// Apply gravity: in each column, slide tiles down over empty cells.
    ///
    /// Relative top-to-bottom order within a column is preserved and vacated
    /// cells at the top are left empty. Returns the number of tiles that moved.
    pub fn collapse_columns(&mut self) -> usize {
        let mut moved = 0;

        for col in 0..self.cols {
            // Lowest row that has not been filled yet
            let mut write = self.rows;
            for row in (0..self.rows).rev() {
                if let Some(mut tile) = self.cells[row * self.cols + col].take() {
                    write -= 1;
                    if write != row {
                        tile.is_falling = true;
                        moved += 1;
                    }
                    self.cells[write * self.cols + col] = Some(tile);
                }
            }
        }

        moved
    }

    /// Fill every empty cell with a fresh random tile.
    ///
    /// Returns how many tiles were created.
    pub fn fill_empty_tiles<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let mut created = 0;

        for idx in 0..self.cells.len() {
            if self.cells[idx].is_none() {
                let mut tile = self.spawn_tile(TileKind::random(rng));
                tile.is_falling = true;
                self.cells[idx] = Some(tile);
                created += 1;
            }
        }

        created
    }

    /// Clear the transient falling/matched flags on every tile
    pub fn settle_flags(&mut self) {
        for tile in self.cells.iter_mut().flatten() {
            tile.is_falling = false;
            tile.is_matched = false;
        }
    }

    /// Number of empty cells
    pub fn empty_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }

    /// Allocate a new tile with a fresh identity
    fn spawn_tile(&mut self, kind: TileKind) -> Tile {
        let id = TileId(self.next_id);
        self.next_id += 1;
        Tile::new(id, kind)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.rows {
            for col in 0..self.cols {
                let symbol = self.cells[row * self.cols + col]
                    .map(|t| t.kind.symbol())
                    .unwrap_or('.');
                write!(f, "{}", symbol)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
