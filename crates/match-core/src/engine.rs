//! Match engine: move validation, match detection and cascade resolution.
//!
//! The engine is the only place that knows what a "match" is. A move is a
//! tentative transaction: the swap is applied speculatively and rolled back
//! if it produces no match, so a rejected move never leaves a trace on the
//! board. An accepted move is resolved until the board is stable.

use crate::actions::{Axis, Move, MoveEvent};
use crate::board::{Board, Tile, TileKind};
use crate::level::LevelConfig;
use crate::position::{Direction, Position};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

/// Shortest run of identical tiles that counts as a match
pub const MIN_RUN_LENGTH: usize = 3;

/// Points per cleared tile unless configured otherwise
pub const DEFAULT_POINTS_PER_TILE: u32 = 10;

/// Cascade rounds resolved per move before giving up
pub const DEFAULT_MAX_CASCADE_ROUNDS: u32 = 64;

/// Scoring and safety constants for the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Points for each tile removed by a match
    pub points_per_tile: u32,
    /// Refills are random, so a cascade has no natural bound. Resolution
    /// stops after this many rounds even if matches remain.
    pub max_cascade_rounds: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            points_per_tile: DEFAULT_POINTS_PER_TILE,
            max_cascade_rounds: DEFAULT_MAX_CASCADE_ROUNDS,
        }
    }
}

/// Why a move was rejected. The board is unchanged in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum MoveError {
    #[error("Positions are not adjacent")]
    NotAdjacent,

    #[error("No tile at {0}")]
    EmptyCell(Position),

    #[error("Swap does not create a match")]
    NoMatch,
}

/// A maximal line of three or more identical tiles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub axis: Axis,
    pub kind: TileKind,
    pub cells: Vec<Position>,
}

/// Result of an accepted move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    /// The swap that was applied
    pub swap: Move,
    /// Points added to the engine score
    pub points: u32,
    /// Number of cascade rounds resolved
    pub rounds: u32,
    /// Whether resolution stopped at the round limit
    pub capped: bool,
    /// Everything that happened, in order
    pub events: Vec<MoveEvent>,
}

/// Serializable view of an engine for front ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub level: LevelConfig,
    pub score: u32,
    pub rows: usize,
    pub cols: usize,
    /// Row-major cells, row 0 at the top
    pub cells: Vec<Vec<Option<Tile>>>,
}

/// Totals from one call into the cascade loop
struct Cascade {
    points: u32,
    rounds: u32,
    capped: bool,
}

/// Find every maximal run of [`MIN_RUN_LENGTH`] or more identical tiles.
///
/// Rows are scanned left to right, then columns top to bottom. An empty cell
/// or a change of kind ends a run. A tile at a row/column intersection shows
/// up in both runs.
pub fn find_runs(board: &Board) -> Vec<Run> {
    let rows = board.rows() as i32;
    let cols = board.cols() as i32;
    let mut runs = Vec::new();

    for row in 0..rows {
        scan_line(board, Axis::Row, (0..cols).map(|col| Position::new(row, col)), &mut runs);
    }
    for col in 0..cols {
        scan_line(board, Axis::Column, (0..rows).map(|row| Position::new(row, col)), &mut runs);
    }

    runs
}

/// Every position that belongs to some match, each counted once
pub fn find_all_matches(board: &Board) -> HashSet<Position> {
    find_runs(board)
        .into_iter()
        .flat_map(|run| run.cells)
        .collect()
}

fn scan_line<I>(board: &Board, axis: Axis, line: I, runs: &mut Vec<Run>)
where
    I: Iterator<Item = Position>,
{
    let mut current: Vec<Position> = Vec::new();
    let mut current_kind: Option<TileKind> = None;

    for pos in line {
        match board.kind(pos) {
            Some(kind) if current_kind == Some(kind) => current.push(pos),
            kind => {
                flush_run(axis, current_kind, &mut current, runs);
                current_kind = kind;
                if kind.is_some() {
                    current.push(pos);
                }
            }
        }
    }

    flush_run(axis, current_kind, &mut current, runs);
}

fn flush_run(axis: Axis, kind: Option<TileKind>, current: &mut Vec<Position>, runs: &mut Vec<Run>) {
    match kind {
        Some(kind) if current.len() >= MIN_RUN_LENGTH => runs.push(Run {
            axis,
            kind,
            cells: std::mem::take(current),
        }),
        _ => current.clear(),
    }
}

/// Drives moves on a board it exclusively owns.
///
/// The random source is a type parameter so tests and replays can inject a
/// seeded generator.
#[derive(Debug, Clone)]
pub struct MatchEngine<R = StdRng> {
    level: LevelConfig,
    config: EngineConfig,
    board: Board,
    score: u32,
    rng: R,
}

impl MatchEngine<StdRng> {
    /// Create an engine for a level with an entropy-seeded generator
    pub fn new(level: LevelConfig) -> Self {
        Self::with_rng(level, EngineConfig::default(), StdRng::from_entropy())
    }

    /// Create an engine whose board and refills are reproducible from `seed`
    pub fn seeded(level: LevelConfig, seed: u64) -> Self {
        Self::with_rng(level, EngineConfig::default(), StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> MatchEngine<R> {
    /// Create an engine with a random board drawn from `rng`
    pub fn with_rng(level: LevelConfig, config: EngineConfig, mut rng: R) -> Self {
        let board = Board::random(level.rows, level.cols, &mut rng);
        Self::with_board(level, config, board, rng)
    }

    /// Create an engine around an existing board.
    ///
    /// The board keeps its own dimensions; `level` only supplies the target.
    pub fn with_board(level: LevelConfig, config: EngineConfig, board: Board, rng: R) -> Self {
        Self {
            level,
            config,
            board,
            score: 0,
            rng,
        }
    }

    pub fn level(&self) -> &LevelConfig {
        &self.level
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Points accumulated by accepted moves
    pub fn score(&self) -> u32 {
        self.score
    }

    /// The tile at a position, for rendering
    pub fn tile(&self, at: Position) -> Option<&Tile> {
        self.board.tile(at)
    }

    /// Whether the level target has been reached
    pub fn is_level_complete(&self) -> bool {
        self.level.is_complete(self.score)
    }

    /// Attempt a move, reporting only whether it was accepted
    pub fn perform_move(&mut self, from: Position, to: Position) -> bool {
        self.try_move(from, to).is_ok()
    }

    /// Attempt a move.
    ///
    /// On error the board and score are exactly as before the call. On
    /// success the board holds no matches (unless the cascade hit the round
    /// limit) and the points were added to the score.
    pub fn try_move(&mut self, from: Position, to: Position) -> Result<MoveOutcome, MoveError> {
        let swap = Move::new(from, to);
        if !swap.is_adjacent() {
            return Err(MoveError::NotAdjacent);
        }
        for pos in [from, to] {
            if self.board.tile(pos).is_none() {
                return Err(MoveError::EmptyCell(pos));
            }
        }

        self.board.swap(from, to);
        if find_runs(&self.board).is_empty() {
            self.board.swap(from, to);
            debug!("Rejected swap {} <-> {}: no match", from, to);
            return Err(MoveError::NoMatch);
        }

        self.board.settle_flags();
        let mut events = vec![MoveEvent::Swapped { from, to }];
        let cascade = self.run_cascade(&mut events);
        self.score = self.score.saturating_add(cascade.points);

        debug!(
            "Move {} <-> {} scored {} over {} rounds (total {})",
            from, to, cascade.points, cascade.rounds, self.score
        );

        Ok(MoveOutcome {
            swap,
            points: cascade.points,
            rounds: cascade.rounds,
            capped: cascade.capped,
            events,
        })
    }

    /// Resolve whatever matches are on the board until it is stable.
    ///
    /// Returns the points earned. The engine score is not touched; moves add
    /// their own points.
    pub fn resolve_matches(&mut self) -> u32 {
        let mut events = Vec::new();
        self.run_cascade(&mut events).points
    }

    /// Every position currently part of a match
    pub fn find_all_matches(&self) -> HashSet<Position> {
        find_all_matches(&self.board)
    }

    /// Flag tiles that currently form matches without removing them.
    ///
    /// Returns the number of tiles flagged.
    pub fn mark_pending_matches(&mut self) -> usize {
        let matches = find_all_matches(&self.board);
        self.board.mark_matched(&matches);
        matches.len()
    }

    /// Every adjacent swap the engine would accept right now
    pub fn available_moves(&self) -> Vec<Move> {
        let mut scratch = self.board.clone();
        let mut moves = Vec::new();

        for pos in self.board.positions() {
            for direction in [Direction::Right, Direction::Down] {
                let other = pos.neighbor(direction);
                if scratch.tile(pos).is_none() || scratch.tile(other).is_none() {
                    continue;
                }
                scratch.swap(pos, other);
                if !find_runs(&scratch).is_empty() {
                    moves.push(Move::new(pos, other));
                }
                scratch.swap(pos, other);
            }
        }

        moves
    }

    /// Whether any accepted move exists
    pub fn has_available_moves(&self) -> bool {
        !self.available_moves().is_empty()
    }

    /// Serializable view of the current state
    pub fn snapshot(&self) -> EngineSnapshot {
        let cols = self.board.cols() as i32;
        let cells = (0..self.board.rows() as i32)
            .map(|row| {
                (0..cols)
                    .map(|col| self.board.tile(Position::new(row, col)).copied())
                    .collect()
            })
            .collect();

        EngineSnapshot {
            level: self.level,
            score: self.score,
            rows: self.board.rows(),
            cols: self.board.cols(),
            cells,
        }
    }

    /// Clear, collapse and refill until no matches remain or the round limit
    /// is reached
    fn run_cascade(&mut self, events: &mut Vec<MoveEvent>) -> Cascade {
        let mut points = 0u32;
        let mut round = 0u32;
        let mut capped = false;

        loop {
            let runs = find_runs(&self.board);
            if runs.is_empty() {
                break;
            }
            if round >= self.config.max_cascade_rounds {
                warn!(
                    "Cascade stopped after {} rounds with {} runs unresolved",
                    round,
                    runs.len()
                );
                events.push(MoveEvent::CascadeCapped { rounds: round });
                capped = true;
                break;
            }
            round += 1;

            let matched: HashSet<Position> = runs
                .iter()
                .flat_map(|run| run.cells.iter().copied())
                .collect();
            let gained = (matched.len() as u32).saturating_mul(self.config.points_per_tile);
            points = points.saturating_add(gained);

            self.board.clear_matches(&matched);
            let tiles_moved = self.board.collapse_columns();
            let tiles_created = self.board.fill_empty_tiles(&mut self.rng);

            let mut positions: Vec<Position> = matched.into_iter().collect();
            positions.sort();
            events.push(MoveEvent::TilesCleared {
                round,
                positions,
                runs: runs.len() as u32,
                points: gained,
            });
            events.push(MoveEvent::ColumnsCollapsed {
                round,
                tiles_moved: tiles_moved as u32,
            });
            events.push(MoveEvent::TilesRefilled {
                round,
                tiles_created: tiles_created as u32,
            });
        }

        Cascade {
            points,
            rounds: round,
            capped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pos(row: i32, col: i32) -> Position {
        Position::new(row, col)
    }

    fn engine_with(layout: &[&str], seed: u64) -> MatchEngine {
        let board = Board::from_rows(layout).unwrap();
        MatchEngine::with_board(
            LevelConfig::for_level(1),
            EngineConfig::default(),
            board,
            StdRng::seed_from_u64(seed),
        )
    }

    /// No runs anywhere; every anti-diagonal holds one kind
    const STABLE: [&str; 6] = [
        "AMCSAM",
        "MCSAMC",
        "CSAMCS",
        "SAMCSA",
        "AMCSAM",
        "MCSAMC",
    ];

    /// Swapping (0,2) and (1,2) completes the top row
    const ONE_SWAP: [&str; 4] = ["AAMC", "CSAS", "MCSM", "SMCA"];

    #[test]
    fn test_run_of_two_is_not_a_match() {
        let board = Board::from_rows(&["AAMM", "CSCS"]).unwrap();
        assert!(find_runs(&board).is_empty());
    }

    #[test]
    fn test_run_of_five_is_one_run() {
        let board = Board::from_rows(&["AAAAA", "MCSMC"]).unwrap();
        let runs = find_runs(&board);

        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].axis, Axis::Row);
        assert_eq!(runs[0].kind, TileKind::Apple);
        assert_eq!(runs[0].cells, (0..5).map(|c| pos(0, c)).collect::<Vec<_>>());
        assert_eq!(find_all_matches(&board).len(), 5);
    }

    #[test]
    fn test_intersection_counts_once() {
        let board = Board::from_rows(&[
            "AAAM",
            "ACSC",
            "AMCS",
        ])
        .unwrap();

        let runs = find_runs(&board);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].axis, Axis::Row);
        assert_eq!(runs[1].axis, Axis::Column);

        let matches = find_all_matches(&board);
        assert_eq!(matches.len(), 5);
        assert!(matches.contains(&pos(0, 0)));
    }

    #[test]
    fn test_empty_cell_breaks_run() {
        let board = Board::from_rows(&["AA.AA", "CCCMS"]).unwrap();
        let matches = find_all_matches(&board);

        let expected: HashSet<Position> = [pos(1, 0), pos(1, 1), pos(1, 2)].into_iter().collect();
        assert_eq!(matches, expected);
    }

    #[test]
    fn test_vertical_runs_and_trailing_runs() {
        let board = Board::from_rows(&["MA", "CS", "CA", "CA"]).unwrap();
        let runs = find_runs(&board);

        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].axis, Axis::Column);
        assert_eq!(runs[0].cells, vec![pos(1, 0), pos(2, 0), pos(3, 0)]);
    }

    #[test]
    fn test_matching_ignores_identity() {
        let mut board = Board::from_rows(&["AMA", "CSC"]).unwrap();
        let apple = *board.tile(pos(0, 0)).unwrap();
        // Same identity twice is still just two apples with a mushroom between
        board.set_tile(Some(apple), pos(0, 2));
        assert!(find_runs(&board).is_empty());

        board.set_tile(Some(Tile::new(apple.id, TileKind::Apple)), pos(0, 1));
        assert_eq!(find_all_matches(&board).len(), 3);
    }

    #[test]
    fn test_non_adjacent_move_is_rejected_untouched() {
        let mut engine = engine_with(&STABLE, 1);
        let before = engine.board().clone();

        for (from, to) in [
            (pos(0, 0), pos(1, 1)),
            (pos(0, 0), pos(0, 2)),
            (pos(3, 3), pos(3, 3)),
            (pos(5, 5), pos(0, 0)),
        ] {
            assert_eq!(engine.try_move(from, to), Err(MoveError::NotAdjacent));
            assert!(!engine.perform_move(from, to));
        }

        assert_eq!(engine.board(), &before);
        assert_eq!(engine.score(), 0);
    }

    #[test]
    fn test_extreme_positions_are_rejected() {
        let mut engine = MatchEngine::seeded(LevelConfig::for_level(1), 1);
        let before = engine.board().clone();

        let far = (pos(i32::MIN, 0), pos(i32::MAX, 1));
        assert_eq!(engine.try_move(far.0, far.1), Err(MoveError::NotAdjacent));
        assert!(!engine.perform_move(far.1, far.0));

        let edge = (pos(i32::MAX, 0), pos(i32::MAX - 1, 0));
        assert_eq!(engine.try_move(edge.0, edge.1), Err(MoveError::EmptyCell(edge.0)));

        assert_eq!(engine.board(), &before);
        assert_eq!(engine.score(), 0);
    }

    #[test]
    fn test_move_without_match_rolls_back() {
        let mut engine = engine_with(&STABLE, 1);
        let before = engine.board().clone();

        assert_eq!(engine.try_move(pos(0, 0), pos(0, 1)), Err(MoveError::NoMatch));
        assert_eq!(engine.board(), &before);
        assert_eq!(engine.score(), 0);
    }

    #[test]
    fn test_move_off_board_or_onto_empty_is_rejected() {
        let mut engine = engine_with(&["A.M", "CSC"], 1);
        let before = engine.board().clone();

        assert_eq!(engine.try_move(pos(0, 0), pos(0, 1)), Err(MoveError::EmptyCell(pos(0, 1))));
        assert_eq!(engine.try_move(pos(0, 0), pos(-1, 0)), Err(MoveError::EmptyCell(pos(-1, 0))));
        assert_eq!(engine.board(), &before);
    }

    #[test]
    fn test_successful_move_settles_board() {
        let mut engine = engine_with(&ONE_SWAP, 17);

        let outcome = engine.try_move(pos(0, 2), pos(1, 2)).unwrap();

        assert!(outcome.points >= 30);
        assert!(outcome.rounds >= 1);
        assert!(!outcome.capped);
        assert_eq!(engine.score(), outcome.points);
        assert!(engine.find_all_matches().is_empty());
        assert_eq!(engine.board().empty_count(), 0);
        assert_eq!(
            outcome.events[0],
            MoveEvent::Swapped {
                from: pos(0, 2),
                to: pos(1, 2)
            }
        );
        assert!(matches!(
            &outcome.events[1],
            MoveEvent::TilesCleared { round: 1, runs: 1, points: 30, positions }
                if positions == &vec![pos(0, 0), pos(0, 1), pos(0, 2)]
        ));
    }

    #[test]
    fn test_gravity_cascade_resolves_extra_round() {
        // Clearing row 1 drops the top M onto two more Ms in column 0
        let layout = ["MSC", "ACA", "MAS", "MCA"];
        let mut engine = engine_with(&layout, 3);

        let outcome = engine.try_move(pos(1, 1), pos(2, 1)).unwrap();

        assert!(outcome.rounds >= 2);
        assert!(outcome.points >= 60);
        assert!(engine.find_all_matches().is_empty());
    }

    #[test]
    fn test_cascade_cap_is_a_soft_stop() {
        let layout = ["MSC", "ACA", "MAS", "MCA"];
        let board = Board::from_rows(&layout).unwrap();
        let mut engine = MatchEngine::with_board(
            LevelConfig::for_level(1),
            EngineConfig {
                max_cascade_rounds: 1,
                ..Default::default()
            },
            board,
            StdRng::seed_from_u64(3),
        );

        let outcome = engine.try_move(pos(1, 1), pos(2, 1)).unwrap();

        assert!(outcome.capped);
        assert_eq!(outcome.rounds, 1);
        assert_eq!(outcome.points, 30);
        assert_eq!(outcome.events.last(), Some(&MoveEvent::CascadeCapped { rounds: 1 }));
        assert!(!engine.find_all_matches().is_empty());
    }

    #[test]
    fn test_same_seed_same_outcome() {
        let mut a = engine_with(&ONE_SWAP, 99);
        let mut b = engine_with(&ONE_SWAP, 99);

        let outcome_a = a.try_move(pos(0, 2), pos(1, 2)).unwrap();
        let outcome_b = b.try_move(pos(0, 2), pos(1, 2)).unwrap();

        assert_eq!(outcome_a, outcome_b);
        assert_eq!(a.board(), b.board());
    }

    #[test]
    fn test_resolve_matches_does_not_touch_score() {
        let mut engine = engine_with(&["AAAM", "CSCS", "MCMC"], 4);

        let points = engine.resolve_matches();

        assert!(points >= 30);
        assert_eq!(engine.score(), 0);
        assert!(engine.find_all_matches().is_empty());
    }

    #[test]
    fn test_available_moves() {
        let engine = engine_with(&ONE_SWAP, 1);
        let moves = engine.available_moves();

        assert!(moves.contains(&Move::new(pos(0, 2), pos(1, 2))));
        for mv in &moves {
            let mut trial = engine.clone();
            assert!(trial.perform_move(mv.from, mv.to), "{:?} should be accepted", mv);
        }
        assert!(engine.has_available_moves());
    }

    #[test]
    fn test_stable_layout_has_no_moves() {
        let engine = engine_with(&STABLE, 1);
        assert!(engine.find_all_matches().is_empty());
        assert!(!engine.has_available_moves());
    }

    #[test]
    fn test_mark_pending_matches() {
        let mut engine = engine_with(&["AAAM", "CSCS"], 1);
        assert_eq!(engine.mark_pending_matches(), 3);
        assert!(engine.tile(pos(0, 1)).unwrap().is_matched);
        assert!(!engine.tile(pos(0, 3)).unwrap().is_matched);
    }

    #[test]
    fn test_snapshot_matches_board() {
        let engine = MatchEngine::seeded(LevelConfig::for_level(12), 8);
        let snapshot = engine.snapshot();

        assert_eq!(snapshot.rows, 7);
        assert_eq!(snapshot.cols, 6);
        assert_eq!(snapshot.cells.len(), 7);
        assert!(snapshot.cells.iter().all(|row| row.len() == 6));
        assert_eq!(snapshot.cells[3][2].as_ref(), engine.tile(pos(3, 2)));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["level"]["target_score"], 600);
    }
}
