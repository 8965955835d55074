//! Move suggestions and automated play.
//!
//! Difficulty levels:
//! - Easy: a random accepted move
//! - Medium: the move with the largest immediate clear
//! - Hard: simulates each move through its full cascade and keeps the best

use crate::actions::Move;
use crate::engine::{find_all_matches, MatchEngine};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Bot difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotDifficulty {
    Easy,
    Medium,
    Hard,
}

/// Picks moves for a hint button or a self-playing demo
pub struct Bot {
    pub difficulty: BotDifficulty,
    rng: StdRng,
}

impl Bot {
    pub fn new(difficulty: BotDifficulty) -> Self {
        Self {
            difficulty,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(difficulty: BotDifficulty, seed: u64) -> Self {
        Self {
            difficulty,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Choose a move, or `None` when the board has no accepted move
    pub fn choose_move<R: Rng + Clone>(&mut self, engine: &MatchEngine<R>) -> Option<Move> {
        let moves = engine.available_moves();
        if moves.is_empty() {
            return None;
        }

        match self.difficulty {
            BotDifficulty::Easy => moves.choose(&mut self.rng).copied(),
            BotDifficulty::Medium => Self::choose_medium(engine, &moves),
            BotDifficulty::Hard => Self::choose_hard(engine, &moves),
        }
    }

    /// Largest first clear; ties keep the earliest move
    fn choose_medium<R: Rng>(engine: &MatchEngine<R>, moves: &[Move]) -> Option<Move> {
        let mut scratch = engine.board().clone();
        let mut best: Option<(usize, Move)> = None;

        for mv in moves {
            scratch.swap(mv.from, mv.to);
            let cleared = find_all_matches(&scratch).len();
            scratch.swap(mv.from, mv.to);

            if best.map_or(true, |(best_cleared, _)| cleared > best_cleared) {
                best = Some((cleared, *mv));
            }
        }

        best.map(|(_, mv)| mv)
    }

    /// Most points after the full cascade on a copy of the engine
    fn choose_hard<R: Rng + Clone>(engine: &MatchEngine<R>, moves: &[Move]) -> Option<Move> {
        let mut best: Option<(u32, Move)> = None;

        for mv in moves {
            let mut trial = engine.clone();
            let points = match trial.try_move(mv.from, mv.to) {
                Ok(outcome) => outcome.points,
                Err(_) => continue,
            };

            if best.map_or(true, |(best_points, _)| points > best_points) {
                best = Some((points, *mv));
            }
        }

        best.map(|(_, mv)| mv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::engine::EngineConfig;
    use crate::level::LevelConfig;
    use crate::position::Position;

    fn engine_with(layout: &[&str]) -> MatchEngine {
        MatchEngine::with_board(
            LevelConfig::for_level(1),
            EngineConfig::default(),
            Board::from_rows(layout).unwrap(),
            StdRng::seed_from_u64(5),
        )
    }

    #[test]
    fn test_every_difficulty_picks_an_accepted_move() {
        let engine = MatchEngine::seeded(LevelConfig::for_level(1), 21);
        assert!(engine.has_available_moves());

        for difficulty in [BotDifficulty::Easy, BotDifficulty::Medium, BotDifficulty::Hard] {
            let mut bot = Bot::with_seed(difficulty, 1);
            let mv = bot.choose_move(&engine).expect("a move should be found");
            let mut trial = engine.clone();
            assert!(trial.perform_move(mv.from, mv.to), "{:?} chose a rejected move", difficulty);
        }
    }

    #[test]
    fn test_no_moves_means_no_choice() {
        let engine = engine_with(&["AMCS", "MCSA", "CSAM", "SAMC"]);
        let mut bot = Bot::with_seed(BotDifficulty::Hard, 1);
        assert_eq!(bot.choose_move(&engine), None);
    }

    #[test]
    fn test_medium_prefers_bigger_clear() {
        // (0,2)/(1,2) lines up five As; (1,4)/(2,4) only three Ss
        let engine = engine_with(&[
            "AACAAM",
            "SMASCS",
            "MCSMSC",
        ]);
        let mut bot = Bot::with_seed(BotDifficulty::Medium, 1);

        let mv = bot.choose_move(&engine).unwrap();

        assert_eq!(mv, Move::new(Position::new(0, 2), Position::new(1, 2)));
    }

    #[test]
    fn test_self_play_keeps_board_settled() {
        let mut engine = MatchEngine::seeded(LevelConfig::for_level(1), 2024);
        let mut bot = Bot::with_seed(BotDifficulty::Hard, 2024);
        let mut moves_made = 0;

        for _ in 0..200 {
            if engine.is_level_complete() {
                break;
            }
            match bot.choose_move(&engine) {
                Some(mv) => {
                    assert!(engine.perform_move(mv.from, mv.to));
                    moves_made += 1;
                }
                None => break,
            }
        }

        assert!(engine.score() >= 30 * moves_made);
        if moves_made > 0 {
            assert!(engine.find_all_matches().is_empty());
        }
    }
}
