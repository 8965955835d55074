//! Single-player game sessions with optional spectators.

use match_core::{
    Bot, BotDifficulty, EngineSnapshot, LevelConfig, MatchEngine, MatchScoreSystem, Move,
    MoveError, MoveEvent, MoveOutcome, Position,
};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

use crate::protocol::{SessionInfo, SessionStatus};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Only the session owner can do that")]
    NotOwner,

    #[error("Player not in session")]
    PlayerNotInSession,

    #[error("Already in this session")]
    AlreadyJoined,

    #[error("Level already complete")]
    LevelComplete,

    #[error("Invalid move: {0}")]
    InvalidMove(#[from] MoveError),
}

/// Final numbers for a completed level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelResult {
    pub level: i32,
    pub stars: u32,
    pub score: u32,
}

/// What an accepted move changed
#[derive(Debug, Clone)]
pub struct MoveReport {
    pub outcome: MoveOutcome,
    /// Set when this move reached the level target
    pub completed: Option<LevelResult>,
    /// Set when the board has no accepted move left
    pub stuck: bool,
}

/// A level being played by one owner, watched by any number of spectators.
pub struct GameSession {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_name: String,
    pub status: SessionStatus,
    pub spectators: HashSet<Uuid>,
    engine: MatchEngine,
    scores: MatchScoreSystem,
    seed: Option<u64>,
}

impl GameSession {
    pub fn new(id: Uuid, owner_id: Uuid, owner_name: String, level: i32, seed: Option<u64>) -> Self {
        let mut session = Self {
            id,
            owner_id,
            owner_name,
            status: SessionStatus::Playing,
            spectators: HashSet::new(),
            engine: Self::build_engine(LevelConfig::for_level(level), seed),
            scores: MatchScoreSystem::default(),
            seed,
        };
        session.refresh_status();
        session
    }

    fn build_engine(level: LevelConfig, seed: Option<u64>) -> MatchEngine {
        let mut engine = match seed {
            Some(seed) => MatchEngine::seeded(level, seed),
            None => MatchEngine::new(level),
        };
        // Random boards can start with matches; flag them for the client
        engine.mark_pending_matches();
        engine
    }

    pub fn level(&self) -> &LevelConfig {
        self.engine.level()
    }

    pub fn score(&self) -> u32 {
        self.engine.score()
    }

    pub fn bonus_score(&self) -> u32 {
        self.scores.total_score()
    }

    pub fn is_member(&self, player_id: Uuid) -> bool {
        player_id == self.owner_id || self.spectators.contains(&player_id)
    }

    /// Everyone who should receive session broadcasts
    pub fn members(&self) -> impl Iterator<Item = Uuid> + '_ {
        std::iter::once(self.owner_id).chain(self.spectators.iter().copied())
    }

    pub fn add_spectator(&mut self, player_id: Uuid) -> Result<(), SessionError> {
        if self.is_member(player_id) {
            return Err(SessionError::AlreadyJoined);
        }
        self.spectators.insert(player_id);
        Ok(())
    }

    /// Remove a player. Returns true when the owner left and the session
    /// should close.
    pub fn remove_player(&mut self, player_id: Uuid) -> Result<bool, SessionError> {
        if player_id == self.owner_id {
            return Ok(true);
        }
        if !self.spectators.remove(&player_id) {
            return Err(SessionError::PlayerNotInSession);
        }
        Ok(false)
    }

    /// Apply a move for the owner.
    ///
    /// The engine and the bonus score system see the move as one step; a
    /// swap that matched nothing costs a bonus-score penalty.
    pub fn apply_move(
        &mut self,
        player_id: Uuid,
        from: Position,
        to: Position,
    ) -> Result<MoveReport, SessionError> {
        if player_id != self.owner_id {
            return Err(SessionError::NotOwner);
        }
        if self.status == SessionStatus::Complete {
            return Err(SessionError::LevelComplete);
        }

        self.scores.register_move();
        let outcome = match self.engine.try_move(from, to) {
            Ok(outcome) => outcome,
            Err(e) => {
                if e == MoveError::NoMatch {
                    self.scores.apply_move_penalty(true);
                }
                return Err(e.into());
            }
        };

        for event in &outcome.events {
            if let MoveEvent::TilesCleared {
                round,
                positions,
                runs,
                ..
            } = event
            {
                self.scores
                    .register_match(positions.len() as u32, *runs as i32, *round as i32);
            }
        }

        self.refresh_status();
        let completed = (self.status == SessionStatus::Complete).then(|| self.level_result());

        Ok(MoveReport {
            outcome,
            completed,
            stuck: self.status == SessionStatus::Stuck,
        })
    }

    /// Suggest a move for whoever asks
    pub fn hint(&self, player_id: Uuid) -> Result<Option<Move>, SessionError> {
        if !self.is_member(player_id) {
            return Err(SessionError::PlayerNotInSession);
        }
        let mut bot = Bot::new(BotDifficulty::Medium);
        Ok(bot.choose_move(&self.engine))
    }

    /// Start the level over. A seeded session gets the same board again.
    pub fn restart(&mut self, player_id: Uuid) -> Result<(), SessionError> {
        if player_id != self.owner_id {
            return Err(SessionError::NotOwner);
        }
        self.engine = Self::build_engine(*self.engine.level(), self.seed);
        self.scores.reset();
        self.status = SessionStatus::Playing;
        self.refresh_status();
        Ok(())
    }

    pub fn level_result(&self) -> LevelResult {
        let level = self.engine.level();
        LevelResult {
            level: level.level,
            stars: level.stars_for(self.engine.score()),
            score: self.engine.score(),
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.engine.snapshot()
    }

    pub fn to_info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            owner_name: self.owner_name.clone(),
            level: self.engine.level().level,
            score: self.engine.score(),
            target_score: self.engine.level().target_score,
            spectators: self.spectators.len(),
            status: self.status,
        }
    }

    fn refresh_status(&mut self) {
        self.status = if self.engine.is_level_complete() {
            SessionStatus::Complete
        } else if !self.engine.has_available_moves() {
            SessionStatus::Stuck
        } else {
            SessionStatus::Playing
        };
    }
}
