//! Combo/chain score accumulator.
//!
//! The engine awards a flat amount per cleared tile. This module is the
//! richer layer a host can drive alongside it: each registered match is
//! multiplied by a combo and a chain factor, empty moves can be penalised,
//! and the best multipliers ever reached are remembered.
//!
//! It does not detect anything itself. The caller supplies tile counts and
//! combo/chain indices, typically read from the engine's [`MoveEvent`]s.
//!
//! [`MoveEvent`]: crate::actions::MoveEvent

use serde::{Deserialize, Serialize};

/// Tunable constants for [`MatchScoreSystem`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSystemConfig {
    /// Points per cleared tile before multipliers
    pub base_points_per_tile: u32,
    /// Penalty unit for a move that matched nothing
    pub move_penalty: u32,
    /// Ceiling on a single penalty
    pub max_penalty_per_move: u32,
}

impl Default for ScoreSystemConfig {
    fn default() -> Self {
        Self {
            base_points_per_tile: 10,
            move_penalty: 2,
            max_penalty_per_move: 20,
        }
    }
}

/// Score awarded for one match event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base_points: u32,
    pub combo_multiplier: u32,
    pub chain_multiplier: u32,
    pub total_points: u32,
    pub tiles_cleared: u32,
}

/// Running score with combo and chain multipliers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchScoreSystem {
    config: ScoreSystemConfig,
    total_score: u32,
    move_count: u32,
    last_breakdown: Option<ScoreBreakdown>,
    best_combo_multiplier: u32,
    best_chain_multiplier: u32,
}

impl MatchScoreSystem {
    pub fn new(config: ScoreSystemConfig) -> Self {
        Self {
            config,
            total_score: 0,
            move_count: 0,
            last_breakdown: None,
            best_combo_multiplier: 1,
            best_chain_multiplier: 1,
        }
    }

    pub fn config(&self) -> &ScoreSystemConfig {
        &self.config
    }

    pub fn total_score(&self) -> u32 {
        self.total_score
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    pub fn last_breakdown(&self) -> Option<&ScoreBreakdown> {
        self.last_breakdown.as_ref()
    }

    pub fn best_combo_multiplier(&self) -> u32 {
        self.best_combo_multiplier
    }

    pub fn best_chain_multiplier(&self) -> u32 {
        self.best_chain_multiplier
    }

    /// Count a move, matching or not
    pub fn register_move(&mut self) {
        self.move_count += 1;
    }

    /// Score one match event.
    ///
    /// Combo and chain indices below 1 count as 1.
    pub fn register_match(
        &mut self,
        tiles_cleared: u32,
        combo_index: i32,
        chain_index: i32,
    ) -> ScoreBreakdown {
        let combo_multiplier = combo_index.max(1).unsigned_abs();
        let chain_multiplier = chain_index.max(1).unsigned_abs();

        let base_points = tiles_cleared.saturating_mul(self.config.base_points_per_tile);
        let total_points = base_points
            .saturating_mul(combo_multiplier)
            .saturating_mul(chain_multiplier);

        self.total_score = self.total_score.saturating_add(total_points);
        self.best_combo_multiplier = self.best_combo_multiplier.max(combo_multiplier);
        self.best_chain_multiplier = self.best_chain_multiplier.max(chain_multiplier);

        let breakdown = ScoreBreakdown {
            base_points,
            combo_multiplier,
            chain_multiplier,
            total_points,
            tiles_cleared,
        };
        self.last_breakdown = Some(breakdown);
        breakdown
    }

    /// Deduct a penalty when a move matched nothing.
    ///
    /// The penalty grows by one unit every five moves, is capped at
    /// `max_penalty_per_move`, and never takes the total below zero.
    /// Returns the amount actually deducted.
    pub fn apply_move_penalty(&mut self, for_empty_move: bool) -> u32 {
        if !for_empty_move {
            return 0;
        }

        let penalty = self
            .config
            .move_penalty
            .saturating_mul((self.move_count / 5).max(1))
            .min(self.config.max_penalty_per_move);
        let deducted = penalty.min(self.total_score);
        self.total_score -= deducted;
        deducted
    }

    /// Back to a fresh state, keeping the configuration
    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }
}

impl Default for MatchScoreSystem {
    fn default() -> Self {
        Self::new(ScoreSystemConfig::default())
    }
}
