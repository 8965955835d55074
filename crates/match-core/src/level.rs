//! Level tiers: board size and target score per level number.

use serde::{Deserialize, Serialize};

/// Most stars a level can award
pub const MAX_STARS: u32 = 3;

/// Board dimensions and target score derived from a level number.
///
/// Every integer maps to some tier, so construction cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub level: i32,
    pub rows: usize,
    pub cols: usize,
    pub target_score: u32,
}

impl LevelConfig {
    /// Derive the configuration for a level
    pub fn for_level(level: i32) -> Self {
        let (rows, cols, target_score) = match level {
            i32::MIN..=9 => (6, 6, 300),
            10..=19 => (7, 6, 600),
            20..=29 => (7, 7, 900),
            _ => (8, 7, 1200),
        };

        Self {
            level,
            rows,
            cols,
            target_score,
        }
    }

    /// Whether a score clears the level
    pub fn is_complete(&self, score: u32) -> bool {
        score >= self.target_score
    }

    /// Stars earned for a score: one at the target, two at 1.5x, three at 2x
    pub fn stars_for(&self, score: u32) -> u32 {
        let score = u64::from(score);
        let target = u64::from(self.target_score);

        if score >= target * 2 {
            MAX_STARS
        } else if score * 2 >= target * 3 {
            2
        } else if score >= target {
            1
        } else {
            0
        }
    }
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self::for_level(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        let tiers = [
            (9, 6, 6, 300),
            (10, 7, 6, 600),
            (19, 7, 6, 600),
            (20, 7, 7, 900),
            (29, 7, 7, 900),
            (30, 8, 7, 1200),
        ];

        for (level, rows, cols, target) in tiers {
            let config = LevelConfig::for_level(level);
            assert_eq!(config.rows, rows, "rows for level {}", level);
            assert_eq!(config.cols, cols, "cols for level {}", level);
            assert_eq!(config.target_score, target, "target for level {}", level);
        }
    }

    #[test]
    fn test_every_integer_maps_to_a_tier() {
        for level in [i32::MIN, -5, 0, 1, i32::MAX] {
            let config = LevelConfig::for_level(level);
            assert_eq!(config.level, level);
            assert!(config.rows >= 6 && config.cols >= 6);
        }
        assert_eq!(LevelConfig::for_level(-5).target_score, 300);
        assert_eq!(LevelConfig::for_level(i32::MAX).target_score, 1200);
    }

    #[test]
    fn test_stars_for_score() {
        let config = LevelConfig::for_level(1);
        assert_eq!(config.stars_for(0), 0);
        assert_eq!(config.stars_for(299), 0);
        assert_eq!(config.stars_for(300), 1);
        assert_eq!(config.stars_for(449), 1);
        assert_eq!(config.stars_for(450), 2);
        assert_eq!(config.stars_for(600), 3);
        assert_eq!(config.stars_for(u32::MAX), 3);
        assert!(config.is_complete(300));
        assert!(!config.is_complete(290));
    }
}
