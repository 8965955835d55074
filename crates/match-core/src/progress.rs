//! Cross-session progress: highest level reached and lifetime totals.
//!
//! The record is persisted as pretty-printed JSON. A store opened without a
//! path keeps everything in memory.

use crate::level::MAX_STARS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from persisting progress
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("Failed to write progress file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode progress: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Summary statistics carried between sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub highest_level: i32,
    pub total_stars: u32,
    pub total_score: u64,
    /// Seconds since the Unix epoch
    pub last_played_unix: u64,
}

impl Progress {
    fn fresh() -> Self {
        Self {
            highest_level: 1,
            total_stars: 0,
            total_score: 0,
            last_played_unix: now_unix(),
        }
    }
}

/// Loads, updates and saves a [`Progress`] record
#[derive(Debug)]
pub struct ProgressStore {
    progress: Progress,
    path: Option<PathBuf>,
}

impl ProgressStore {
    /// A store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            progress: Progress::fresh(),
            path: None,
        }
    }

    /// Open the store at `path`.
    ///
    /// A missing file starts fresh. So does an unreadable or corrupt one,
    /// with a warning; it is overwritten on the next save.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let progress = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(progress) => progress,
                Err(e) => {
                    warn!("Ignoring corrupt progress file {}: {}", path.display(), e);
                    Progress::fresh()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Progress::fresh(),
            Err(e) => {
                warn!("Cannot read progress file {}: {}", path.display(), e);
                Progress::fresh()
            }
        };

        Self {
            progress,
            path: Some(path),
        }
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a finished level and save.
    ///
    /// Stars are clamped to `0..=3` and negative scores count as zero.
    pub fn register_level_completion(
        &mut self,
        level: i32,
        stars: i32,
        score: i64,
    ) -> Result<(), ProgressError> {
        let stars = stars.clamp(0, MAX_STARS as i32).unsigned_abs();
        let score = score.max(0).unsigned_abs();

        self.progress.highest_level = self.progress.highest_level.max(level);
        self.progress.total_stars = self.progress.total_stars.saturating_add(stars);
        self.progress.total_score = self.progress.total_score.saturating_add(score);
        self.progress.last_played_unix = now_unix();

        self.save()
    }

    /// Forget everything and save the fresh record
    pub fn reset_progress(&mut self) -> Result<(), ProgressError> {
        self.progress = Progress::fresh();
        self.save()
    }

    /// Write the record to disk; a no-op for in-memory stores
    pub fn save(&self) -> Result<(), ProgressError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let json = serde_json::to_vec_pretty(&self.progress)?;
        fs::write(path, json).map_err(|source| ProgressError::Io {
            path: path.clone(),
            source,
        })?;

        debug!("Saved progress to {}", path.display());
        Ok(())
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
