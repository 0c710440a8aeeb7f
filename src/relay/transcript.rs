//! Date-partitioned conversation transcripts
//!
//! Each day's conversation lives in `<history-dir>/<YYYYMMDD>.json` as a JSON
//! array of turns. A session loads today's file as the interpreter's memory,
//! creating an empty one if the day has no transcript yet.
//!
//! Writes are whole-file and unsynchronised: two sessions saving the same day's
//! transcript race, and the last save wins.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use tracing::{debug, info};

use crate::interpreter::Turn;

/// Transcript storage manager
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    /// Base directory for transcript files
    base_dir: PathBuf,
}

impl TranscriptStore {
    /// Create a new transcript store, creating the directory if needed
    pub fn new(base_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Get the transcript path for a given day
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.base_dir
            .join(format!("{}.json", date.format("%Y%m%d")))
    }

    /// Transcript path for the current local date
    pub fn today_path(&self) -> PathBuf {
        self.path_for(Local::now().date_naive())
    }

    /// Load the transcript at `path`, writing an empty one if it doesn't exist
    pub fn load_or_create(&self, path: &Path) -> std::io::Result<Vec<Turn>> {
        if path.exists() {
            let turns = self.load(path)?;
            info!(path = %path.display(), turns = turns.len(), "Loaded conversation history");
            Ok(turns)
        } else {
            self.save(path, &[])?;
            info!(path = %path.display(), "Created conversation history");
            Ok(Vec::new())
        }
    }

    /// Load a transcript from disk
    pub fn load(&self, path: &Path) -> std::io::Result<Vec<Turn>> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save a transcript to disk, replacing any previous content
    pub fn save(&self, path: &Path, turns: &[Turn]) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(turns)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), turns = turns.len(), "Saved conversation history");
        Ok(())
    }
}
