//! Sync state persistence.
//!
//! A single JSON record next to the stored reports: the `last_sync`
//! watermark and the set of report ids synced so far. The file is
//! dot-prefixed so directory scans for reports never pick it up, and the
//! field names are stable — state files written by earlier versions of
//! the sync stay readable.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the state file inside the reports directory.
pub const STATE_FILE_NAME: &str = ".sync_state.json";

/// Persistent sync progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    /// Watermark of the last completed sync, `YYYY-MM-DDTHH:MM:SS`.
    pub last_sync: Option<String>,
    /// Ids of reports persisted by any prior run. Grows, never shrinks.
    #[serde(default)]
    pub synced_reports: BTreeSet<String>,
}

/// Loads and saves [`SyncState`] in the reports directory.
pub struct SyncStateStore {
    path: PathBuf,
}

impl SyncStateStore {
    pub fn new(reports_dir: &Path) -> Self {
        Self {
            path: reports_dir.join(STATE_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state, or the zero state when no file exists yet.
    pub fn load(&self) -> Result<SyncState> {
        if !self.path.exists() {
            return Ok(SyncState::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read sync state: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse sync state: {}", self.path.display()))
    }

    /// Overwrite the state file.
    ///
    /// Writes to a sibling temp file and renames over the target, so a
    /// crash mid-write leaves the previous state intact.
    pub fn save(&self, state: &SyncState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_file_name(format!("{}.tmp", STATE_FILE_NAME));
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write sync state: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace sync state: {}", self.path.display()))?;
        Ok(())
    }
}
