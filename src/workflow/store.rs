//! On-disk storage for workflow state.
//!
//! One JSON file per workflow+command key under a single directory. Writes go
//! to a sibling temp file which is then renamed over the target, so a reader
//! never sees a partially written state.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use super::state::{StateKey, WorkflowState};

/// Errors from the state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem access failed.
    #[error("State file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a readable state.
    #[error("State file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The state could not be encoded.
    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}

/// A state file found by [`StateStore::list`].
#[derive(Debug)]
pub struct StateEntry {
    /// Path of the file
    pub path: PathBuf,

    /// Parsed state, or `None` if the file is unreadable
    pub state: Option<WorkflowState>,
}

/// Reads and writes [`WorkflowState`] files.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the state files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds the state for `key`.
    pub fn path_for(&self, key: &StateKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Load the saved state for `key`, if any.
    pub fn load(&self, key: &StateKey) -> Result<Option<WorkflowState>, StoreError> {
        let path = self.path_for(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StoreError::Corrupt { path, source })
    }

    /// Atomically replace the saved state.
    pub fn save(&self, state: &WorkflowState) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let path = self.path_for(&state.key());
        let content = serde_json::to_string_pretty(state)?;
        write_file_atomic(&path, content.as_bytes())?;

        tracing::debug!(path = %path.display(), index = state.current_step_index, "Saved workflow state");
        Ok(())
    }

    /// Remove the saved state. Returns whether a file was removed.
    pub fn delete(&self, key: &StateKey) -> Result<bool, StoreError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Every state file in the directory, sorted by path.
    pub fn list(&self) -> Result<Vec<StateEntry>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.dir, e)),
        };

        let mut found = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&self.dir, e))?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let state = fs::read_to_string(&path)
                .ok()
                .and_then(|content| serde_json::from_str(&content).ok());
            found.push(StateEntry { path, state });
        }

        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }

    /// Remove state files not updated within `retention`.
    ///
    /// Unreadable files are aged by their modification time. Returns the
    /// number of files removed.
    pub fn prune_older_than(&self, retention: Duration, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let cutoff = now - retention;
        let mut removed = 0;

        for entry in self.list()? {
            let updated = match &entry.state {
                Some(state) => Some(state.updated_at),
                None => fs::metadata(&entry.path)
                    .and_then(|m| m.modified())
                    .ok()
                    .map(DateTime::<Utc>::from),
            };

            if updated.is_some_and(|at| at < cutoff) {
                fs::remove_file(&entry.path).map_err(|e| StoreError::io(&entry.path, e))?;
                tracing::info!(path = %entry.path.display(), "Removed stale workflow state");
                removed += 1;
            }
        }

        Ok(removed)
    }
}

/// Write to a temp file next to `path`, flush it to disk, then rename.
fn write_file_atomic(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let temp_path = path.with_extension("json.tmp");

    let mut file = fs::File::create(&temp_path).map_err(|e| StoreError::io(&temp_path, e))?;
    file.write_all(content).map_err(|e| StoreError::io(&temp_path, e))?;
    file.sync_all().map_err(|e| StoreError::io(&temp_path, e))?;
    drop(file);

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(StoreError::io(path, e));
    }

    Ok(())
}
