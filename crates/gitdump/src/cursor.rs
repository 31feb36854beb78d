//! Persistent walk cursor.
//!
//! The cursor remembers which repository the last walk reached. It is only a
//! hint used to skip redundant work on start-up, never a checkpoint: losing
//! it costs one extra walk.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name of the cursor inside the status directory.
pub const CURSOR_FILE_NAME: &str = "cursor.json";

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("Cursor I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode cursor: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CursorError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// How [`Cursor::has`] interprets the stored marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CursorMode {
    /// Any recorded repository means every repository counts as seen.
    #[default]
    ColdStart,
    /// Only repositories whose walk completed count as seen.
    PerRepository,
}

impl FromStr for CursorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "cold-start" | "coldstart" => Ok(Self::ColdStart),
            "per-repository" | "perrepository" => Ok(Self::PerRepository),
            other => Err(format!("unknown cursor mode: {other}")),
        }
    }
}

impl fmt::Display for CursorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ColdStart => "cold-start",
            Self::PerRepository => "per-repository",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct CursorState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    repository: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    completed: BTreeSet<String>,
}

impl CursorState {
    fn has(&self, mode: CursorMode, repository: &str) -> bool {
        match mode {
            CursorMode::ColdStart => self.repository.is_some(),
            CursorMode::PerRepository => self.completed.contains(repository),
        }
    }
}

/// A frozen view of the cursor, taken when the engine starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorSnapshot {
    mode: CursorMode,
    state: CursorState,
}

impl CursorSnapshot {
    pub fn has(&self, repository: &str) -> bool {
        self.state.has(self.mode, repository)
    }

    /// Whether every repository counts as walked, whatever its name.
    pub fn covers_all(&self) -> bool {
        self.mode == CursorMode::ColdStart && self.state.repository.is_some()
    }

    /// Last repository recorded, if any.
    pub fn last_repository(&self) -> Option<&str> {
        self.state.repository.as_deref()
    }
}

/// The cursor file in the status directory.
#[derive(Debug)]
pub struct Cursor {
    path: PathBuf,
    mode: CursorMode,
    state: Mutex<CursorState>,
}

impl Cursor {
    /// Open (creating if needed) the cursor in `status_dir`.
    ///
    /// An unreadable cursor file is logged and replaced by an empty one.
    ///
    /// # Errors
    /// Fails if the status directory or a fresh cursor file cannot be created.
    pub fn open(status_dir: &Path, mode: CursorMode) -> Result<Self, CursorError> {
        fs::create_dir_all(status_dir).map_err(|e| CursorError::io(status_dir, e))?;
        let path = status_dir.join(CURSOR_FILE_NAME);

        let (state, fresh) = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<CursorState>(&text) {
                Ok(state) => (state, false),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Discarding unreadable cursor");
                    (CursorState::default(), true)
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => (CursorState::default(), true),
            Err(e) => return Err(CursorError::io(&path, e)),
        };

        let cursor = Self {
            path,
            mode,
            state: Mutex::new(state),
        };
        if fresh {
            cursor.persist(&CursorState::default())?;
        }
        tracing::debug!(path = %cursor.path.display(), %mode, "Cursor opened");
        Ok(cursor)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> CursorMode {
        self.mode
    }

    /// Whether `repository` counts as already walked.
    pub fn has(&self, repository: &str) -> bool {
        self.lock().has(self.mode, repository)
    }

    pub fn snapshot(&self) -> CursorSnapshot {
        CursorSnapshot {
            mode: self.mode,
            state: self.lock().clone(),
        }
    }

    /// Record that the walk of `repository` finished.
    ///
    /// Write failures are logged and otherwise ignored.
    pub fn set(&self, repository: &str) {
        if let Err(e) = self.try_set(repository) {
            tracing::warn!(repository, error = %e, "Failed to update cursor");
        }
    }

    /// Like [`set`](Self::set), but reports write failures.
    ///
    /// # Errors
    /// Returns the encode or I/O error; the in-memory marker is still updated.
    pub fn try_set(&self, repository: &str) -> Result<(), CursorError> {
        let snapshot = {
            let mut state = self.lock();
            state.repository = Some(repository.to_string());
            if self.mode == CursorMode::PerRepository {
                state.completed.insert(repository.to_string());
            }
            state.clone()
        };
        self.persist(&snapshot)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CursorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Write via a temporary sibling and rename, so readers never see a
    /// partially written cursor.
    fn persist(&self, state: &CursorState) -> Result<(), CursorError> {
        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| CursorError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| CursorError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_empty_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let status = dir.path().join("status");
        let cursor = Cursor::open(&status, CursorMode::ColdStart).unwrap();

        assert!(cursor.path().exists());
        assert!(!cursor.has("acme/widgets"));
        assert_eq!(fs::read_to_string(cursor.path()).unwrap().trim(), "{}");
    }

    #[test]
    fn test_cold_start_mode_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cursor = Cursor::open(dir.path(), CursorMode::ColdStart).unwrap();

        cursor.set("acme/widgets");

        assert!(cursor.has("acme/widgets"));
        assert!(cursor.has("acme/never-walked"));
    }

    #[test]
    fn test_per_repository_mode_tracks_completed() {
        let dir = tempfile::tempdir().unwrap();
        let cursor = Cursor::open(dir.path(), CursorMode::PerRepository).unwrap();

        cursor.set("acme/widgets");

        assert!(cursor.has("acme/widgets"));
        assert!(!cursor.has("acme/gadgets"));
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cursor = Cursor::open(dir.path(), CursorMode::PerRepository).unwrap();
            cursor.set("acme/widgets");
            cursor.set("acme/gadgets");
        }

        let reopened = Cursor::open(dir.path(), CursorMode::PerRepository).unwrap();
        assert!(reopened.has("acme/widgets"));
        assert!(reopened.has("acme/gadgets"));
        assert_eq!(reopened.snapshot().last_repository(), Some("acme/gadgets"));
        assert!(!dir.path().join("cursor.json.tmp").exists());
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let dir = tempfile::tempdir().unwrap();
        let cursor = Cursor::open(dir.path(), CursorMode::ColdStart).unwrap();
        let before = cursor.snapshot();

        cursor.set("acme/widgets");

        assert!(!before.has("acme/widgets"));
        assert!(!before.covers_all());
        assert!(cursor.snapshot().has("acme/widgets"));
        assert!(cursor.snapshot().covers_all());
    }

    #[test]
    fn test_unreadable_cursor_is_reset() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CURSOR_FILE_NAME), "not json").unwrap();

        let cursor = Cursor::open(dir.path(), CursorMode::ColdStart).unwrap();
        assert!(!cursor.has("acme/widgets"));
    }

    #[test]
    fn test_cursor_mode_parsing() {
        assert_eq!("cold-start".parse::<CursorMode>(), Ok(CursorMode::ColdStart));
        assert_eq!("per_repository".parse::<CursorMode>(), Ok(CursorMode::PerRepository));
        assert!("sometimes".parse::<CursorMode>().is_err());
    }
}
