//! Persistence of [`RunState`].
//!
//! The state file is rewritten whole on every save: the new content goes to
//! a temporary file in the same directory which is then renamed over the
//! old one, so readers never see a half-written file.

use ledit_protocol::RunState;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// Current state file name.
pub const STATE_FILE: &str = "orchestration_state.json";

/// Name used by older engine versions. Read, never written.
pub const LEGACY_STATE_FILE: &str = "requirements.json";

#[derive(Error, Debug)]
pub enum StateError {
    #[error("failed to access state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse state file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize run state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to replace state file {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

/// Reads and writes the run state under a project-local directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path that [`save`](Self::save) writes to.
    pub fn path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    /// Load the stored state, trying the current file name first and then
    /// the legacy one. Returns `Ok(None)` when neither exists.
    pub fn load(&self) -> Result<Option<RunState>, StateError> {
        for name in [STATE_FILE, LEGACY_STATE_FILE] {
            let path = self.dir.join(name);
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => return Err(StateError::Io { path, source }),
            };

            let state = serde_json::from_str(&content)
                .map_err(|source| StateError::Parse { path: path.clone(), source })?;
            debug!(path = %path.display(), "loaded run state");
            return Ok(Some(state));
        }
        Ok(None)
    }

    /// Atomically replace the state file with `state`.
    pub fn save(&self, state: &RunState) -> Result<(), StateError> {
        let io_err = |source: io::Error| StateError::Io {
            path: self.dir.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let json = serde_json::to_vec_pretty(state)?;

        let mut file = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        file.write_all(&json).map_err(io_err)?;
        file.write_all(b"\n").map_err(io_err)?;
        file.as_file().sync_all().map_err(io_err)?;

        let path = self.path();
        file.persist(&path)
            .map_err(|source| StateError::Persist { path, source })?;
        Ok(())
    }

    /// Move the current state file aside, returning the backup path.
    /// Returns `Ok(None)` when there is nothing to back up.
    pub fn backup(&self) -> Result<Option<PathBuf>, StateError> {
        for name in [STATE_FILE, LEGACY_STATE_FILE] {
            let path = self.dir.join(name);
            if !path.exists() {
                continue;
            }
            let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
            let backup = self.dir.join(format!("{name}.{stamp}.bak"));
            fs::rename(&path, &backup).map_err(|source| StateError::Io { path, source })?;
            return Ok(Some(backup));
        }
        Ok(None)
    }
}
