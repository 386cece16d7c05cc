//! Writes the full collection to the data file, then checkpoints it.
//!
//! ```text
//! persist(issues, label)
//!   ├── encode pretty JSON
//!   ├── write  issues.json.tmp
//!   ├── rename issues.json.tmp → issues.json     (errors propagate)
//!   └── history.record(issues.json, label)       (errors logged only)
//! ```
//!
//! Not transactional: a crash after the rename leaves the file updated with
//! no matching checkpoint.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracker_core::{snapshot, Issue, SnapshotError};

use super::history::HistoryLog;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] SnapshotError),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("data file path has no file name: {}", .0.display())]
    InvalidPath(PathBuf),
}

pub struct Journal<H> {
    path: PathBuf,
    history: H,
}

impl<H: HistoryLog> Journal<H> {
    pub fn new(path: impl Into<PathBuf>, history: H) -> Self {
        Self {
            path: path.into(),
            history,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the data file with `issues` and record a checkpoint.
    pub async fn persist(&self, issues: &[Issue], label: &str) -> Result<(), JournalError> {
        let text = snapshot::encode_pretty(issues)?;
        self.replace_file(text.as_bytes()).await?;

        match self.history.record(&self.path, label).await {
            Ok(()) => log::debug!("Checkpoint recorded: {label}"),
            Err(e) => log::warn!("History checkpoint failed ({label}): {e}"),
        }
        Ok(())
    }

    /// First write of a fresh (empty or recovered) collection.
    pub async fn initialize(&self, issues: &[Issue]) -> Result<(), JournalError> {
        let label = format!("Initialized {}", self.file_name()?);
        self.persist(issues, &label).await
    }

    async fn replace_file(&self, bytes: &[u8]) -> Result<(), JournalError> {
        let tmp = self.path.with_file_name(format!("{}.tmp", self.file_name()?));
        let write_err = |source| JournalError::Write {
            path: self.path.clone(),
            source,
        };
        tokio::fs::write(&tmp, bytes).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(write_err)
    }

    fn file_name(&self) -> Result<String, JournalError> {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| JournalError::InvalidPath(self.path.clone()))
    }
}
