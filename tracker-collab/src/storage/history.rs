//! Version history checkpoints for the data file.
//!
//! Each persisted mutation is recorded as one labeled checkpoint. The
//! history is an audit aid only: callers log a failed checkpoint and carry
//! on.

use std::future::Future;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}: {output}")]
    CommandFailed {
        command: String,
        status: String,
        output: String,
    },
}

/// Append-only log of labeled checkpoints.
pub trait HistoryLog: Send + Sync {
    /// Record the current contents of `file` under `label`.
    fn record(&self, file: &Path, label: &str) -> impl Future<Output = Result<(), HistoryError>> + Send;
}

/// Commits the data file to the git repository it lives in.
#[derive(Debug, Clone)]
pub struct GitHistory {
    repo_dir: PathBuf,
}

impl GitHistory {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    /// Repository containing `file` (its parent directory, or the working
    /// directory for a bare file name).
    pub fn for_file(file: &Path) -> Self {
        match file.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => Self::new(dir),
            _ => Self::new("."),
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    async fn git(&self, args: &[&str]) -> Result<(), HistoryError> {
        let command = format!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
            .await
            .map_err(|source| HistoryError::Spawn {
                command: command.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }
        // `git commit` reports "nothing to commit" on stdout.
        let mut text = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if text.is_empty() {
            text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        }
        Err(HistoryError::CommandFailed {
            command,
            status: output.status.to_string(),
            output: text,
        })
    }
}

impl HistoryLog for GitHistory {
    async fn record(&self, file: &Path, label: &str) -> Result<(), HistoryError> {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string_lossy().into_owned());
        self.git(&["add", "--", &name]).await?;
        self.git(&["commit", "-m", label]).await
    }
}

/// History backend chosen at startup.
#[derive(Debug, Clone)]
pub enum History {
    Git(GitHistory),
    /// Checkpoints are skipped entirely
    Disabled,
}

impl HistoryLog for History {
    async fn record(&self, file: &Path, label: &str) -> Result<(), HistoryError> {
        match self {
            Self::Git(git) => git.record(file, label).await,
            Self::Disabled => Ok(()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Keeps checkpoint labels in memory; optionally fails every checkpoint.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingHistory {
        labels: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl RecordingHistory {
        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub(crate) fn labels(&self) -> Vec<String> {
            self.labels.lock().unwrap().clone()
        }
    }

    impl HistoryLog for RecordingHistory {
        async fn record(&self, _file: &Path, label: &str) -> Result<(), HistoryError> {
            self.labels.lock().unwrap().push(label.to_string());
            if self.fail {
                return Err(HistoryError::CommandFailed {
                    command: "git commit -m".to_string(),
                    status: "exit status: 1".to_string(),
                    output: "nothing to commit, working tree clean".to_string(),
                });
            }
            Ok(())
        }
    }
}
