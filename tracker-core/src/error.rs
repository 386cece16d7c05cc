use thiserror::Error;

/// Reasons a mutation is not applied to the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Issue #{0} not found")]
    NotFound(u64),
    #[error("Comment for issue #{0} has no text")]
    MissingCommentText(u64),
    #[error("No issue ids left to assign")]
    IdsExhausted,
}

/// Failure reading or encoding a persisted snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
