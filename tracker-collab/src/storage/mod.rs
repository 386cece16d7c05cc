//! Durable log writer: data file plus version history.
//!
//! ```text
//! ┌─────────────────┐  persist(issues, label)  ┌──────────────┐
//! │ MutationGateway │ ───────────────────────► │   Journal    │
//! └─────────────────┘                          └──────┬───────┘
//!                                                     │
//!                              ┌──────────────────────┼─────────────────┐
//!                              ▼                                        ▼
//!                     issues.json (full rewrite)             HistoryLog (git commit)
//! ```

pub mod history;
pub mod journal;

pub use history::{GitHistory, History, HistoryError, HistoryLog};
pub use journal::{Journal, JournalError};
