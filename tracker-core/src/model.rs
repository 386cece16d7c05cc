//! Issue and comment records plus the mutation inputs that produce them.
//!
//! Field names serialize in camelCase so the data file and the wire
//! snapshot share one shape:
//! ```text
//! { "id": 1, "title": "Bug", "description": "", "status": "Open",
//!   "createdBy": "Alice", "createdAt": "2026-10-16T09:00:00Z",
//!   "comments": [ { "author": "Bob", "text": "fixed", "time": "..." } ] }
//! ```
//!
//! Timestamps are kept and written at millisecond precision
//! (`2026-10-16T09:00:00.123Z`).

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder title for issues created without one.
pub const DEFAULT_TITLE: &str = "Untitled";
/// Placeholder for `createdBy` and comment `author`.
pub const ANONYMOUS: &str = "Anonymous";
/// Status every issue starts in.
pub const DEFAULT_STATUS: &str = "Open";

/// A tracked unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Assigned by the store, never reused
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Free-form after creation ("Open", "Closed", ...)
    pub status: String,
    pub created_by: String,
    #[serde(with = "millis")]
    pub created_at: DateTime<Utc>,
    /// Append-only discussion thread
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// A timestamped note on exactly one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    #[serde(default)]
    pub text: String,
    #[serde(with = "millis")]
    pub time: DateTime<Utc>,
}

/// Payload of a `createIssue` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl CreateIssue {
    pub fn new(title: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: None,
            created_by: Some(created_by.into()),
        }
    }
}

/// Payload of an `updateIssue` request.
///
/// Absent or empty fields keep the current value; there is no way to clear a
/// field through an update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateIssue {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl UpdateIssue {
    /// Patch that only changes the status.
    pub fn status(id: u64, status: impl Into<String>) -> Self {
        Self {
            id,
            status: Some(status.into()),
            ..Self::default()
        }
    }
}

/// Payload of an `addComment` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddComment {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl AddComment {
    pub fn new(id: u64, author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            author: Some(author.into()),
            text: Some(text.into()),
        }
    }
}

/// Current time truncated to the stored precision.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

mod millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        DateTime::<Utc>::deserialize(deserializer)
    }
}

/// Returns the value if it is present and non-empty.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
