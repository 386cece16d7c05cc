//! # tracker-core: issue data model and authoritative store
//!
//! - [`model`]: `Issue`, `Comment` and the mutation inputs
//! - [`store`]: `IssueStore`, the single writer of the collection
//! - [`snapshot`]: whole-collection JSON encoding for file and wire

pub mod error;
pub mod model;
pub mod snapshot;
pub mod store;

pub use error::{SnapshotError, StoreError};
pub use model::{AddComment, Comment, CreateIssue, Issue, UpdateIssue};
pub use store::{CommentTextPolicy, IssueStore, LoadedStore};
