//! Authoritative in-memory issue collection.
//!
//! The store is a plain owned value: whoever holds it (the mutation gateway
//! in the server) is the only writer. It knows nothing about persistence
//! beyond the initial load, and nothing about transports.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{
    non_empty, now, AddComment, Comment, CreateIssue, Issue, UpdateIssue, ANONYMOUS,
    DEFAULT_STATUS, DEFAULT_TITLE,
};
use crate::snapshot;

/// How `add_comment` treats a request without text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentTextPolicy {
    /// Store the comment with empty text.
    #[default]
    #[serde(rename = "empty")]
    StoreEmpty,
    /// Refuse the comment; the issue is left untouched.
    Reject,
}

/// Result of [`IssueStore::load`].
#[derive(Debug)]
pub struct LoadedStore {
    pub store: IssueStore,
    /// The data file was missing or unreadable and must be written before
    /// serving.
    pub needs_init: bool,
}

#[derive(Debug, Clone)]
pub struct IssueStore {
    issues: Vec<Issue>,
    next_id: u64,
    comment_text: CommentTextPolicy,
}

impl IssueStore {
    /// Empty store; the first issue gets id 1.
    pub fn new() -> Self {
        Self {
            issues: Vec::new(),
            next_id: 1,
            comment_text: CommentTextPolicy::default(),
        }
    }

    /// Build a store around an existing collection.
    ///
    /// Fails when the highest id leaves no room for another one.
    pub fn from_issues(issues: Vec<Issue>) -> Result<Self, StoreError> {
        let next_id = match issues.iter().map(|i| i.id).max() {
            Some(max) => max.checked_add(1).ok_or(StoreError::IdsExhausted)?,
            None => 1,
        };
        Ok(Self {
            issues,
            next_id,
            comment_text: CommentTextPolicy::default(),
        })
    }

    /// Load the collection persisted at `path`.
    ///
    /// Any read or parse failure, or a collection whose ids are exhausted,
    /// yields an empty store flagged for initialization; the failure itself
    /// is only logged.
    pub fn load(path: &Path) -> LoadedStore {
        let loaded = snapshot::read_file(path)
            .map_err(|e| e.to_string())
            .and_then(|issues| Self::from_issues(issues).map_err(|e| e.to_string()));
        match loaded {
            Ok(store) => {
                log::info!("Loaded {} issues from {}", store.len(), path.display());
                LoadedStore {
                    store,
                    needs_init: false,
                }
            }
            Err(e) => {
                log::warn!("Starting with an empty collection, {} unreadable: {e}", path.display());
                LoadedStore {
                    store: Self::new(),
                    needs_init: true,
                }
            }
        }
    }

    pub fn with_comment_policy(mut self, policy: CommentTextPolicy) -> Self {
        self.comment_text = policy;
        self
    }

    /// Create an issue with defaults applied and return it.
    ///
    /// Refuses once every id has been handed out; ids never wrap.
    pub fn create(&mut self, input: CreateIssue) -> Result<&Issue, StoreError> {
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or(StoreError::IdsExhausted)?;

        self.issues.push(Issue {
            id,
            title: non_empty(input.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            description: input.description.unwrap_or_default(),
            status: DEFAULT_STATUS.to_string(),
            created_by: non_empty(input.created_by).unwrap_or_else(|| ANONYMOUS.to_string()),
            created_at: now(),
            comments: Vec::new(),
        });
        Ok(&self.issues[self.issues.len() - 1])
    }

    /// Overwrite title, description and status where the patch carries a
    /// non-empty value.
    pub fn update(&mut self, patch: UpdateIssue) -> Result<&Issue, StoreError> {
        let issue = self.find_mut(patch.id)?;
        if let Some(title) = non_empty(patch.title) {
            issue.title = title;
        }
        if let Some(description) = non_empty(patch.description) {
            issue.description = description;
        }
        if let Some(status) = non_empty(patch.status) {
            issue.status = status;
        }
        Ok(&*issue)
    }

    /// Append a comment to an existing issue.
    pub fn add_comment(&mut self, input: AddComment) -> Result<&Issue, StoreError> {
        let policy = self.comment_text;
        let issue = self.find_mut(input.id)?;
        let text = match (non_empty(input.text), policy) {
            (Some(text), _) => text,
            (None, CommentTextPolicy::StoreEmpty) => String::new(),
            (None, CommentTextPolicy::Reject) => return Err(StoreError::MissingCommentText(input.id)),
        };
        issue.comments.push(Comment {
            author: non_empty(input.author).unwrap_or_else(|| ANONYMOUS.to_string()),
            text,
            time: now(),
        });
        Ok(&*issue)
    }

    /// The whole collection in creation order.
    pub fn snapshot(&self) -> &[Issue] {
        &self.issues
    }

    pub fn get(&self, id: u64) -> Option<&Issue> {
        self.issues.iter().find(|i| i.id == id)
    }

    /// Id the next `create` will assign.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    fn find_mut(&mut self, id: u64) -> Result<&mut Issue, StoreError> {
        self.issues
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(StoreError::NotFound(id))
    }
}

impl Default for IssueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_bug() -> IssueStore {
        let mut store = IssueStore::new();
        store.create(CreateIssue::new("Bug", "Alice")).unwrap();
        store
    }

    #[test]
    fn test_create_applies_defaults() {
        let mut store = IssueStore::new();
        let issue = store.create(CreateIssue::default()).unwrap().clone();
        assert_eq!(issue.id, 1);
        assert_eq!(issue.title, "Untitled");
        assert_eq!(issue.description, "");
        assert_eq!(issue.status, "Open");
        assert_eq!(issue.created_by, "Anonymous");
        assert!(issue.comments.is_empty());
    }

    #[test]
    fn test_create_empty_strings_use_defaults() {
        let mut store = IssueStore::new();
        let issue = store
            .create(CreateIssue {
                title: Some(String::new()),
                description: Some(String::new()),
                created_by: Some(String::new()),
            })
            .unwrap();
        assert_eq!(issue.title, "Untitled");
        assert_eq!(issue.created_by, "Anonymous");
    }

    #[test]
    fn test_create_bug_by_alice() {
        let store = store_with_bug();
        assert_eq!(store.len(), 1);
        let issue = store.get(1).unwrap();
        assert_eq!(issue.title, "Bug");
        assert_eq!(issue.created_by, "Alice");
        assert_eq!(issue.status, "Open");
        assert!(issue.comments.is_empty());
    }

    #[test]
    fn test_ids_strictly_increase_from_one() {
        let mut store = IssueStore::new();
        let ids: Vec<u64> = (0..20).map(|_| store.create(CreateIssue::default()).unwrap().id).collect();
        assert_eq!(ids.first(), Some(&1));
        assert!(ids.windows(2).all(|w| w[1] == w[0] + 1));
        assert_eq!(store.next_id(), 21);
    }

    #[test]
    fn test_next_id_after_reload_is_max_plus_one() {
        let mut store = IssueStore::new();
        for _ in 0..3 {
            store.create(CreateIssue::default()).unwrap();
        }
        // Drop the middle issue to make sure the counter follows the max, not the count.
        let issues: Vec<Issue> = store.snapshot().iter().filter(|i| i.id != 2).cloned().collect();
        let mut reloaded = IssueStore::from_issues(issues).unwrap();
        assert_eq!(reloaded.next_id(), 4);
        assert_eq!(reloaded.create(CreateIssue::default()).unwrap().id, 4);
    }

    #[test]
    fn test_empty_reload_starts_at_one() {
        assert_eq!(IssueStore::from_issues(Vec::new()).unwrap().next_id(), 1);
    }

    fn issue_with_id(id: u64) -> Issue {
        let mut store = IssueStore::new();
        let mut issue = store.create(CreateIssue::new("Edge", "Alice")).unwrap().clone();
        issue.id = id;
        issue
    }

    #[test]
    fn test_reload_with_max_id_is_refused() {
        let err = IssueStore::from_issues(vec![issue_with_id(u64::MAX)]).unwrap_err();
        assert_eq!(err, StoreError::IdsExhausted);
    }

    #[test]
    fn test_create_never_wraps_ids() {
        let mut store = IssueStore::from_issues(vec![issue_with_id(u64::MAX - 1)]).unwrap();
        assert_eq!(store.next_id(), u64::MAX);

        assert_eq!(store.create(CreateIssue::default()).unwrap_err(), StoreError::IdsExhausted);
        assert_eq!(store.len(), 1);
        assert_eq!(store.next_id(), u64::MAX);
    }

    #[test]
    fn test_load_file_with_max_id_needs_init() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issues.json");
        let issues = vec![issue_with_id(u64::MAX)];
        std::fs::write(&path, snapshot::encode_pretty(&issues).unwrap()).unwrap();

        let loaded = IssueStore::load(&path);
        assert!(loaded.needs_init);
        assert!(loaded.store.is_empty());
        assert_eq!(loaded.store.next_id(), 1);
    }

    #[test]
    fn test_comment_policy_config_names() {
        let policy: CommentTextPolicy = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(policy, CommentTextPolicy::Reject);
        assert_eq!(serde_json::to_string(&CommentTextPolicy::StoreEmpty).unwrap(), "\"empty\"");
    }

    #[test]
    fn test_update_status_only() {
        let mut store = store_with_bug();
        let issue = store.update(UpdateIssue::status(1, "Closed")).unwrap();
        assert_eq!(issue.status, "Closed");
        assert_eq!(issue.title, "Bug");
        assert_eq!(issue.description, "");
    }

    #[test]
    fn test_update_empty_fields_are_ignored() {
        let mut store = store_with_bug();
        let before = store.get(1).unwrap().clone();
        let issue = store
            .update(UpdateIssue {
                id: 1,
                title: Some(String::new()),
                description: None,
                status: Some(String::new()),
            })
            .unwrap();
        assert_eq!(*issue, before);
    }

    #[test]
    fn test_update_replaces_non_empty_fields() {
        let mut store = store_with_bug();
        let issue = store
            .update(UpdateIssue {
                id: 1,
                title: Some("Crash".to_string()),
                description: Some("on save".to_string()),
                status: Some("In Progress".to_string()),
            })
            .unwrap();
        assert_eq!(issue.title, "Crash");
        assert_eq!(issue.description, "on save");
        assert_eq!(issue.status, "In Progress");
        assert_eq!(issue.created_by, "Alice");
    }

    #[test]
    fn test_update_unknown_id() {
        let mut store = store_with_bug();
        let before = store.snapshot().to_vec();
        assert_eq!(
            store.update(UpdateIssue::status(999, "Closed")).unwrap_err(),
            StoreError::NotFound(999)
        );
        assert_eq!(store.snapshot(), before.as_slice());
    }

    #[test]
    fn test_add_comment() {
        let mut store = store_with_bug();
        let issue = store.add_comment(AddComment::new(1, "Bob", "fixed")).unwrap();
        assert_eq!(issue.comments.len(), 1);
        assert_eq!(issue.comments[0].author, "Bob");
        assert_eq!(issue.comments[0].text, "fixed");
    }

    #[test]
    fn test_comments_append_in_order() {
        let mut store = store_with_bug();
        store.add_comment(AddComment::new(1, "Bob", "first")).unwrap();
        let issue = store
            .add_comment(AddComment { id: 1, author: None, text: Some("second".to_string()) })
            .unwrap();
        let texts: Vec<&str> = issue.comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);
        assert_eq!(issue.comments[1].author, "Anonymous");
    }

    #[test]
    fn test_add_comment_unknown_id() {
        let mut store = store_with_bug();
        assert_eq!(
            store.add_comment(AddComment::new(7, "Bob", "hi")).unwrap_err(),
            StoreError::NotFound(7)
        );
        assert!(store.get(1).unwrap().comments.is_empty());
    }

    #[test]
    fn test_missing_text_stored_empty_by_default() {
        let mut store = store_with_bug();
        let issue = store.add_comment(AddComment { id: 1, author: None, text: None }).unwrap();
        assert_eq!(issue.comments[0].text, "");
    }

    #[test]
    fn test_missing_text_rejected_by_policy() {
        let mut store = store_with_bug().with_comment_policy(CommentTextPolicy::Reject);
        assert_eq!(
            store.add_comment(AddComment { id: 1, author: None, text: None }).unwrap_err(),
            StoreError::MissingCommentText(1)
        );
        assert!(store.get(1).unwrap().comments.is_empty());
    }

    #[test]
    fn test_load_missing_file_needs_init() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = IssueStore::load(&dir.path().join("issues.json"));
        assert!(loaded.needs_init);
        assert!(loaded.store.is_empty());
        assert_eq!(loaded.store.next_id(), 1);
    }

    #[test]
    fn test_load_corrupt_file_needs_init() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issues.json");
        std::fs::write(&path, "[{\"id\": ").unwrap();
        let loaded = IssueStore::load(&path);
        assert!(loaded.needs_init);
        assert!(loaded.store.is_empty());
    }

    #[test]
    fn test_persist_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issues.json");

        let mut store = store_with_bug();
        store.create(CreateIssue::new("Docs", "Carol")).unwrap();
        store.add_comment(AddComment::new(1, "Bob", "fixed")).unwrap();
        std::fs::write(&path, snapshot::encode_pretty(store.snapshot()).unwrap()).unwrap();

        let loaded = IssueStore::load(&path);
        assert!(!loaded.needs_init);
        assert_eq!(loaded.store.snapshot(), store.snapshot());
        assert_eq!(loaded.store.next_id(), 3);
    }
}
