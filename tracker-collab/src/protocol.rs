//! JSON wire protocol carried in WebSocket text frames.
//!
//! Every frame is an envelope tagged by `type` with the payload in `data`:
//! ```text
//! server → client   {"type":"issues","data":[Issue, ...]}
//! client → server   {"type":"createIssue","data":{"title":..,"createdBy":..}}
//!                   {"type":"updateIssue","data":{"id":1,"status":"Closed"}}
//!                   {"type":"addComment","data":{"id":1,"author":..,"text":..}}
//! ```
//!
//! The server never answers with an error frame; a request it cannot use is
//! logged and dropped.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracker_core::{AddComment, CreateIssue, Issue, UpdateIssue};

/// Client → server requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    CreateIssue(CreateIssue),
    UpdateIssue(UpdateIssue),
    AddComment(AddComment),
}

impl ClientMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Serialization)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Deserialization)
    }
}

/// Server → client messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Full collection; receivers replace their whole view with it.
    Issues(Vec<Issue>),
}

impl ServerMessage {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Deserialization)
    }
}

/// Encode the `issues` snapshot frame from a borrowed collection.
///
/// Produces the same text as encoding `ServerMessage::Issues` without cloning
/// the collection.
pub fn encode_snapshot(issues: &[Issue]) -> Result<String, ProtocolError> {
    #[derive(Serialize)]
    #[serde(tag = "type", content = "data", rename_all = "camelCase")]
    enum Outgoing<'a> {
        Issues(&'a [Issue]),
    }
    serde_json::to_string(&Outgoing::Issues(issues)).map_err(ProtocolError::Serialization)
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),
    #[error("Deserialization error: {0}")]
    Deserialization(#[source] serde_json::Error),
}
