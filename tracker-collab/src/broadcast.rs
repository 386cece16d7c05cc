//! Whole-snapshot fan-out to every connected session.
//!
//! Uses a tokio broadcast channel: the snapshot frame is encoded once and
//! shared as `Arc<str>` by all receivers. There is no per-session filtering,
//! so the session that caused a mutation receives its own echo.
//!
//! A receiver that falls more than `capacity` frames behind loses the oldest
//! ones and resumes at the oldest snapshot still retained, then reads forward
//! to the newest. Each frame is the complete collection, so every frame it
//! does receive is a consistent view.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracker_core::Issue;
use uuid::Uuid;

use crate::protocol::{encode_snapshot, ProtocolError};

/// One connected client's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: Uuid,
    /// Remote address, when the session came in over TCP
    pub addr: Option<SocketAddr>,
}

impl SessionInfo {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            addr: Some(addr),
        }
    }

    /// Session without a network peer (tests, in-process callers).
    pub fn detached() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            addr: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BroadcastStats {
    pub snapshots_sent: u64,
    pub active_sessions: usize,
}

pub struct BroadcastGroup {
    sender: broadcast::Sender<Arc<str>>,
    sessions: RwLock<HashMap<Uuid, SessionInfo>>,
    capacity: usize,
    snapshots_sent: AtomicU64,
}

impl BroadcastGroup {
    /// `capacity` is the number of frames buffered per session.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sessions: RwLock::new(HashMap::new()),
            capacity,
            snapshots_sent: AtomicU64::new(0),
        }
    }

    /// Register a session; the receiver yields every later broadcast.
    pub async fn add_session(&self, info: SessionInfo) -> broadcast::Receiver<Arc<str>> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(info.session_id, info);
        self.sender.subscribe()
    }

    pub async fn remove_session(&self, session_id: &Uuid) -> Option<SessionInfo> {
        self.sessions.write().await.remove(session_id)
    }

    /// Send the full collection to every session.
    ///
    /// Returns the number of receivers the frame reached.
    pub fn broadcast(&self, issues: &[Issue]) -> Result<usize, ProtocolError> {
        let frame: Arc<str> = encode_snapshot(issues)?.into();
        Ok(self.broadcast_frame(frame))
    }

    /// Send an already encoded frame.
    pub fn broadcast_frame(&self, frame: Arc<str>) -> usize {
        // Err only means nobody is subscribed right now.
        let count = self.sender.send(frame).unwrap_or(0);
        self.snapshots_sent.fetch_add(1, Ordering::Relaxed);
        count
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn sessions(&self) -> Vec<SessionInfo> {
        self.sessions.read().await.values().cloned().collect()
    }

    pub async fn has_session(&self, session_id: &Uuid) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            snapshots_sent: self.snapshots_sent.load(Ordering::Relaxed),
            active_sessions: self.sessions.read().await.len(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
