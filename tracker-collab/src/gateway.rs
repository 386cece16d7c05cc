//! Mutation gateway: the single apply → persist → broadcast path.
//!
//! ```text
//! session ──Command──► mpsc queue ──► MutationGateway::dispatch
//!                                        ├── IssueStore (apply)
//!                                        ├── Journal    (persist + checkpoint)
//!                                        └── BroadcastGroup (fan-out)
//! ```
//!
//! The gateway runs as one task and handles one command to completion
//! before taking the next, so mutations are applied, persisted and broadcast
//! in the order the queue received them. A slow persist only delays the
//! queue; sessions keep enqueueing.
//!
//! `Connect` goes through the same queue. The new session's subscription and
//! its initial snapshot are therefore taken between two mutations, and it
//! can never receive a snapshot older than the one it started with.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracker_core::{AddComment, CreateIssue, IssueStore, StoreError, UpdateIssue};
use uuid::Uuid;

use crate::broadcast::{BroadcastGroup, SessionInfo};
use crate::protocol::{encode_snapshot, ClientMessage};
use crate::storage::{HistoryLog, Journal};

/// Everything the gateway can be asked to do.
#[derive(Debug)]
pub enum Command {
    /// Register a session and hand it the current snapshot.
    Connect {
        session: SessionInfo,
        reply: oneshot::Sender<SessionFeed>,
    },
    Create {
        session_id: Uuid,
        input: CreateIssue,
    },
    Update {
        session_id: Uuid,
        patch: UpdateIssue,
    },
    AddComment {
        session_id: Uuid,
        input: AddComment,
    },
}

impl Command {
    /// Wrap a decoded client request.
    pub fn from_message(session_id: Uuid, msg: ClientMessage) -> Self {
        match msg {
            ClientMessage::CreateIssue(input) => Self::Create { session_id, input },
            ClientMessage::UpdateIssue(patch) => Self::Update { session_id, patch },
            ClientMessage::AddComment(input) => Self::AddComment { session_id, input },
        }
    }
}

/// What a newly connected session starts from.
#[derive(Debug)]
pub struct SessionFeed {
    /// Encoded `issues` frame of the collection at connect time
    pub snapshot: Arc<str>,
    /// Every snapshot broadcast after `snapshot`
    pub updates: broadcast::Receiver<Arc<str>>,
}

/// Result of dispatching one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Connected { session_id: Uuid },
    Applied {
        issue_id: u64,
        label: String,
        /// Sessions the resulting snapshot reached
        receivers: usize,
    },
    /// The store refused the mutation; nothing was persisted or broadcast.
    Ignored { reason: StoreError },
    /// The data file could not be written; the snapshot was not broadcast.
    PersistFailed { issue_id: u64 },
    /// The snapshot frame could not be encoded.
    EncodeFailed,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("mutation gateway has shut down")]
    Closed,
}

pub struct MutationGateway<H> {
    store: IssueStore,
    journal: Journal<H>,
    broadcast: Arc<BroadcastGroup>,
}

impl<H: HistoryLog + 'static> MutationGateway<H> {
    pub fn new(store: IssueStore, journal: Journal<H>, broadcast: Arc<BroadcastGroup>) -> Self {
        Self {
            store,
            journal,
            broadcast,
        }
    }

    pub fn store(&self) -> &IssueStore {
        &self.store
    }

    pub fn journal(&self) -> &Journal<H> {
        &self.journal
    }

    pub fn broadcast_group(&self) -> &Arc<BroadcastGroup> {
        &self.broadcast
    }

    /// Run one command to completion.
    pub async fn dispatch(&mut self, command: Command) -> Dispatch {
        match command {
            Command::Connect { session, reply } => self.connect(session, reply).await,

            Command::Create { session_id, input } => match self.store.create(input) {
                Ok(issue) => {
                    let issue_id = issue.id;
                    let label = format!("Issue #{issue_id} created by {}", issue.created_by);
                    log::debug!("Session {session_id} created issue #{issue_id}");
                    self.persist_and_broadcast(issue_id, label).await
                }
                Err(reason) => Self::ignore(session_id, reason),
            },

            Command::Update { session_id, patch } => match self.store.update(patch) {
                Ok(issue) => {
                    let issue_id = issue.id;
                    self.persist_and_broadcast(issue_id, format!("Issue #{issue_id} updated"))
                        .await
                }
                Err(reason) => Self::ignore(session_id, reason),
            },

            Command::AddComment { session_id, input } => match self.store.add_comment(input) {
                Ok(issue) => {
                    let issue_id = issue.id;
                    self.persist_and_broadcast(issue_id, format!("Comment added to Issue #{issue_id}"))
                        .await
                }
                Err(reason) => Self::ignore(session_id, reason),
            },
        }
    }

    /// Move the gateway onto its own task fed by a bounded queue.
    pub fn spawn(self, queue_capacity: usize) -> (GatewayHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(queue_capacity);
        let mut gateway = self;
        let task = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                gateway.dispatch(command).await;
            }
            log::info!("Mutation gateway stopped ({} issues)", gateway.store.len());
        });
        (GatewayHandle { tx }, task)
    }

    async fn connect(&mut self, session: SessionInfo, reply: oneshot::Sender<SessionFeed>) -> Dispatch {
        let session_id = session.session_id;
        let snapshot = match encode_snapshot(self.store.snapshot()) {
            Ok(frame) => Arc::<str>::from(frame),
            Err(e) => {
                log::error!("Cannot encode snapshot for session {session_id}: {e}");
                return Dispatch::EncodeFailed;
            }
        };
        let updates = self.broadcast.add_session(session).await;

        if reply.send(SessionFeed { snapshot, updates }).is_err() {
            // Session went away while waiting in the queue.
            self.broadcast.remove_session(&session_id).await;
        }
        Dispatch::Connected { session_id }
    }

    async fn persist_and_broadcast(&self, issue_id: u64, label: String) -> Dispatch {
        if let Err(e) = self.journal.persist(self.store.snapshot(), &label).await {
            log::error!("{label}: data file not written, skipping broadcast: {e}");
            return Dispatch::PersistFailed { issue_id };
        }

        match self.broadcast.broadcast(self.store.snapshot()) {
            Ok(receivers) => {
                log::info!("{label} (sent to {receivers} sessions)");
                Dispatch::Applied {
                    issue_id,
                    label,
                    receivers,
                }
            }
            Err(e) => {
                log::error!("{label}: snapshot encoding failed: {e}");
                Dispatch::EncodeFailed
            }
        }
    }

    fn ignore(session_id: Uuid, reason: StoreError) -> Dispatch {
        log::debug!("Ignoring request from session {session_id}: {reason}");
        Dispatch::Ignored { reason }
    }
}

/// Cloneable sender side of a spawned gateway.
#[derive(Debug, Clone)]
pub struct GatewayHandle {
    tx: mpsc::Sender<Command>,
}

impl GatewayHandle {
    /// Register a session and wait for its initial snapshot.
    pub async fn connect(&self, session: SessionInfo) -> Result<SessionFeed, GatewayError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Connect { session, reply }).await?;
        rx.await.map_err(|_| GatewayError::Closed)
    }

    /// Queue a command; returns once it is enqueued, not once applied.
    pub async fn submit(&self, command: Command) -> Result<(), GatewayError> {
        self.tx.send(command).await.map_err(|_| GatewayError::Closed)
    }

    /// Queue a decoded client request on behalf of `session_id`.
    pub async fn apply(&self, session_id: Uuid, msg: ClientMessage) -> Result<(), GatewayError> {
        self.submit(Command::from_message(session_id, msg)).await
    }
}
