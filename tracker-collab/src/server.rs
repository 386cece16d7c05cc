//! WebSocket server: one task per session, one gateway for all of them.
//!
//! ```text
//! Client A ──┐                      ┌── IssueStore
//!            ├── session tasks ──► MutationGateway ── Journal (issues.json + git)
//! Client B ──┘        ▲             └── BroadcastGroup
//!                     │                     │
//!                     └──── issues frames ──┘
//! ```
//!
//! Startup order: load the data file (writing it if missing or corrupt),
//! start the gateway, then accept connections.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use figment::providers::{Env, Serialized};
use figment::Figment;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tracker_core::{CommentTextPolicy, IssueStore};

use crate::broadcast::{BroadcastGroup, SessionInfo};
use crate::gateway::{GatewayError, GatewayHandle, MutationGateway, SessionFeed};
use crate::protocol::ClientMessage;
use crate::storage::{GitHistory, History, Journal, JournalError};

/// Where checkpoints go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryMode {
    /// Commit the data file to the git repository containing it
    Git,
    #[serde(alias = "off", alias = "none")]
    Disabled,
}

/// Server configuration.
///
/// Loaded by [`ServerConfig::from_env`]: built-in defaults overlaid with
/// `TRACKER_*` environment variables, e.g. `TRACKER_BIND_ADDR`,
/// `TRACKER_DATA_FILE`, `TRACKER_HISTORY=off`, `TRACKER_COMMENT_TEXT=reject`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: String,
    /// JSON file holding the whole collection
    pub data_file: PathBuf,
    pub history: HistoryMode,
    /// Snapshot frames buffered per session
    pub broadcast_capacity: usize,
    /// Pending commands before sessions wait to enqueue
    pub command_queue_capacity: usize,
    /// Treatment of `addComment` without text
    pub comment_text: CommentTextPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            data_file: PathBuf::from("issues.json"),
            history: HistoryMode::Git,
            broadcast_capacity: 256,
            command_queue_capacity: 1024,
            comment_text: CommentTextPolicy::StoreEmpty,
        }
    }
}

impl ServerConfig {
    /// Config for tests: given data file, no git, small buffers.
    pub fn for_testing(bind_addr: impl Into<String>, data_file: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            data_file: data_file.into(),
            history: HistoryMode::Disabled,
            broadcast_capacity: 64,
            command_queue_capacity: 64,
            comment_text: CommentTextPolicy::StoreEmpty,
        }
    }

    /// Defaults overlaid with `TRACKER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// Provider chain behind [`from_env`](Self::from_env), exposed so callers
    /// can merge further providers on top.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default())).merge(Env::prefixed("TRACKER_"))
    }

    /// Extract and validate a config from any provider chain.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::invalid("broadcast_capacity", "must be positive"));
        }
        if self.command_queue_capacity == 0 {
            return Err(ConfigError::invalid("command_queue_capacity", "must be positive"));
        }
        Ok(())
    }

    fn history_backend(&self) -> History {
        match self.history {
            HistoryMode::Git => History::Git(GitHistory::for_file(&self.data_file)),
            HistoryMode::Disabled => History::Disabled,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidValue { field, reason }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Journal(#[from] JournalError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Server statistics.
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    pub total_connections: u64,
    pub active_connections: u64,
    /// Text frames received from clients
    pub total_messages: u64,
    /// Frames that did not decode as a client request
    pub rejected_messages: u64,
}

pub struct SyncServer {
    config: ServerConfig,
    gateway: GatewayHandle,
    broadcast: Arc<BroadcastGroup>,
    stats: Arc<RwLock<ServerStats>>,
    gateway_task: JoinHandle<()>,
}

impl SyncServer {
    /// Load (or initialize) the data file and start the gateway.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn open(config: ServerConfig) -> Result<Self, ServerError> {
        let loaded = IssueStore::load(&config.data_file);
        let store = loaded.store.with_comment_policy(config.comment_text);
        let journal = Journal::new(&config.data_file, config.history_backend());

        if loaded.needs_init {
            journal.initialize(store.snapshot()).await?;
            log::info!("Initialized {}", config.data_file.display());
        }

        let broadcast = Arc::new(BroadcastGroup::new(config.broadcast_capacity));
        let gateway = MutationGateway::new(store, journal, broadcast.clone());
        let (gateway, gateway_task) = gateway.spawn(config.command_queue_capacity);

        Ok(Self {
            config,
            gateway,
            broadcast,
            stats: Arc::new(RwLock::new(ServerStats::default())),
            gateway_task,
        })
    }

    /// Bind the configured address and serve until the listener fails.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!("Issue tracker listening on ws://{}", listener.local_addr()?);
        self.serve(listener).await
    }

    /// Accept loop over an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("New TCP connection from {addr}");

            let gateway = self.gateway.clone();
            let broadcast = self.broadcast.clone();
            let stats = self.stats.clone();

            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, addr, gateway, broadcast, stats).await {
                    log::error!("Connection error from {addr}: {e}");
                }
            });
        }
    }

    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        gateway: GatewayHandle,
        broadcast: Arc<BroadcastGroup>,
        stats: Arc<RwLock<ServerStats>>,
    ) -> Result<(), ServerError> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let session = SessionInfo::new(addr);
        let session_id = session.session_id;
        let SessionFeed { snapshot, mut updates } = gateway.connect(session).await?;

        {
            let mut s = stats.write().await;
            s.total_connections += 1;
            s.active_connections += 1;
        }
        log::info!("Session {session_id} connected from {addr}");

        let result = async {
            ws_sender.send(Message::text(snapshot.to_string())).await?;

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let decoded = ClientMessage::decode(text.as_str());
                                {
                                    let mut s = stats.write().await;
                                    s.total_messages += 1;
                                    if decoded.is_err() {
                                        s.rejected_messages += 1;
                                    }
                                }
                                match decoded {
                                    Ok(request) => gateway.apply(session_id, request).await?,
                                    Err(e) => log::warn!("Dropping frame from session {session_id}: {e}"),
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                ws_sender.send(Message::Pong(data)).await?;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                log::info!("Session {session_id} closed");
                                break;
                            }
                            Some(Ok(_)) => {
                                log::debug!("Ignoring non-text frame from session {session_id}");
                            }
                            Some(Err(e)) => {
                                log::error!("WebSocket error from {addr}: {e}");
                                break;
                            }
                        }
                    }

                    frame = updates.recv() => {
                        match frame {
                            Ok(frame) => ws_sender.send(Message::text(frame.to_string())).await?,
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                log::warn!("Session {session_id} lagged by {n} snapshots, resuming at the oldest retained");
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
            Ok::<(), ServerError>(())
        }
        .await;

        broadcast.remove_session(&session_id).await;
        stats.write().await.active_connections -= 1;
        result
    }

    pub async fn stats(&self) -> ServerStats {
        self.stats.read().await.clone()
    }

    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    /// Handle for submitting commands in-process.
    pub fn gateway(&self) -> &GatewayHandle {
        &self.gateway
    }

    pub fn broadcast_group(&self) -> &Arc<BroadcastGroup> {
        &self.broadcast
    }
}

impl Drop for SyncServer {
    fn drop(&mut self) {
        self.gateway_task.abort();
    }
}
