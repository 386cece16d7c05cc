//! WebSocket client for the issue tracker server.
//!
//! Keeps the latest snapshot flowing to the application as
//! [`ClientEvent::Snapshot`] and sends mutation requests. The server never
//! acknowledges a request; its effect shows up as the next snapshot.

use std::sync::Arc;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::{self, Message};
use tracker_core::{AddComment, CreateIssue, Issue, UpdateIssue};

use crate::protocol::{ClientMessage, ProtocolError, ServerMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Full collection; replaces whatever the client showed before
    Snapshot(Vec<Issue>),
    Disconnected,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Connect(#[from] tungstenite::Error),
    #[error("not connected")]
    NotConnected,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub struct SyncClient {
    server_url: String,
    state: Arc<RwLock<ConnectionState>>,
    /// Frames for the writer task
    outgoing_tx: Option<mpsc::Sender<String>>,
    event_tx: mpsc::Sender<ClientEvent>,
    event_rx: Option<mpsc::Receiver<ClientEvent>>,
}

impl SyncClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            server_url: server_url.into(),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            outgoing_tx: None,
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<ClientEvent>> {
        self.event_rx.take()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Open the WebSocket and start the reader/writer tasks.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        *self.state.write().await = ConnectionState::Connecting;

        let ws_stream = match tokio_tungstenite::connect_async(self.server_url.as_str()).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(e.into());
            }
        };
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::channel::<String>(256);
        self.outgoing_tx = Some(out_tx);

        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if ws_writer.send(Message::text(text)).await.is_err() {
                    return;
                }
            }
            let _ = ws_writer.close().await;
        });

        *self.state.write().await = ConnectionState::Connected;

        let event_tx = self.event_tx.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match ServerMessage::decode(text.as_str()) {
                        Ok(ServerMessage::Issues(issues)) => {
                            if event_tx.send(ClientEvent::Snapshot(issues)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => log::warn!("Undecodable server frame: {e}"),
                    },
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            *state.write().await = ConnectionState::Disconnected;
            let _ = event_tx.send(ClientEvent::Disconnected).await;
        });

        log::debug!("Connected to {}", self.server_url);
        Ok(())
    }

    /// Close the connection; the reader reports `Disconnected` once the
    /// server acknowledges.
    pub fn disconnect(&mut self) {
        self.outgoing_tx = None;
    }

    pub async fn send(&self, msg: &ClientMessage) -> Result<(), ClientError> {
        let tx = self.outgoing_tx.as_ref().ok_or(ClientError::NotConnected)?;
        tx.send(msg.encode()?).await.map_err(|_| ClientError::NotConnected)
    }

    pub async fn create_issue(&self, input: CreateIssue) -> Result<(), ClientError> {
        self.send(&ClientMessage::CreateIssue(input)).await
    }

    pub async fn update_issue(&self, patch: UpdateIssue) -> Result<(), ClientError> {
        self.send(&ClientMessage::UpdateIssue(patch)).await
    }

    pub async fn add_comment(&self, input: AddComment) -> Result<(), ClientError> {
        self.send(&ClientMessage::AddComment(input)).await
    }
}
