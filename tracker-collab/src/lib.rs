//! # tracker-collab: live issue synchronization over WebSocket
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     WebSocket      ┌─────────────────┐
//! │ SyncClient  │ ◄────────────────► │   SyncServer    │
//! │ (per user)  │    JSON frames     │ (session tasks) │
//! └─────────────┘                    └────────┬────────┘
//!                                             │ Command
//!                                             ▼
//!                                    ┌─────────────────┐
//!                                    │ MutationGateway │
//!                                    └──┬──────┬────┬──┘
//!                                       │      │    │
//!                             IssueStore│ Journal   │BroadcastGroup
//!                                 (apply)  (persist) (fan-out)
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: JSON envelope for client requests and `issues` snapshots
//! - [`gateway`]: apply → persist → broadcast, one command at a time
//! - [`broadcast`]: whole-snapshot fan-out to every session
//! - [`storage`]: data file rewrite plus git checkpoints
//! - [`server`]: WebSocket accept loop and per-session tasks
//! - [`client`]: WebSocket client

pub mod protocol;
pub mod broadcast;
pub mod gateway;
pub mod storage;
pub mod server;
pub mod client;

// Re-exports for convenience
pub use protocol::{ClientMessage, ProtocolError, ServerMessage};
pub use broadcast::{BroadcastGroup, BroadcastStats, SessionInfo};
pub use gateway::{Command, Dispatch, GatewayError, GatewayHandle, MutationGateway, SessionFeed};
pub use storage::{GitHistory, History, HistoryError, HistoryLog, Journal, JournalError};
pub use server::{ConfigError, HistoryMode, ServerConfig, ServerError, ServerStats, SyncServer};
pub use client::{ClientError, ClientEvent, ConnectionState, SyncClient};
