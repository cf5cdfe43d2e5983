//! tabcollab Client -- real-time collaboration connector for a tablature
//! editor.
//!
//! Re-exports all internal modules so integration tests and the binary can
//! reach the client, its background tasks, the applier and config types.

pub mod applier;
pub mod client;
pub mod config;
pub mod identity;
pub mod notes;
pub mod queues;
pub mod receiver_task;
pub mod sender_task;
pub mod session;

pub use applier::{ApplyError, NotificationHandler, RemoteEventApplier};
pub use client::{CollabClient, SharedDocument};
pub use config::ClientConfig;
pub use identity::Color;
pub use queues::{EventQueues, OverflowPolicy, QueueFull};
pub use session::{Session, SessionHandle, SessionState};

use std::path::PathBuf;

use tabcollab_protocol::ProtocolError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("cannot connect to {addr}: {reason}")]
    ConnectFailed { addr: String, reason: String },
    #[error("server refused login: {0}")]
    AuthFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("not connected")]
    NotConnected,
    #[error("no handshake reply within {0} ms")]
    HandshakeTimeout(u64),
    #[error("server closed the link during handshake")]
    HandshakeClosed,
    #[error("invalid session transition {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
    #[error(transparent)]
    Queue(#[from] QueueFull),
}

pub type Result<T> = std::result::Result<T, ClientError>;

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs_or_home() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn dirs_or_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}
