//! Configuration types for tabcollab.
//! Parsed from ~/.tabcollab/config.toml.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use tabcollab_protocol::record::kind;
use tabcollab_protocol::PROTOCOL_V2;

use crate::queues::OverflowPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub timing: TimingSection,
    #[serde(default)]
    pub queue: QueueSection,
    #[serde(default)]
    pub protocol: ProtocolSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSection {
    /// Kind tag of the login record (`TUXGUITAR` or `ARGO`).
    #[serde(default = "default_handshake_kind")]
    pub handshake_kind: String,
    /// Zero disables the connect timeout.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            handshake_kind: default_handshake_kind(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSection {
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    #[serde(default = "default_disconnect_grace_ms")]
    pub disconnect_grace_ms: u64,
    /// Zero waits for the handshake reply indefinitely.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    #[serde(default = "default_task_join_timeout_ms")]
    pub task_join_timeout_ms: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
            disconnect_grace_ms: default_disconnect_grace_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            task_join_timeout_ms: default_task_join_timeout_ms(),
        }
    }
}

impl TimingSection {
    pub fn flush_interval(&self) -> Duration {
        // A zero period would make the interval panic.
        Duration::from_millis(self.flush_interval_ms.max(1))
    }

    pub fn disconnect_grace(&self) -> Duration {
        Duration::from_millis(self.disconnect_grace_ms)
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        (self.handshake_timeout_ms > 0).then(|| Duration::from_millis(self.handshake_timeout_ms))
    }

    pub fn task_join_timeout(&self) -> Duration {
        Duration::from_millis(self.task_join_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSection {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            overflow: OverflowPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolSection {
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for ProtocolSection {
    fn default() -> Self {
        Self {
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

// Default value functions
fn default_handshake_kind() -> String {
    kind::TUXGUITAR.into()
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_flush_interval_ms() -> u64 {
    PROTOCOL_V2.flush_interval_ms
}
fn default_disconnect_grace_ms() -> u64 {
    PROTOCOL_V2.disconnect_grace_ms
}
fn default_handshake_timeout_ms() -> u64 {
    PROTOCOL_V2.handshake_timeout_ms
}
fn default_task_join_timeout_ms() -> u64 {
    2000
}
fn default_capacity() -> usize {
    1024
}
fn default_max_frame_bytes() -> usize {
    PROTOCOL_V2.max_frame_bytes
}

impl ClientConfig {
    /// Load config from file, or fall back to defaults if missing.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: ClientConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.client.connect_timeout_ms > 0)
            .then(|| Duration::from_millis(self.client.connect_timeout_ms))
    }
}
