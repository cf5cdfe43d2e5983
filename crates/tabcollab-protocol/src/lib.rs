//! tabcollab Protocol -- wire records, field codec, frame codec.
//!
//! TCP between client and collaboration server. One record per line:
//! `<kind>;<field1>;...;<fieldN>\n`.

pub mod codec;
pub mod record;
pub mod version;

pub use codec::{Frame, FrameCodec};
pub use record::{decode, encode, EventKind, Record};
pub use version::{ProtocolVersion, CURRENT_VERSION, PROTOCOL_V2};

/// Field separator (sourced from current version).
pub const SEPARATOR: char = CURRENT_VERSION.separator as char;

/// Frame terminator (sourced from current version).
pub const TERMINATOR: u8 = CURRENT_VERSION.terminator;

/// Maximum frame size (sourced from current version).
pub const MAX_FRAME_BYTES: usize = CURRENT_VERSION.max_frame_bytes;

/// Flush interval in milliseconds (sourced from current version).
pub const FLUSH_INTERVAL_MS: u64 = CURRENT_VERSION.flush_interval_ms;

/// Disconnect grace delay in milliseconds (sourced from current version).
pub const DISCONNECT_GRACE_MS: u64 = CURRENT_VERSION.disconnect_grace_ms;

/// Handshake response timeout in milliseconds (sourced from current version).
pub const HANDSHAKE_TIMEOUT_MS: u64 = CURRENT_VERSION.handshake_timeout_ms;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty frame")]
    EmptyFrame,
    #[error("empty event kind")]
    EmptyKind,
    #[error("frame is not valid utf-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("reserved character {ch:?} in {part}")]
    ReservedCharacter { ch: char, part: String },
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
