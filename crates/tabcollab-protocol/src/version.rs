//! Protocol versions -- named parameter sets for the collaboration wire.
//!
//! A version fixes the record layout, framing and the timing defaults a
//! client uses against a collaboration server. Client-local policy (queue
//! capacity, overflow behaviour) is NOT part of the version.

/// A protocol version: record layout, framing and timing defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    /// Version identifier. Monotonically increasing.
    pub id: u16,

    // -- Record layout --
    /// Field separator byte. The kind is always the first field.
    pub separator: u8,

    // -- Framing --
    /// Byte ending every record on the stream.
    pub terminator: u8,
    /// Largest accepted frame in bytes, terminator excluded.
    pub max_frame_bytes: usize,

    // -- Timing --
    /// Sender flush interval in milliseconds.
    pub flush_interval_ms: u64,
    /// Grace delay before closing the link on disconnect.
    pub disconnect_grace_ms: u64,
    /// Handshake response timeout in milliseconds. Zero means unbounded.
    pub handshake_timeout_ms: u64,
}

/// Version 2: kind first in both directions, newline framing.
pub const PROTOCOL_V2: ProtocolVersion = ProtocolVersion {
    id: 2,

    separator: b';',

    terminator: b'\n',
    max_frame_bytes: 4096,

    flush_interval_ms: 150,
    disconnect_grace_ms: 3000,
    handshake_timeout_ms: 10_000,
};

/// The version spoken by this crate.
pub const CURRENT_VERSION: &ProtocolVersion = &PROTOCOL_V2;
