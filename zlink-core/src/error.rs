//! Error types shared across the engine, session and transport layers.

use std::io;
use thiserror::Error;

/// The ZMP protocol-level error codes carried in an `ERROR` control frame.
///
/// Mirrors the wire values exactly; a peer that rejects a connection tells
/// us *why* using one of these codes instead of just closing the socket.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZmpErrorCode {
    #[error("invalid magic byte")]
    InvalidMagic = 0x01,
    #[error("protocol version mismatch")]
    VersionMismatch = 0x02,
    #[error("invalid flag combination")]
    FlagsInvalid = 0x03,
    #[error("body exceeds maximum frame size")]
    BodyTooLarge = 0x04,
    #[error("socket type incompatible with peer")]
    SocketTypeMismatch = 0x05,
    #[error("handshake timed out")]
    HandshakeTimeout = 0x06,
    #[error("internal error")]
    Internal = 0x7F,
}

impl ZmpErrorCode {
    /// Decode a wire byte into an error code, falling back to `Internal`
    /// for values the peer's version of the protocol doesn't define.
    #[must_use]
    pub fn from_wire(byte: u8) -> Self {
        match byte {
            0x01 => Self::InvalidMagic,
            0x02 => Self::VersionMismatch,
            0x03 => Self::FlagsInvalid,
            0x04 => Self::BodyTooLarge,
            0x05 => Self::SocketTypeMismatch,
            0x06 => Self::HandshakeTimeout,
            _ => Self::Internal,
        }
    }

    /// The byte this code is encoded as on the wire.
    #[must_use]
    pub const fn to_wire(self) -> u8 {
        self as u8
    }
}

/// Top-level error type for engine, session and socket operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// IO error during socket operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Protocol error reported by the peer or detected locally while
    /// decoding/encoding ZMP frames.
    #[error("protocol error: {0}")]
    Protocol(ZmpErrorCode),

    /// Handshake timeout
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(std::time::Duration),

    /// Heartbeat timeout: no HEARTBEAT_ACK within the configured TTL.
    #[error("heartbeat timed out after {0:?}")]
    HeartbeatTimeout(std::time::Duration),

    /// Invalid HELLO/READY control frame received
    #[error("invalid handshake frame: {0}")]
    InvalidHandshake(String),

    /// Invalid frame format
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Socket closed
    #[error("socket closed")]
    SocketClosed,

    /// Channel send error
    #[error("channel send error")]
    ChannelSend,

    /// Channel receive error
    #[error("channel receive error")]
    ChannelRecv,

    /// Peer disconnected
    #[error("peer disconnected: {0}")]
    PeerDisconnected(String),

    /// Invalid routing ID
    #[error("invalid routing id")]
    InvalidRoutingId,

    /// Message too large
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Subscription error
    #[error("subscription error: {0}")]
    Subscription(String),
}

/// Result type alias for engine/session operations.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Wrap a protocol-level error code.
    pub fn protocol(code: ZmpErrorCode) -> Self {
        Self::Protocol(code)
    }

    /// Create an invalid handshake error with a message
    pub fn invalid_handshake(msg: impl Into<String>) -> Self {
        Self::InvalidHandshake(msg.into())
    }

    /// Create an invalid frame error
    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        Self::InvalidFrame(msg.into())
    }

    /// Create a peer disconnected error
    pub fn peer_disconnected(peer_id: impl Into<String>) -> Self {
        Self::PeerDisconnected(peer_id.into())
    }

    /// Check if this error is recoverable (worth a reconnect attempt)
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            Self::SocketClosed | Self::PeerDisconnected(_) => true,
            Self::HandshakeTimeout(_) | Self::HeartbeatTimeout(_) => true,
            Self::ChannelSend | Self::ChannelRecv => false,
            Self::Protocol(_) | Self::InvalidHandshake(_) | Self::InvalidFrame(_) => false,
            _ => false,
        }
    }

    /// Check if this is a connection-lifecycle error (peer went away)
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::SocketClosed
                | Self::PeerDisconnected(_)
                | Self::HandshakeTimeout(_)
                | Self::HeartbeatTimeout(_)
        )
    }
}
