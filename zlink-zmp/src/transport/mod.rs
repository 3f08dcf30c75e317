//! Byte-stream transports beyond plain TCP/IPC.
//!
//! `Engine<S>` (see `crate::engine`) is generic over any
//! `S: AsyncRead + AsyncWrite + Unpin`; that bound *is* this codebase's
//! transport abstraction rather than a separate trait object. This module
//! supplies two stream wrappers that compose with it: a TLS layer (`tls`,
//! feature-gated) and a framed WebSocket layer (`ws`, feature-gated), each
//! implementing `AsyncRead`/`AsyncWrite` so they drop straight into
//! `Engine<TlsStream<TcpStream>>` / `Engine<WsStream<TcpStream>>` /
//! `Engine<WsStream<TlsStream<TcpStream>>>` (wss) with no changes to the
//! engine itself.

#[cfg(feature = "tls")]
pub mod tls;
#[cfg(feature = "ws")]
pub mod ws;

/// Error categories shared by every transport: every I/O error is
/// `cancelled`, `normal`, `recoverable`, or `fatal`, independent of which
/// transport produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The operation was cancelled by `terminate()`; ignore.
    Cancelled,
    /// The peer closed the connection cleanly.
    Normal,
    /// Timeout or a transient OS resource error; the session may retry.
    Recoverable,
    /// A framing/protocol-level violation; the connection cannot continue.
    Fatal,
}

/// Categorize a raw I/O error the way every transport in this crate does,
/// so the engine's error handling doesn't need to know which transport
/// produced the error.
#[must_use]
pub fn classify_io_error(err: &std::io::Error) -> TransportErrorKind {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::Interrupted => TransportErrorKind::Recoverable,
        ErrorKind::WouldBlock | ErrorKind::TimedOut => TransportErrorKind::Recoverable,
        ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe
        | ErrorKind::UnexpectedEof => TransportErrorKind::Normal,
        ErrorKind::InvalidData => TransportErrorKind::Fatal,
        _ => TransportErrorKind::Recoverable,
    }
}
