//! # REQ Socket Implementation
//!
//! The REQ socket provides strict request-reply patterns with enforced
//! alternation, layered over the direct-stream [`Engine`].
//!
//! ## Features
//!
//! - **Strict Alternation**: Must alternate between `send()` and `recv()`
//! - **Multipart**: Full support for ZeroMQ multipart messages
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use zlink_zmp::req::ReqSocket;
//! use compio::net::TcpStream;
//! use bytes::Bytes;
//!
//! #[compio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stream = TcpStream::connect("127.0.0.1:5555").await?;
//!     let mut socket = ReqSocket::from_tcp(stream).await?;
//!
//!     socket.send(vec![Bytes::from("Hello")]).await?;
//!     let response = socket.recv().await?;
//!
//!     socket.send(vec![Bytes::from("World")]).await?;
//!     let response = socket.recv().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## State Machine
//!
//! ```text
//! Idle → send() → AwaitingReply → recv() → Idle
//! ```
//!
//! Calling `send()` twice without `recv()` returns an error.

use crate::config::BufferConfig;
use crate::engine::Engine;
use crate::codec::encode_multipart;
use crate::{handshake::perform_handshake_with_timeout, session::SocketType};
use bytes::Bytes;
use compio::io::{AsyncRead, AsyncWrite};
use compio::net::TcpStream;
use smallvec::SmallVec;
use std::io;
use tracing::{debug, trace};
use zlink_core::endpoint::Endpoint;
use zlink_core::options::SocketOptions;

/// State of the REQ socket state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReqState {
    /// Ready to send a request.
    Idle,
    /// Waiting for a reply after sending a request.
    AwaitingReply,
}

/// REQ socket for strict request-reply patterns.
pub struct ReqSocket<S = TcpStream>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    base: Engine<S>,
    frames: SmallVec<[Bytes; 4]>,
    state: ReqState,
}

impl<S> ReqSocket<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new REQ socket from a stream.
    pub async fn new(stream: S) -> io::Result<Self> {
        Self::with_options(stream, BufferConfig::small(), SocketOptions::default()).await
    }

    /// Create a new REQ socket with custom buffer configuration.
    pub async fn with_config(stream: S, config: BufferConfig) -> io::Result<Self> {
        Self::with_options(stream, config, SocketOptions::default()).await
    }

    /// Create a new REQ socket with custom socket options.
    ///
    /// Buffer sizes are taken from `options` directly (via
    /// [`BufferConfig::default`]'s fields being overridden by `apply_to`),
    /// so callers don't need to construct a separate [`BufferConfig`].
    pub async fn with_options(stream: S, options: SocketOptions) -> io::Result<Self> {
        Self::with_config_and_options(stream, BufferConfig::small(), options).await
    }

    /// Create a new REQ socket with both custom buffer configuration and options.
    pub async fn with_config_and_options(
        mut stream: S,
        config: BufferConfig,
        options: SocketOptions,
    ) -> io::Result<Self> {
        debug!("[REQ] Creating new REQ socket");

        let handshake_result = perform_handshake_with_timeout(
            &mut stream,
            SocketType::Req,
            None,
            Some(options.handshake_timeout),
        )
        .await
        .map_err(|e| io::Error::other(format!("Handshake failed: {}", e)))?;

        debug!(
            peer_identity = ?handshake_result.peer_identity,
            peer_socket_type = ?handshake_result.peer_socket_type,
            "[REQ] Handshake complete"
        );

        let options = config.apply_to(options);
        Ok(Self {
            base: Engine::new(stream, SocketType::Req, options),
            frames: SmallVec::new(),
            state: ReqState::Idle,
        })
    }

    /// Send a request message.
    ///
    /// # Errors
    ///
    /// Returns an error if called while awaiting a reply (must call `recv()` first).
    pub async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        if self.state != ReqState::Idle {
            return Err(io::Error::other(
                "REQ socket: send() called while awaiting a reply",
            ));
        }

        trace!("[REQ] Sending {} frames", msg.len());

        self.base.reserve_send_slot()?;

        self.base.write_buf.clear();
        encode_multipart(&msg, &mut self.base.write_buf);
        self.base.write_from_buf().await?;

        self.state = ReqState::AwaitingReply;
        trace!("[REQ] Request sent successfully");
        Ok(())
    }

    /// Receive a reply message.
    ///
    /// # Errors
    ///
    /// Returns `Ok(None)` if called before a request has been sent.
    pub async fn recv(&mut self) -> io::Result<Option<Vec<Bytes>>> {
        if self.state != ReqState::AwaitingReply {
            trace!("[REQ] recv() called without a preceding send()");
            return Ok(None);
        }

        trace!("[REQ] Waiting for reply");

        loop {
            loop {
                match self.base.decoder.decode(&mut self.base.recv)? {
                    Some(frame) => {
                        if frame.is_control() {
                            self.base.handle_control_frame(&frame.payload).await?;
                            continue;
                        }

                        let more = frame.more();
                        self.frames.push(frame.payload);

                        if !more {
                            let msg: Vec<Bytes> = self.frames.drain(..).collect();
                            trace!("[REQ] Received {} frames", msg.len());
                            self.state = ReqState::Idle;
                            self.base.send_read_credit().await?;
                            return Ok(Some(msg));
                        }
                    }
                    None => break,
                }
            }

            let n = self.base.read_raw_with_heartbeat().await?;
            if n == 0 {
                trace!("[REQ] Connection closed");
                self.state = ReqState::Idle;
                return Ok(None);
            }
        }
    }

    /// Get the current state of the REQ socket.
    pub fn state(&self) -> ReqState {
        self.state
    }

    /// Get a reference to the socket options.
    #[inline]
    pub const fn options(&self) -> &SocketOptions {
        &self.base.options
    }

    /// Get a mutable reference to the socket options.
    #[inline]
    pub fn options_mut(&mut self) -> &mut SocketOptions {
        &mut self.base.options
    }

    /// Set socket options (builder-style).
    #[inline]
    pub fn set_options(&mut self, options: SocketOptions) {
        self.base.options = options;
    }

    /// Get the socket type.
    #[inline]
    pub const fn socket_type() -> SocketType {
        SocketType::Req
    }

    /// Get the endpoint this socket is connected/bound to, if available.
    #[inline]
    pub fn last_endpoint(&self) -> Option<&Endpoint> {
        self.base.last_endpoint()
    }

    /// Check if the last received message has more frames coming.
    #[inline]
    pub fn has_more(&self) -> bool {
        self.base.has_more()
    }

    /// Get the event state of the socket.
    #[inline]
    pub fn events(&self) -> u32 {
        self.base.events()
    }
}

// Specialized implementation for TCP streams to enable TCP_NODELAY.
impl ReqSocket<TcpStream> {
    /// Connect to a REP peer.
    pub async fn connect(addr: impl compio::net::ToSocketAddrsAsync) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_tcp(stream).await
    }

    /// Create a new REQ socket from a TCP stream with TCP_NODELAY enabled.
    pub async fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        Self::from_tcp_with_config(stream, BufferConfig::small()).await
    }

    /// Create a new REQ socket from a TCP stream with TCP_NODELAY and custom config.
    pub async fn from_tcp_with_config(stream: TcpStream, config: BufferConfig) -> io::Result<Self> {
        zlink_core::tcp::enable_tcp_nodelay(&stream)?;
        debug!("[REQ] TCP_NODELAY enabled");
        Self::with_config_and_options(stream, config, SocketOptions::default()).await
    }

    /// Create a new REQ socket from a TCP stream with TCP_NODELAY and custom options.
    pub async fn from_tcp_with_options(
        stream: TcpStream,
        options: SocketOptions,
    ) -> io::Result<Self> {
        zlink_core::tcp::enable_tcp_nodelay(&stream)?;
        debug!("[REQ] TCP_NODELAY enabled");
        Self::with_config_and_options(stream, BufferConfig::small(), options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_req_state_machine() {
        assert_eq!(ReqState::Idle, ReqState::Idle);
        assert_ne!(ReqState::Idle, ReqState::AwaitingReply);
    }
}
