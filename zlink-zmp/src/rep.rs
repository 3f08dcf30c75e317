//! # REP Socket Implementation
//!
//! The REP socket provides strict reply patterns enforced by a small state
//! machine layered over the direct-stream [`Engine`].
//!
//! ## Features
//!
//! - **Stateful Replies**: Must alternate `recv()` then `send()`
//! - **Multipart**: Full support for ZeroMQ multipart messages
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use zlink_zmp::rep::RepSocket;
//! use compio::net::TcpListener;
//! use bytes::Bytes;
//!
//! #[compio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let listener = TcpListener::bind("127.0.0.1:5555").await?;
//!     let (stream, _) = listener.accept().await?;
//!     let mut socket = RepSocket::from_tcp(stream).await?;
//!
//!     loop {
//!         if let Some(request) = socket.recv().await? {
//!             socket.send(vec![Bytes::from("OK")]).await?;
//!         }
//!     }
//! }
//! ```
//!
//! ## State Machine
//!
//! ```text
//! AwaitingRequest → recv() → ReadyToReply → send() → AwaitingRequest
//! ```
//!
//! Calling `send()` before `recv()` returns an error.

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

/// State of the REP socket state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepState {
    /// Waiting for the next request.
    AwaitingRequest,
    /// A request has been received; must `send()` before receiving again.
    ReadyToReply,
}

/// REP socket for strict reply patterns.
pub struct RepSocket<S = TcpStream>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    base: Engine<S>,
    frames: SmallVec<[Bytes; 4]>,
    state: RepState,
}

impl<S> RepSocket<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new REP socket from a stream.
    pub async fn new(stream: S) -> io::Result<Self> {
        Self::with_options(stream, BufferConfig::small(), SocketOptions::default()).await
    }

    /// Create a new REP socket with custom buffer configuration.
    pub async fn with_config(stream: S, config: BufferConfig) -> io::Result<Self> {
        Self::with_options(stream, config, SocketOptions::default()).await
    }

    /// Create a new REP socket with custom buffer configuration and socket options.
    pub async fn with_options(
        mut stream: S,
        config: BufferConfig,
        options: SocketOptions,
    ) -> io::Result<Self> {
        debug!("[REP] Creating new REP socket");

        let handshake_result = perform_handshake_with_timeout(
            &mut stream,
            SocketType::Rep,
            None,
            Some(options.handshake_timeout),
        )
        .await
        .map_err(|e| io::Error::other(format!("Handshake failed: {}", e)))?;

        debug!(
            peer_identity = ?handshake_result.peer_identity,
            peer_socket_type = ?handshake_result.peer_socket_type,
            "[REP] Handshake complete"
        );

        let options = config.apply_to(options);
        Ok(Self {
            base: Engine::new(stream, SocketType::Rep, options),
            frames: SmallVec::new(),
            state: RepState::AwaitingRequest,
        })
    }

    /// Receive a request message.
    ///
    /// The envelope tracking is implicit: a successful `recv()` unlocks the
    /// following `send()`.
    pub async fn recv(&mut self) -> io::Result<Option<Vec<Bytes>>> {
        trace!("[REP] Waiting for request");

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
                            trace!("[REP] Received {} frames", msg.len());
                            self.state = RepState::ReadyToReply;
                            self.base.send_read_credit().await?;
                            return Ok(Some(msg));
                        }
                    }
                    None => break,
                }
            }

            let n = self.base.read_raw_with_heartbeat().await?;
            if n == 0 {
                trace!("[REP] Connection closed");
                return Ok(None);
            }
        }
    }

    /// Send a reply message.
    ///
    /// # Errors
    ///
    /// Returns an error if called without a prior `recv()`.
    pub async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        if self.state != RepState::ReadyToReply {
            return Err(io::Error::other(
                "REP socket: send() called without a preceding recv()",
            ));
        }

        trace!("[REP] Sending {} frames", msg.len());

        self.base.reserve_send_slot()?;

        self.base.write_buf.clear();
        encode_multipart(&msg, &mut self.base.write_buf);
        self.base.write_from_buf().await?;

        self.state = RepState::AwaitingRequest;
        trace!("[REP] Reply sent successfully");
        Ok(())
    }

    /// Get the current state of the REP socket.
    pub fn state(&self) -> RepState {
        self.state
    }

    /// Get a reference to the socket options.
    #[inline]
    pub fn options(&self) -> &SocketOptions {
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
    pub fn socket_type(&self) -> SocketType {
        SocketType::Rep
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
impl RepSocket<TcpStream> {
    /// Bind to an address and accept the first connection.
    pub async fn bind(
        addr: impl compio::net::ToSocketAddrsAsync,
    ) -> io::Result<(compio::net::TcpListener, Self)> {
        let listener = compio::net::TcpListener::bind(addr).await?;
        let (stream, _) = listener.accept().await?;
        let socket = Self::from_tcp(stream).await?;
        Ok((listener, socket))
    }

    /// Create a new REP socket from a TCP stream with TCP_NODELAY enabled.
    pub async fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        Self::from_tcp_with_config(stream, BufferConfig::small()).await
    }

    /// Create a new REP socket from a TCP stream with TCP_NODELAY and custom config.
    pub async fn from_tcp_with_config(stream: TcpStream, config: BufferConfig) -> io::Result<Self> {
        zlink_core::tcp::enable_tcp_nodelay(&stream)?;
        debug!("[REP] TCP_NODELAY enabled");
        Self::with_options(stream, config, SocketOptions::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rep_state_transitions() {
        assert_eq!(RepState::AwaitingRequest, RepState::AwaitingRequest);
        assert_ne!(RepState::AwaitingRequest, RepState::ReadyToReply);
    }
}
