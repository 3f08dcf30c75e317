//! STREAM socket: raw byte-stream passthrough, no ZMP handshake.
//!
//! Unlike every other socket type in this crate, STREAM never frames its
//! payload and never exchanges HELLO/READY: the bytes a peer writes arrive
//! at `recv()` verbatim, and whatever is passed to `send()` goes out on the
//! wire unmodified. This is the escape hatch for talking to non-ZMP peers
//! (plain HTTP, raw TCP protocols, etc.) through the same connection/
//! reconnect/event machinery as the framed socket types.
//!
//! # Message shape
//!
//! Every `recv()` yields exactly two frames: `[routing_id, data]`, mirroring
//! libzmq's `ZMQ_STREAM` convention:
//! - Immediately after the connection is established, one synthetic event
//!   frame `[routing_id, empty]` is delivered (connect notification).
//! - Subsequent frames carry whatever bytes arrived: `[routing_id, bytes]`.
//! - When the peer closes the connection, one final `[routing_id, empty]`
//!   event frame is delivered (disconnect notification), after which
//!   `recv()` returns `Ok(None)`.
//!
//! `send()` takes the same two-frame shape. Sending an empty data frame
//! closes the connection to that peer (matching libzmq's "write empty
//! message to close" convention); any non-empty frame is written to the
//! wire as-is, with no ZMP header.

use bytes::Bytes;
use compio::io::{AsyncRead, AsyncWrite};
use compio::net::{TcpListener, TcpStream};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};
use zlink_core::alloc::IoArena;
use zlink_core::options::SocketOptions;

static PEER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Connect/disconnect synthetic events queued for delivery on the next
/// `recv()` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingEvent {
    Connect,
    Disconnect,
}

/// A STREAM socket: one raw, unframed byte-stream connection.
///
/// Like the other single-connection socket types in this crate
/// ([`crate::router::RouterSocket`], [`crate::pull::PullSocket`]), `bind()`
/// accepts the first connection and hands back the listener so the caller
/// can accept more. Each accepted connection gets its own generated
/// `routing_id` (STREAM has no handshake to carry a peer-supplied identity).
pub struct StreamSocket<S = TcpStream>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream: Option<S>,
    arena: IoArena,
    routing_id: Bytes,
    options: SocketOptions,
    /// Events not yet delivered to the caller via `recv()`.
    pending_events: Vec<PendingEvent>,
    /// Set once the disconnect event has been queued, so a second EOF read
    /// (or a caller that keeps calling `recv()` after close) never queues
    /// a duplicate disconnect event.
    disconnect_notified: bool,
}

impl<S> StreamSocket<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-connected stream as a STREAM socket.
    ///
    /// No handshake is performed: the first `recv()` immediately yields the
    /// synthetic connect event.
    pub fn new(stream: S) -> Self {
        Self::with_options(stream, SocketOptions::default())
    }

    /// Wrap an already-connected stream with custom socket options.
    pub fn with_options(stream: S, options: SocketOptions) -> Self {
        let peer_id = PEER_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let routing_id = Bytes::from(format!("stream-{}", peer_id));
        debug!(?routing_id, "[STREAM] New raw connection");
        Self {
            stream: Some(stream),
            arena: IoArena::new(),
            routing_id,
            options,
            pending_events: vec![PendingEvent::Connect],
            disconnect_notified: false,
        }
    }

    /// The routing-id this connection is addressed by (own generated, or
    /// assigned by the caller via [`Self::with_routing_id`]).
    #[inline]
    #[must_use]
    pub fn routing_id(&self) -> &Bytes {
        &self.routing_id
    }

    /// Override the auto-generated routing-id, e.g. to carry an
    /// application-level peer name across reconnects.
    #[must_use]
    pub fn with_routing_id(mut self, routing_id: impl Into<Bytes>) -> Self {
        self.routing_id = routing_id.into();
        self
    }

    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn queue_disconnect(&mut self) {
        if !self.disconnect_notified {
            self.disconnect_notified = true;
            self.pending_events.push(PendingEvent::Disconnect);
        }
    }

    /// Receive the next `[routing_id, data]` frame pair.
    ///
    /// Returns `Ok(None)` only once the disconnect event has already been
    /// delivered and no further data can ever arrive.
    pub async fn recv(&mut self) -> io::Result<Option<Vec<Bytes>>> {
        if let Some(event) = self.pending_events.first().copied() {
            self.pending_events.remove(0);
            trace!(?event, routing_id = ?self.routing_id, "[STREAM] delivering synthetic event");
            return Ok(Some(vec![self.routing_id.clone(), Bytes::new()]));
        }

        let Some(stream) = self.stream.as_mut() else {
            // Connection already torn down and the disconnect event already
            // delivered above — nothing more will ever arrive.
            return Ok(None);
        };

        let slab = self.arena.alloc_mut(self.options.read_buffer_size);
        use compio::buf::BufResult;
        let BufResult(result, slab) = AsyncRead::read(stream, slab).await;
        let n = result?;

        if n == 0 {
            trace!(routing_id = ?self.routing_id, "[STREAM] peer closed");
            self.stream = None;
            self.queue_disconnect();
            return Ok(Some(vec![self.routing_id.clone(), Bytes::new()]));
        }

        let data = slab.freeze();
        Ok(Some(vec![self.routing_id.clone(), data]))
    }

    /// Send `[routing_id, data]`. `routing_id` is ignored beyond validating
    /// the frame shape (this socket has exactly one peer); an empty `data`
    /// frame closes the connection, matching libzmq's STREAM convention.
    pub async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        let data = msg.into_iter().nth(1).unwrap_or_default();

        if data.is_empty() {
            trace!(routing_id = ?self.routing_id, "[STREAM] empty frame: closing connection");
            self.stream = None;
            self.queue_disconnect();
            return Ok(());
        }

        let Some(stream) = self.stream.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "STREAM peer already disconnected",
            ));
        };

        use compio::buf::BufResult;
        let BufResult(result, _) = AsyncWrite::write(stream, data).await;
        if result.is_err() {
            self.stream = None;
        }
        result?;
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn options(&self) -> &SocketOptions {
        &self.options
    }
}

impl StreamSocket<TcpStream> {
    /// Bind to an address and accept the first connection, with no
    /// handshake — the connection is usable immediately.
    pub async fn bind(addr: impl compio::net::ToSocketAddrsAsync) -> io::Result<(TcpListener, Self)> {
        let listener = TcpListener::bind(addr).await?;
        let (stream, _) = listener.accept().await?;
        let socket = Self::from_tcp(stream)?;
        Ok((listener, socket))
    }

    /// Connect to a raw TCP peer; no handshake is attempted.
    pub async fn connect(addr: impl compio::net::ToSocketAddrsAsync) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_tcp(stream)
    }

    /// Wrap a TCP stream as a STREAM socket, enabling `TCP_NODELAY`.
    pub fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        zlink_core::tcp::enable_tcp_nodelay(&stream)?;
        Ok(Self::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[compio::test]
    async fn connect_event_then_data_then_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_task = compio::runtime::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut peer = StreamSocket::from_tcp(stream).unwrap();
            peer.send(vec![peer.routing_id().clone(), Bytes::from_static(b"hello")])
                .await
                .unwrap();
        });

        let mut sock = StreamSocket::connect(addr).await.unwrap();

        let connect_evt = sock.recv().await.unwrap().unwrap();
        assert_eq!(connect_evt[1], Bytes::new());

        let data = sock.recv().await.unwrap().unwrap();
        assert_eq!(&data[1][..], b"hello");

        server_task.await.unwrap();

        let disconnect_evt = sock.recv().await.unwrap().unwrap();
        assert_eq!(disconnect_evt[1], Bytes::new());
        assert!(!sock.is_connected());

        assert!(sock.recv().await.unwrap().is_none());
    }

    #[compio::test]
    async fn empty_send_closes_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_task = compio::runtime::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            StreamSocket::from_tcp(stream).unwrap()
        });

        let mut sock = StreamSocket::connect(addr).await.unwrap();
        let _server = server_task.await.unwrap();
        let _ = sock.recv().await; // drain connect event

        sock.send(vec![sock.routing_id().clone(), Bytes::new()])
            .await
            .unwrap();
        assert!(!sock.is_connected());
    }
}
