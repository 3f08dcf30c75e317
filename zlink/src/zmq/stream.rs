//! STREAM socket implementation.
//!
//! STREAM sockets carry raw bytes with no ZMP framing and no handshake,
//! for talking to non-zlink peers through the same connect/reconnect
//! surface as the other socket types. See [`zlink_zmp::StreamSocket`] for
//! the full message-shape contract (`[routing_id, data]`, synthetic
//! connect/disconnect events).

use bytes::Bytes;
use compio::net::{TcpListener, TcpStream};
use zlink_core::options::SocketOptions;
use zlink_zmp::StreamSocket as InternalStream;
use std::io;

/// A STREAM socket for raw, unframed byte-stream passthrough.
///
/// ## Example
///
/// ```rust,no_run
/// use zlink::zmq::StreamSocket;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (listener, mut socket) = StreamSocket::bind("127.0.0.1:5555").await?;
///
/// // First recv() always yields the synthetic connect event.
/// let connect_event = socket.recv().await?.expect("peer connected");
/// assert!(connect_event[1].is_empty());
/// # Ok(())
/// # }
/// ```
pub struct StreamSocket<S = TcpStream>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    inner: InternalStream<S>,
}

impl StreamSocket<TcpStream> {
    /// Bind to an address and accept the first connection.
    pub async fn bind(addr: impl compio::net::ToSocketAddrsAsync) -> io::Result<(TcpListener, Self)> {
        let (listener, inner) = InternalStream::bind(addr).await?;
        Ok((listener, Self { inner }))
    }

    /// Connect to a raw peer; no handshake is attempted.
    pub async fn connect(addr: impl compio::net::ToSocketAddrsAsync) -> io::Result<Self> {
        Ok(Self {
            inner: InternalStream::connect(addr).await?,
        })
    }

    /// Wrap an existing TCP stream, enabling `TCP_NODELAY`.
    pub fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        Ok(Self {
            inner: InternalStream::from_tcp(stream)?,
        })
    }
}

impl<S> StreamSocket<S>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    /// Wrap any already-connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            inner: InternalStream::new(stream),
        }
    }

    /// Wrap any already-connected stream with custom options.
    pub fn with_options(stream: S, options: SocketOptions) -> Self {
        Self {
            inner: InternalStream::with_options(stream, options),
        }
    }

    /// The routing-id this connection is addressed by.
    #[must_use]
    pub fn routing_id(&self) -> &Bytes {
        self.inner.routing_id()
    }

    /// Whether the underlying connection is still open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// Receive the next `[routing_id, data]` frame pair.
    pub async fn recv(&mut self) -> io::Result<Option<Vec<Bytes>>> {
        self.inner.recv().await
    }

    /// Send `[routing_id, data]`; an empty `data` frame closes the
    /// connection.
    pub async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        self.inner.send(msg).await
    }
}
