//! PAIR socket implementation.

use bytes::Bytes;
use compio::net::TcpStream;
use zlink_core::monitor::{create_monitor, SocketEvent, SocketEventSender, SocketMonitor};
use zlink_zmp::pair::PairSocket as InternalPair;
use zlink_zmp::SocketType;
use std::io;

/// A PAIR socket for exclusive peer-to-peer communication.
///
/// PAIR sockets connect exactly two endpoints and exchange messages
/// bidirectionally with no routing or subscription filtering. They're
/// typically used for connecting two threads or processes one-to-one.
///
/// ## ZeroMQ Compatibility
///
/// Compatible with `zmq::PAIR` sockets from libzmq; a PAIR only ever
/// accepts a peer whose socket type is also PAIR.
///
/// ## Example
///
/// ```rust,no_run
/// use zlink::zmq::PairSocket;
/// use bytes::Bytes;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (listener, mut socket) = PairSocket::bind("127.0.0.1:5555").await?;
/// socket.send(vec![Bytes::from("hello")]).await?;
/// # Ok(())
/// # }
/// ```
pub struct PairSocket<S = TcpStream>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    inner: InternalPair<S>,
    monitor: Option<SocketEventSender>,
}

impl PairSocket {
    /// Bind to an address and accept the one peer this PAIR will ever have.
    ///
    /// Returns the listener (in case the caller wants to accept a
    /// replacement peer after the first one disconnects) alongside the
    /// ready-to-use socket.
    pub async fn bind(
        addr: impl compio::net::ToSocketAddrsAsync,
    ) -> io::Result<(compio::net::TcpListener, Self)> {
        let (listener, inner) = InternalPair::bind(addr).await?;
        Ok((
            listener,
            Self {
                inner,
                monitor: None,
            },
        ))
    }

    /// Connect to a remote PAIR socket.
    pub async fn connect(addr: impl compio::net::ToSocketAddrsAsync) -> io::Result<Self> {
        Ok(Self {
            inner: InternalPair::connect(addr).await?,
            monitor: None,
        })
    }

    /// Create a PAIR socket from an existing TCP stream with `TCP_NODELAY`
    /// enabled.
    pub async fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        Ok(Self {
            inner: InternalPair::from_tcp(stream).await?,
            monitor: None,
        })
    }

    /// Create a PAIR socket from a TCP stream with custom socket options.
    pub async fn from_tcp_with_options(
        stream: TcpStream,
        options: zlink_core::options::SocketOptions,
    ) -> io::Result<Self> {
        Ok(Self {
            inner: InternalPair::from_tcp_with_options(
                stream,
                zlink_zmp::config::BufferConfig::default(),
                options,
            )
            .await?,
            monitor: None,
        })
    }
}

// Generic impl - works with any stream type
impl<S> PairSocket<S>
where
    S: compio::io::AsyncRead + compio::io::AsyncWrite + Unpin,
{
    /// Send a multipart message to the peer.
    pub async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        self.inner.send(msg).await
    }

    /// Receive a multipart message. Returns `None` if the peer disconnected.
    pub async fn recv(&mut self) -> io::Result<Option<Vec<Bytes>>> {
        self.inner.recv().await
    }

    /// Get the socket type.
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_TYPE` (16) option.
    #[inline]
    pub fn socket_type(&self) -> SocketType {
        self.inner.socket_type()
    }

    /// Get the endpoint this socket is connected/bound to, if available.
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_LAST_ENDPOINT` (32) option.
    #[inline]
    pub fn last_endpoint(&self) -> Option<&zlink_core::endpoint::Endpoint> {
        self.inner.last_endpoint()
    }

    /// Check if the last received message has more frames coming.
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_RCVMORE` (13) option.
    #[inline]
    pub fn has_more(&self) -> bool {
        self.inner.has_more()
    }

    /// Get the event state of the socket (`POLLIN`/`POLLOUT` bitmask).
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_EVENTS` (15) option.
    #[inline]
    pub fn events(&self) -> u32 {
        self.inner.events()
    }

    /// Enable monitoring for this socket.
    pub fn monitor(&mut self) -> SocketMonitor {
        let (sender, receiver) = create_monitor();
        self.monitor = Some(sender);
        receiver
    }

    #[allow(dead_code)]
    fn emit_event(&self, event: SocketEvent) {
        if let Some(monitor) = &self.monitor {
            let _ = monitor.send(event);
        }
    }
}

impl PairSocket<zlink_zmp::inproc_stream::InprocStream> {
    /// Bind to an `inproc://` endpoint.
    pub fn bind_inproc(endpoint: &str) -> io::Result<Self> {
        Ok(Self {
            inner: InternalPair::bind_inproc(endpoint)?,
            monitor: None,
        })
    }

    /// Connect to a previously bound `inproc://` endpoint.
    pub fn connect_inproc(endpoint: &str) -> io::Result<Self> {
        Ok(Self {
            inner: InternalPair::connect_inproc(endpoint)?,
            monitor: None,
        })
    }
}
