//! SUB socket implementation
//!
//! SUB sockets connect to PUB peers and filter messages by topic prefix.
//! Unlike XSUB, a plain SUB filters locally but also notifies the publisher
//! of its interests by sending SUBSCRIBE/CANCEL control frames upstream, so
//! a well-behaved PUB peer can avoid sending data nobody wants.
//!
//! # Pattern
//!
//! ```text
//! SUB ──subscribe("topic.a")──> Publisher
//!     <──────data("topic.a")───
//! ```

use crate::config::BufferConfig;
use crate::engine::Engine;
use crate::{handshake::perform_handshake_with_timeout, session::SocketType};
use bytes::Bytes;
use compio::io::{AsyncRead, AsyncWrite};
use compio::net::TcpStream;
use smallvec::SmallVec;
use std::io;
use tracing::{debug, trace};
use zlink_core::endpoint::Endpoint;
use zlink_core::options::SocketOptions;
use zlink_core::subscription::{SubscriptionEvent, SubscriptionTrie};

/// SUB socket for filtered, one-way subscription to a PUB peer.
///
/// # Examples
///
/// ```no_run
/// use zlink_zmp::subscriber::SubSocket;
///
/// #[compio::main]
/// async fn main() -> std::io::Result<()> {
///     let mut sub = SubSocket::connect("127.0.0.1:5555").await?;
///
///     sub.subscribe(b"topic.").await?;
///
///     if let Some(msg) = sub.recv().await? {
///         println!("Received: {:?}", msg);
///     }
///
///     Ok(())
/// }
/// ```
pub struct SubSocket<S = TcpStream>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Base socket infrastructure
    base: Engine<S>,
    /// Accumulated frames for current multipart message
    frames: SmallVec<[Bytes; 4]>,
    /// Local subscription tracking, used both for filtering and wire forwarding
    subscriptions: SubscriptionTrie,
}

impl<S> SubSocket<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new SUB socket from a stream.
    pub async fn new(stream: S) -> io::Result<Self> {
        Self::with_config_and_options(stream, BufferConfig::default(), SocketOptions::default())
            .await
    }

    /// Create a new SUB socket with custom buffer configuration.
    pub async fn with_config(stream: S, config: BufferConfig) -> io::Result<Self> {
        Self::with_config_and_options(stream, config, SocketOptions::default()).await
    }

    /// Create a new SUB socket with custom socket options, using the
    /// default buffer configuration.
    pub async fn with_options(stream: S, options: SocketOptions) -> io::Result<Self> {
        Self::with_config_and_options(stream, BufferConfig::default(), options).await
    }

    /// Create a new SUB socket with custom buffer configuration and socket options.
    pub async fn with_config_and_options(
        mut stream: S,
        config: BufferConfig,
        options: SocketOptions,
    ) -> io::Result<Self> {
        debug!("[SUB] Creating new SUB socket");

        debug!("[SUB] Performing ZMP handshake...");
        let handshake_result = perform_handshake_with_timeout(
            &mut stream,
            SocketType::Sub,
            None,
            Some(options.handshake_timeout),
        )
        .await
        .map_err(|e| io::Error::other(format!("Handshake failed: {}", e)))?;

        debug!(
            peer_socket_type = ?handshake_result.peer_socket_type,
            "[SUB] Handshake complete"
        );

        let options = config.apply_to(options);
        Ok(Self {
            base: Engine::new(stream, SocketType::Sub, options),
            frames: SmallVec::new(),
            subscriptions: SubscriptionTrie::new(),
        })
    }

    /// Subscribe to messages with the given prefix.
    ///
    /// An empty prefix subscribes to all messages. Sends a SUBSCRIBE control
    /// frame upstream so the publisher can skip filtering on our behalf.
    pub async fn subscribe(&mut self, prefix: Bytes) -> io::Result<()> {
        trace!("[SUB] Adding subscription: {:?}", prefix);
        self.subscriptions.subscribe(prefix.clone());

        let event = SubscriptionEvent::Subscribe(prefix);
        self.send_subscription_event(event).await
    }

    /// Unsubscribe from messages with the given prefix.
    ///
    /// Sends a CANCEL control frame upstream.
    pub async fn unsubscribe(&mut self, prefix: &Bytes) -> io::Result<()> {
        trace!("[SUB] Removing subscription: {:?}", prefix);
        self.subscriptions.unsubscribe(prefix);

        let event = SubscriptionEvent::Unsubscribe(prefix.clone());
        self.send_subscription_event(event).await
    }

    async fn send_subscription_event(&mut self, event: SubscriptionEvent) -> io::Result<()> {
        use compio::buf::BufResult;
        use zlink_core::alloc::IoBytes;

        let frame = if event.is_subscribe() {
            crate::codec::ZmpFrame::subscribe(event.prefix().clone())
        } else {
            crate::codec::ZmpFrame::cancel(event.prefix().clone())
        };
        let encoded = frame.encode();
        trace!("[SUB] Sending subscription event ({} bytes)", encoded.len());

        let stream = self
            .base
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "Socket not connected"))?;

        let BufResult(result, _) = AsyncWrite::write(stream, IoBytes::new(encoded)).await;
        result?;

        trace!("[SUB] Subscription event sent successfully");
        Ok(())
    }

    /// Check if a message matches any subscription.
    fn matches_subscription(&self, msg: &[Bytes]) -> bool {
        match msg.first() {
            Some(first_frame) => self.subscriptions.matches(first_frame),
            None => self.subscriptions.matches(b""),
        }
    }

    /// Receive a message that matches subscriptions.
    ///
    /// This will keep reading and filtering messages until one matches
    /// the active subscriptions.
    pub async fn recv(&mut self) -> io::Result<Option<Vec<Bytes>>> {
        loop {
            trace!("[SUB] Waiting for message");

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
                            trace!("[SUB] Received {} frames", msg.len());

                            if self.matches_subscription(&msg) {
                                return Ok(Some(msg));
                            }
                            trace!("[SUB] Message filtered out (no matching subscription)");
                            break;
                        }
                    }
                    None => break,
                }
            }

            let n = self.base.read_raw_with_heartbeat().await?;
            if n == 0 {
                trace!("[SUB] Connection closed");
                return Ok(None);
            }
        }
    }

    /// Get the number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Check if subscribed to a specific topic.
    pub fn is_subscribed(&self, topic: &[u8]) -> bool {
        self.subscriptions.matches(topic)
    }

    /// Get a reference to the socket options.
    #[inline]
    pub fn options(&self) -> &SocketOptions {
        &self.base.options
    }

    /// Get the socket type.
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_TYPE` (16) option.
    #[inline]
    pub fn socket_type(&self) -> SocketType {
        SocketType::Sub
    }

    /// Get the endpoint this socket is connected/bound to, if available.
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_LAST_ENDPOINT` (32) option.
    #[inline]
    pub fn last_endpoint(&self) -> Option<&Endpoint> {
        self.base.last_endpoint()
    }

    /// Check if the last received message has more frames coming.
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_RCVMORE` (13) option.
    #[inline]
    pub fn has_more(&self) -> bool {
        self.base.has_more()
    }

    /// Get the event state of the socket.
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_EVENTS` (15) option.
    #[inline]
    pub fn events(&self) -> u32 {
        self.base.events()
    }
}

// Specialized implementation for TCP streams to enable TCP_NODELAY.
impl SubSocket<TcpStream> {
    /// Connect to a publisher.
    pub async fn connect(addr: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_tcp(stream).await
    }

    /// Connect to a publisher with custom socket options.
    pub async fn connect_with_options(addr: &str, options: SocketOptions) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_tcp_with_options(stream, options).await
    }

    /// Create a new SUB socket from a TCP stream with TCP_NODELAY enabled.
    pub async fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        Self::from_tcp_with_config(stream, BufferConfig::default()).await
    }

    /// Create a new SUB socket from a TCP stream with TCP_NODELAY and custom config.
    pub async fn from_tcp_with_config(stream: TcpStream, config: BufferConfig) -> io::Result<Self> {
        zlink_core::tcp::enable_tcp_nodelay(&stream)?;
        debug!("[SUB] TCP_NODELAY enabled");
        Self::with_config_and_options(stream, config, SocketOptions::default()).await
    }

    /// Create a new SUB socket from a TCP stream with TCP_NODELAY and custom options.
    pub async fn from_tcp_with_options(
        stream: TcpStream,
        options: SocketOptions,
    ) -> io::Result<Self> {
        zlink_core::tcp::enable_tcp_nodelay(&stream)?;
        debug!("[SUB] TCP_NODELAY enabled");
        Self::with_config_and_options(stream, BufferConfig::default(), options).await
    }

    /// Create a new SUB socket from a TCP stream with full configuration.
    pub async fn from_tcp_with_config_and_options(
        stream: TcpStream,
        config: BufferConfig,
        options: SocketOptions,
    ) -> io::Result<Self> {
        zlink_core::tcp::enable_tcp_nodelay(&stream)?;
        debug!("[SUB] TCP_NODELAY enabled");
        Self::with_config_and_options(stream, config, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_event_creation() {
        let event = SubscriptionEvent::Subscribe(Bytes::from_static(b"topic"));
        let msg = event.to_message();
        assert_eq!(msg[0], 0x01);
        assert_eq!(&msg[1..], b"topic");
    }
}
