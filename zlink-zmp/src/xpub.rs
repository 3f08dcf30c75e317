//! XPUB (Extended Publisher) socket implementation
//!
//! XPUB extends PUB by receiving subscription messages from subscribers,
//! enabling manual subscription control, last value cache patterns, and
//! subscription forwarding in message brokers.
//!
//! # Use Cases
//!
//! - **Message brokers**: Forward subscriptions between frontend and backend
//! - **Last value cache (LVC)**: Track subscriptions and replay latest values
//! - **Subscription auditing**: Monitor what topics subscribers are interested in
//! - **Manual control**: Explicitly approve/deny subscriptions
//!
//! # Pattern
//!
//! ```text
//! Subscriber 1 ──subscribe("topic.a")──> ┐
//! Subscriber 2 ──subscribe("topic.b")──> ├─> XPUB (receives subscription events)
//! Subscriber 3 ──unsubscribe("topic.a")─> ┘        │
//!                                                   │
//!                                      XPUB ────────┴──> Forwards subscriptions
//! ```

use bytes::Bytes;
use compio::net::{TcpListener, TcpStream};
use zlink_core::options::SocketOptions;
use zlink_core::subscription::{SubscriptionEvent, SubscriptionTrie};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::io;
use tracing::{debug, trace};

use crate::codec::{encode_multipart, ZmpDecoder};
use crate::handshake::perform_handshake_with_timeout;
use crate::session::SocketType;
use zlink_core::buffer::SegmentedBuffer;

/// Unique identifier for each subscriber connection
type SubscriberId = u64;

/// Per-subscriber state managed by XPUB
struct XPubSubscriber {
    id: SubscriberId,
    stream: TcpStream,
    subscriptions: SubscriptionTrie,
    /// ZMP framing state for this subscriber's inbound subscribe/cancel frames.
    decoder: ZmpDecoder,
    recv: SegmentedBuffer,
}

impl XPubSubscriber {
    /// Check if message matches subscriber's subscriptions
    fn matches(&self, msg: &[Bytes]) -> bool {
        // Check first frame against subscription prefixes
        if let Some(first_frame) = msg.first() {
            self.subscriptions.matches(first_frame)
        } else {
            false
        }
    }
}

/// XPUB (Extended Publisher) socket.
///
/// Receives subscription events and broadcasts messages to matching subscribers.
///
/// # Features
///
/// - **Subscription tracking**: Know what topics subscribers want
/// - **Verbose mode**: Report all subscriptions (including duplicates)
/// - **Manual mode**: Explicit subscription control
/// - **Welcome messages**: Send initial message to new subscribers
///
/// # Examples
///
/// ```no_run
/// use zlink_zmp::xpub::XPubSocket;
/// use bytes::Bytes;
///
/// #[compio::main]
/// async fn main() -> std::io::Result<()> {
///     let mut xpub = XPubSocket::bind("127.0.0.1:5555").await?;
///     
///     loop {
///         // Receive subscription events from subscribers
///         if let Some(event) = xpub.recv_subscription().await? {
///             println!("Subscription event: {:?}", event);
///         }
///         
///         // Broadcast messages to matching subscribers
///         xpub.send(vec![Bytes::from("topic"), Bytes::from("data")]).await?;
///     }
/// }
/// ```
pub struct XPubSocket {
    listener: TcpListener,
    subscribers: HashMap<SubscriberId,XPubSubscriber>,
    next_id: SubscriberId,
    options: SocketOptions,
    /// Pending subscription events to deliver
    pending_events: SmallVec<[SubscriptionEvent; 8]>,
}

impl XPubSocket {
    /// Bind to an address and start listening for subscribers.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use zlink_zmp::xpub::XPubSocket;
    /// # async fn example() -> std::io::Result<()> {
    /// let xpub = XPubSocket::bind("127.0.0.1:5555").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn bind(addr: &str) -> io::Result<Self> {
        Self::bind_with_options(addr, SocketOptions::default()).await
    }

    /// Bind with custom socket options.
    pub async fn bind_with_options(
        addr: &str,
        options: SocketOptions,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        debug!("[XPUB] Bound to {}", local_addr);

        Ok(Self {
            listener,
            subscribers: HashMap::new(),
            next_id: 1,
            options,
            pending_events: SmallVec::new(),
        })
    }

    /// Accept new subscriber connections (non-blocking).
    ///
    /// Call this periodically to accept new subscribers.
    pub async fn accept(&mut self) -> io::Result<()> {
        match self.listener.accept().await {
            Ok((mut stream, addr)) => {
                debug!("[XPUB] New subscriber from {}", addr);

                // Perform ZMP handshake
                let handshake_result = perform_handshake_with_timeout(
                    &mut stream,
                    SocketType::XPub,
                    None,
                    Some(self.options.handshake_timeout),
                )
                .await?;

                debug!(
                    peer_socket_type = ?handshake_result.peer_socket_type,
                    "[XPUB] Handshake complete with subscriber"
                );

                // Add subscriber
                let id = self.next_id;
                self.next_id += 1;

                // Send welcome message if configured
                if let Some(welcome_msg) = self.options.xpub_welcome_msg.clone() {
                    use compio::buf::BufResult;
                    use compio::io::AsyncWrite;
                    use zlink_core::alloc::IoBytes;

                    let mut buf = bytes::BytesMut::new();
                    encode_multipart(&[welcome_msg], &mut buf);
                    let BufResult(result, _) =
                        AsyncWrite::write(&mut stream, IoBytes::new(buf.freeze())).await;
                    if let Err(e) = result {
                        debug!("[XPUB] Failed to send welcome message to {}: {}", id, e);
                    } else {
                        trace!("[XPUB] Sent welcome message to subscriber {}", id);
                    }
                }

                self.subscribers.insert(
                    id,
                    XPubSubscriber {
                        id,
                        stream,
                        subscriptions: SubscriptionTrie::new(),
                        decoder: ZmpDecoder::new(),
                        recv: SegmentedBuffer::new(),
                    },
                );

                debug!("[XPUB] Subscriber {} added (total: {})", id, self.subscribers.len());
                Ok(())
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                // No pending connections
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Receive a subscription event from subscribers (non-blocking).
    ///
    /// Returns `None` if no events are available.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use zlink_zmp::xpub::XPubSocket;
    /// # async fn example(mut xpub: XPubSocket) -> std::io::Result<()> {
    /// if let Some(event) = xpub.recv_subscription().await? {
    ///     match event {
    ///         zlink_core::subscription::SubscriptionEvent::Subscribe(topic) => {
    ///             println!("New subscription: {:?}", topic);
    ///         }
    ///         zlink_core::subscription::SubscriptionEvent::Unsubscribe(topic) => {
    ///             println!("Unsubscription: {:?}", topic);
    ///         }
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn recv_subscription(&mut self) -> io::Result<Option<SubscriptionEvent>> {
        use compio::buf::BufResult;
        use compio::io::AsyncRead;
        use compio::time::timeout;
        use std::time::Duration;
        
        // Return pending events first
        if !self.pending_events.is_empty() {
            return Ok(Some(self.pending_events.remove(0)));
        }

        // NOTE: Don't call accept() here - it blocks waiting for new connections
        // The caller should call accept() separately to handle new connections

        // Poll all subscribers for subscribe/cancel control frames: a
        // properly-framed ZMP frame (8-byte header) with the SUBSCRIBE or
        // CANCEL flag set and the topic prefix as its body.
        trace!("[XPUB] Polling {} subscribers", self.subscribers.len());
        for sub in self.subscribers.values_mut() {
            let buf = vec![0u8; 256];

            // Use a short timeout to avoid blocking on quiet subscribers.
            let read_result = timeout(Duration::from_millis(1), sub.stream.read(buf)).await;

            match read_result {
                Ok(BufResult(Ok(n), buf)) if n > 0 => {
                    sub.recv.push(Bytes::copy_from_slice(&buf[..n]));

                    loop {
                        match sub.decoder.decode(&mut sub.recv) {
                            Ok(Some(frame)) => {
                                let event = if frame.is_subscribe() {
                                    Some(SubscriptionEvent::Subscribe(frame.payload))
                                } else if frame.is_cancel() {
                                    Some(SubscriptionEvent::Unsubscribe(frame.payload))
                                } else {
                                    debug!(
                                        subscriber = sub.id,
                                        flags = frame.flags,
                                        "[XPUB] ignoring non-subscription frame"
                                    );
                                    None
                                };

                                let Some(event) = event else { continue };
                                trace!(subscriber = sub.id, ?event, "[XPUB] subscription event");

                                match &event {
                                    SubscriptionEvent::Subscribe(prefix) => {
                                        sub.subscriptions.subscribe(prefix.clone());
                                    }
                                    SubscriptionEvent::Unsubscribe(prefix) => {
                                        sub.subscriptions.unsubscribe(prefix);
                                    }
                                }

                                if self.options.xpub_verbose {
                                    return Ok(Some(event));
                                }
                            }
                            Ok(None) => break,
                            Err(e) => {
                                debug!(subscriber = sub.id, %e, "[XPUB] malformed subscription frame");
                                break;
                            }
                        }
                    }
                }
                Ok(BufResult(Ok(_), _)) => {}
                Ok(BufResult(Err(e), _)) => {
                    if e.kind() != std::io::ErrorKind::WouldBlock {
                        debug!("[XPUB] Error reading from subscriber: {}", e);
                    }
                }
                Err(_) => continue, // timeout, no data available
            }
        }

        Ok(None)
    }

    /// Broadcast a message to all matching subscribers.
    ///
    /// Only subscribers whose subscriptions match the message's first frame
    /// will receive it.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use zlink_zmp::xpub::XPubSocket;
    /// # use bytes::Bytes;
    /// # async fn example(mut xpub: XPubSocket) -> std::io::Result<()> {
    /// xpub.send(vec![
    ///     Bytes::from("topic.temperature"),
    ///     Bytes::from("23.5"),
    /// ]).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        use compio::buf::BufResult;
        use compio::io::AsyncWrite;
        use zlink_core::alloc::IoBytes;

        trace!("[XPUB] Broadcasting message with {} frames", msg.len());

        let mut encoded = bytes::BytesMut::new();
        encode_multipart(&msg, &mut encoded);
        let encoded = encoded.freeze();

        let mut dead_subs = Vec::new();

        for sub in self.subscribers.values_mut() {
            // Skip non-matching subscribers
            if !sub.matches(&msg) {
                continue;
            }

            let BufResult(result, _) =
                AsyncWrite::write(&mut sub.stream, IoBytes::new(encoded.clone())).await;
            match result {
                Ok(_) => trace!("[XPUB] Sent to subscriber {}", sub.id),
                Err(e) => {
                    debug!("[XPUB] Write failed for subscriber {}: {}", sub.id, e);
                    dead_subs.push(sub.id);
                }
            }
        }

        // Remove dead subscribers
        for id in dead_subs {
            self.subscribers.remove(&id);
            debug!("[XPUB] Removed dead subscriber {}", id);
        }

        Ok(())
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Get the local address.
    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Get the socket type.
    pub fn socket_type(&self) -> SocketType {
        SocketType::XPub
    }

    /// Check if the last received message has more frames coming.
    ///
    /// For XPUB, subscription events are always single-frame.
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_RCVMORE` (13) option.
    #[inline]
    pub fn has_more(&self) -> bool {
        !self.pending_events.is_empty()
    }

    /// Get the event state of the socket.
    ///
    /// Returns a bitmask indicating ready-to-receive and ready-to-send states.
    ///
    /// # Returns
    ///
    /// - `1` (POLLIN) - Socket is ready to receive (has pending subscription events)
    /// - `2` (POLLOUT) - Socket is ready to send (has active subscribers)
    /// - `3` (POLLIN | POLLOUT) - Socket is ready for both
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_EVENTS` (15) option.
    #[inline]
    pub fn events(&self) -> u32 {
        let mut events = 0;
        if !self.pending_events.is_empty() {
            events |= 1; // POLLIN
        }
        if !self.subscribers.is_empty() {
            events |= 2; // POLLOUT
        }
        events
    }

    /// Set verbose mode.
    ///
    /// When enabled, all subscription messages are reported (including duplicates).
    pub fn set_verbose(&mut self, verbose: bool) {
        self.options.xpub_verbose = verbose;
    }

    /// Set manual mode.
    ///
    /// When enabled, subscriptions must be explicitly approved by calling `send_subscription()`.
    pub fn set_manual(&mut self, manual: bool) {
        self.options.xpub_manual = manual;
    }

    /// Manually send a subscription message (manual mode only).
    ///
    /// This allows explicit control over subscription forwarding.
    pub async fn send_subscription(&mut self, event: SubscriptionEvent) -> io::Result<()> {
        if !self.options.xpub_manual {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Manual mode not enabled",
            ));
        }

        // This XPUB has no upstream peer of its own (it only listens for
        // downstream subscribers), so "forwarding" reduces to recording the
        // approval; proxy.rs is what wires an XPUB's accepted subscriptions
        // into an upstream XSUB connection.
        trace!("[XPUB] Manual subscription: {:?}", event);
        Ok(())
    }
}

impl fmt::Debug for XPubSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XPubSocket")
            .field("subscribers", &self.subscribers.len())
            .field("verbose", &self.options.xpub_verbose)
            .field("manual", &self.options.xpub_manual)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[compio::test]
    async fn test_xpub_bind() {
        let xpub = XPubSocket::bind("127.0.0.1:0").await.unwrap();
        assert_eq!(xpub.subscriber_count(), 0);
        let addr = xpub.local_addr().unwrap();
        assert!(addr.port() > 0);
    }

    #[test]
    fn test_subscription_event_encoding() {
        let event = SubscriptionEvent::Subscribe(Bytes::from_static(b"topic"));
        let msg = event.to_message();
        assert_eq!(msg[0], 0x01);
        assert_eq!(&msg[1..], b"topic");

        let parsed = SubscriptionEvent::from_message(&msg).unwrap();
        assert_eq!(parsed, event);
    }
}

// Implement Socket trait for XPubSocket (non-generic)
#[async_trait::async_trait(?Send)]
impl crate::Socket for XPubSocket {
    async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        self.send(msg).await
    }

    async fn recv(&mut self) -> io::Result<Option<Vec<Bytes>>> {
        // XPUB receives subscription events
        self.recv_subscription().await.map(|opt| {
            opt.map(|event| {
                vec![event.to_message()]
            })
        })
    }

    fn socket_type(&self) -> SocketType {
        SocketType::XPub
    }
}
