//! XPUB (extended publisher) socket implementation.

use bytes::Bytes;
use zlink_core::options::SocketOptions;
use zlink_core::subscription::SubscriptionEvent;
use zlink_zmp::xpub::XPubSocket as InternalXPub;
use zlink_zmp::SocketType;
use std::io;

/// An XPUB socket: a PUB socket that surfaces subscribers' subscribe/cancel
/// frames as regular traffic instead of filtering them silently.
///
/// Used to build message brokers that forward subscriptions upstream, or to
/// implement a last-value cache keyed by what's currently subscribed.
///
/// ## ZeroMQ Compatibility
///
/// Compatible with `zmq::XPUB` sockets from libzmq; accepts peers of type
/// SUB or XSUB.
///
/// ## Example
///
/// ```rust,no_run
/// use zlink::zmq::XPubSocket;
/// use bytes::Bytes;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut xpub = XPubSocket::bind("127.0.0.1:5555").await?;
/// xpub.accept().await?;
/// if let Some(event) = xpub.recv_subscription().await? {
///     println!("subscription event: {:?}", event);
/// }
/// xpub.send(vec![Bytes::from("topic"), Bytes::from("data")]).await?;
/// # Ok(())
/// # }
/// ```
pub struct XPubSocket {
    inner: InternalXPub,
}

impl XPubSocket {
    /// Bind to an address and start listening for subscribers.
    pub async fn bind(addr: &str) -> io::Result<Self> {
        Ok(Self {
            inner: InternalXPub::bind(addr).await?,
        })
    }

    /// Bind with custom socket options.
    pub async fn bind_with_options(addr: &str, options: SocketOptions) -> io::Result<Self> {
        Ok(Self {
            inner: InternalXPub::bind_with_options(addr, options).await?,
        })
    }

    /// Accept a pending subscriber connection, if any (non-blocking).
    pub async fn accept(&mut self) -> io::Result<()> {
        self.inner.accept().await
    }

    /// Receive the next subscription event (subscribe/cancel) from any
    /// connected subscriber, if one is pending.
    pub async fn recv_subscription(&mut self) -> io::Result<Option<SubscriptionEvent>> {
        self.inner.recv_subscription().await
    }

    /// Broadcast a multipart message to subscribers whose subscriptions
    /// match its first frame.
    pub async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        self.inner.send(msg).await
    }

    /// Get the number of active subscribers.
    #[inline]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count()
    }

    /// Get the local address this socket is bound to.
    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.inner.local_addr()
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

    /// Check if there are pending subscription events to receive.
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

    /// Report every subscription, including duplicates, instead of only the
    /// first subscriber for a given prefix.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.inner.set_verbose(verbose);
    }

    /// Require subscriptions to be explicitly approved via
    /// [`Self::send_subscription`] rather than auto-accepted.
    pub fn set_manual(&mut self, manual: bool) {
        self.inner.set_manual(manual);
    }

    /// Manually approve a subscription event (manual mode only).
    pub async fn send_subscription(&mut self, event: SubscriptionEvent) -> io::Result<()> {
        self.inner.send_subscription(event).await
    }
}
