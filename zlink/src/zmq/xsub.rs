//! XSUB (extended subscriber) socket implementation.

use bytes::Bytes;
use compio::net::TcpStream;
use zlink_core::options::SocketOptions;
use zlink_core::subscription::{Subscription, SubscriptionEvent};
use zlink_zmp::xsub::XSubSocket as InternalXSub;
use zlink_zmp::SocketType;
use std::io;

/// An XSUB socket: a SUB socket whose subscribe/unsubscribe calls are sent
/// upstream as regular protocol frames instead of being handled purely
/// locally, so a broker can forward them to its own upstream XPUB/PUB.
///
/// ## ZeroMQ Compatibility
///
/// Compatible with `zmq::XSUB` sockets from libzmq; connects to peers of
/// type PUB or XPUB.
///
/// ## Example
///
/// ```rust,no_run
/// use zlink::zmq::XSubSocket;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut xsub = XSubSocket::connect("127.0.0.1:5555").await?;
/// xsub.subscribe(b"topic.").await?;
/// if let Some(msg) = xsub.recv().await? {
///     println!("received: {:?}", msg);
/// }
/// # Ok(())
/// # }
/// ```
pub struct XSubSocket {
    inner: InternalXSub<TcpStream>,
}

impl XSubSocket {
    /// Connect to a publisher (PUB or XPUB).
    pub async fn connect(addr: &str) -> io::Result<Self> {
        Ok(Self {
            inner: InternalXSub::connect(addr).await?,
        })
    }

    /// Connect with custom socket options.
    pub async fn connect_with_options(addr: &str, options: SocketOptions) -> io::Result<Self> {
        Ok(Self {
            inner: InternalXSub::connect_with_options(addr, options).await?,
        })
    }

    /// Subscribe to messages whose first frame starts with `prefix`. An
    /// empty prefix subscribes to everything.
    pub async fn subscribe(&mut self, prefix: impl Into<Bytes>) -> io::Result<()> {
        self.inner.subscribe(prefix).await
    }

    /// Unsubscribe from `prefix`.
    pub async fn unsubscribe(&mut self, prefix: impl Into<Bytes>) -> io::Result<()> {
        self.inner.unsubscribe(prefix).await
    }

    /// Send a raw subscribe/cancel event upstream, e.g. to forward a
    /// subscription received on a broker's downstream XPUB.
    pub async fn send_subscription_event(&mut self, event: SubscriptionEvent) -> io::Result<()> {
        self.inner.send_subscription_event(event).await
    }

    /// Receive the next data message. Returns `None` if the peer disconnected.
    pub async fn recv(&mut self) -> io::Result<Option<Vec<Bytes>>> {
        self.inner.recv().await
    }

    /// Get the number of active local subscriptions.
    #[inline]
    pub fn subscription_count(&self) -> usize {
        self.inner.subscription_count()
    }

    /// Check whether `topic` matches a current subscription.
    pub fn is_subscribed(&self, topic: &[u8]) -> bool {
        self.inner.is_subscribed(topic)
    }

    /// Get all current local subscriptions.
    pub fn subscriptions(&self) -> &[Subscription] {
        self.inner.subscriptions()
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
}
