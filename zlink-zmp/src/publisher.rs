//! PUB socket implementation
//!
//! PUB sockets accept connections from many SUB/XSUB subscribers and
//! broadcast every sent message to all of them. Unlike XPUB, plain PUB
//! does not track per-subscriber interest: filtering is left to the
//! subscriber side (a well-behaved SUB peer still forwards its
//! subscriptions upstream so bandwidth can be trimmed by an XPUB/proxy
//! sitting in between, but a bare PUB ignores them).
//!
//! The listener is owned by the caller (see [`crate::publisher`]'s
//! typical pairing with `zlink::zmq::PubSocket`) so that accepting new
//! subscribers and broadcasting can be driven from whatever task
//! topology the caller prefers, including a worker-pool architecture
//! that shards subscribers across OS threads.
//!
//! # PUB Pattern
//!
//! ```text
//! Publisher ──broadcast(topic, data)──> Subscriber 1
//!                                   └──> Subscriber 2
//!                                   └──> Subscriber 3
//! ```

use bytes::{Bytes, BytesMut};
use compio::io::AsyncWrite;
use compio::net::{TcpListener, TcpStream};
use std::collections::HashMap;
use std::io;
use tracing::{debug, trace};

use crate::{codec::encode_multipart, handshake::perform_handshake_with_timeout, session::SocketType};
use zlink_core::options::SocketOptions;

/// Unique identifier for each subscriber connection.
type SubscriberId = u64;

struct PubSubscriber {
    id: SubscriberId,
    stream: TcpStream,
}

/// PUB socket for broadcasting messages to connected subscribers.
///
/// This type owns only the subscriber set, not the listener: callers
/// accept connections on their own [`TcpListener`] and hand each new
/// stream to [`Self::accept_subscriber`]. This lets multiple workers
/// (e.g. one per OS thread) share a single listening socket while each
/// keeps an independent shard of subscribers.
///
/// # Examples
///
/// ```no_run
/// use zlink_zmp::publisher::PubSocket;
/// use compio::net::TcpListener;
/// use bytes::Bytes;
///
/// #[compio::main]
/// async fn main() -> std::io::Result<()> {
///     let listener = TcpListener::bind("127.0.0.1:5555").await?;
///     let mut pub_socket = PubSocket::new();
///
///     pub_socket.accept_subscriber(&listener).await?;
///     pub_socket.send(vec![Bytes::from("topic"), Bytes::from("data")]).await?;
///     Ok(())
/// }
/// ```
pub struct PubSocket {
    subscribers: HashMap<SubscriberId, PubSubscriber>,
    next_id: SubscriberId,
    options: SocketOptions,
}

impl Default for PubSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl PubSocket {
    /// Create a new, empty PUB socket shard with default socket options.
    ///
    /// `worker_count` in [`Self::with_workers`] only informs callers
    /// building their own multi-shard topology; each shard is still a
    /// plain `PubSocket`.
    pub fn new() -> Self {
        Self::with_options(SocketOptions::default())
    }

    /// Create a new PUB socket shard, one of `worker_count` shards in a
    /// caller-managed worker pool.
    pub fn with_workers(worker_count: usize) -> Self {
        debug!(worker_count, "[PUB] creating shard for worker pool");
        Self::new()
    }

    /// Create a new PUB socket shard with custom socket options.
    pub fn with_options(options: SocketOptions) -> Self {
        Self {
            subscribers: HashMap::new(),
            next_id: 1,
            options,
        }
    }

    /// Accept a new subscriber connection from `listener`.
    ///
    /// Performs the ZMP handshake and adds the peer to this shard's
    /// broadcast set. Returns the subscriber ID.
    pub async fn accept_subscriber(&mut self, listener: &TcpListener) -> io::Result<u64> {
        let (mut stream, addr) = listener.accept().await?;
        debug!("[PUB] New subscriber from {}", addr);

        zlink_core::tcp::enable_tcp_nodelay(&stream)?;

        let handshake_result = perform_handshake_with_timeout(
            &mut stream,
            SocketType::Pub,
            None,
            Some(self.options.handshake_timeout),
        )
        .await
        .map_err(|e| io::Error::other(format!("Handshake failed: {}", e)))?;

        debug!(
            peer_socket_type = ?handshake_result.peer_socket_type,
            "[PUB] Handshake complete with subscriber"
        );

        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.insert(id, PubSubscriber { id, stream });

        debug!("[PUB] Subscriber {} added (total: {})", id, self.subscribers.len());
        Ok(id)
    }

    /// Broadcast a multipart message to all connected subscribers.
    ///
    /// Subscribers whose connection has failed are dropped from the set.
    pub async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        use compio::buf::BufResult;
        use zlink_core::alloc::IoBytes;

        trace!("[PUB] Broadcasting message with {} frames", msg.len());

        let mut encoded = BytesMut::new();
        encode_multipart(&msg, &mut encoded);
        let encoded = encoded.freeze();

        let mut dead_subs = Vec::new();

        for sub in self.subscribers.values_mut() {
            let BufResult(result, _) =
                AsyncWrite::write(&mut sub.stream, IoBytes::new(encoded.clone())).await;
            match result {
                Ok(_) => trace!("[PUB] Sent to subscriber {}", sub.id),
                Err(e) => {
                    debug!("[PUB] Write failed for subscriber {}: {}", sub.id, e);
                    dead_subs.push(sub.id);
                }
            }
        }

        for id in dead_subs {
            self.subscribers.remove(&id);
            debug!("[PUB] Removed dead subscriber {}", id);
        }

        Ok(())
    }

    /// Get the number of active subscribers in this shard.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Get the socket type.
    #[inline]
    pub fn socket_type(&self) -> SocketType {
        SocketType::Pub
    }

    /// Get the event state of the socket.
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_EVENTS` (15) option.
    #[inline]
    pub fn events(&self) -> u32 {
        if self.subscribers.is_empty() {
            0
        } else {
            2 // POLLOUT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pub_new_has_no_subscribers() {
        let pub_socket = PubSocket::new();
        assert_eq!(pub_socket.subscriber_count(), 0);
    }

    #[test]
    fn test_pub_with_workers_starts_empty() {
        let pub_socket = PubSocket::with_workers(4);
        assert_eq!(pub_socket.subscriber_count(), 0);
    }
}

// Implement Socket trait for PubSocket (non-generic, send-only).
#[async_trait::async_trait(?Send)]
impl crate::Socket for PubSocket {
    async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        self.send(msg).await
    }

    async fn recv(&mut self) -> io::Result<Option<Vec<Bytes>>> {
        // PUB is send-only.
        Ok(None)
    }

    fn socket_type(&self) -> SocketType {
        SocketType::Pub
    }
}
