//! Multi-peer ROUTER socket implementation
//!
//! # ROUTER Pattern
//!
//! ROUTER sockets accept any number of peers, tag every received message
//! with the sending peer's routing id, and let the application address
//! outbound messages back to a specific peer by that id. Unlike the other
//! direct-stream sockets, a ROUTER owns its listener: it keeps accepting
//! connections for as long as it is alive, each one driven by its own
//! [`Engine<TcpStream>`] in a spawned task.
//!
//! Routing itself is delegated to [`zlink_core::router::RouterHub`], which
//! keeps the routing_id -> peer-task table and does the fan-in/fan-out.
//! `RouterSocket` is a thin handle around channels into that hub.

use bytes::Bytes;
use compio::net::{TcpListener, TcpStream};
use flume::Sender;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::codec::encode_multipart;
use crate::config::BufferConfig;
use crate::engine::Engine;
use crate::{handshake::perform_handshake_with_timeout, session::SocketType};
use zlink_core::endpoint::Endpoint;
use zlink_core::options::SocketOptions;
use zlink_core::router::{HubEvent, PeerCmd, RouterBehavior, RouterCmd, RouterHub};

/// Auto-generated identity counter, used when a connecting peer didn't
/// declare its own identity during the handshake and no
/// `connect_routing_id` override is set.
static PEER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Fencing token so a peer task that's being evicted (ROUTER_HANDOVER)
/// never clobbers the registry entry of the connection that replaced it.
static CONN_GEN_COUNTER: AtomicU64 = AtomicU64::new(1);

type PeerRegistry = Arc<Mutex<HashMap<Bytes, (u64, Sender<PeerCmd>)>>>;

/// Multi-peer ROUTER socket.
///
/// `send()`/`recv()` talk to a background [`RouterHub`] and the per-peer
/// tasks it coordinates; this handle itself holds no stream.
pub struct RouterSocket {
    cmd_tx: Sender<RouterCmd>,
    inbound_rx: flume::Receiver<Vec<Bytes>>,
    registry: PeerRegistry,
    shared_options: Arc<Mutex<SocketOptions>>,
    local_endpoint: Option<Endpoint>,
}

impl RouterSocket {
    /// Bind and start accepting peers with default options and large buffers.
    pub async fn bind(addr: impl compio::net::ToSocketAddrsAsync) -> io::Result<Self> {
        Self::bind_with_config_and_options(addr, BufferConfig::large(), SocketOptions::default())
            .await
    }

    /// Bind with custom socket options.
    pub async fn bind_with_options(
        addr: impl compio::net::ToSocketAddrsAsync,
        options: SocketOptions,
    ) -> io::Result<Self> {
        Self::bind_with_config_and_options(addr, BufferConfig::large(), options).await
    }

    /// Bind with custom buffer configuration.
    pub async fn bind_with_config(
        addr: impl compio::net::ToSocketAddrsAsync,
        config: BufferConfig,
    ) -> io::Result<Self> {
        Self::bind_with_config_and_options(addr, config, SocketOptions::default()).await
    }

    /// Bind with full buffer and socket option configuration.
    pub async fn bind_with_config_and_options(
        addr: impl compio::net::ToSocketAddrsAsync,
        config: BufferConfig,
        options: SocketOptions,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Self::from_listener(listener, config, options)
    }

    /// Wrap an already-bound listener and start accepting peers on it.
    ///
    /// Useful when the caller needs to set listener options (e.g.
    /// `SO_REUSEADDR`) before handing it off.
    pub fn from_listener(
        listener: TcpListener,
        config: BufferConfig,
        options: SocketOptions,
    ) -> io::Result<Self> {
        let local_endpoint = listener.local_addr().ok().map(Endpoint::Tcp);
        let options = config.apply_to(options);

        let (hub_event_tx, hub_event_rx) = flume::unbounded();
        let (cmd_tx, cmd_rx) = flume::unbounded();
        let (inbound_tx, inbound_rx) = flume::unbounded();
        let registry: PeerRegistry = Arc::new(Mutex::new(HashMap::new()));
        let shared_options = Arc::new(Mutex::new(options));

        let hub = RouterHub::new(hub_event_rx, cmd_rx, RouterBehavior::Standard);
        compio::runtime::spawn(hub.run());

        compio::runtime::spawn(accept_loop(
            listener,
            shared_options.clone(),
            hub_event_tx,
            inbound_tx,
            registry.clone(),
        ));

        Ok(Self {
            cmd_tx,
            inbound_rx,
            registry,
            shared_options,
            local_endpoint,
        })
    }

    /// Send a message. The first frame must be the target peer's routing id.
    ///
    /// When `router_mandatory` is set and no peer with that id is currently
    /// connected, this returns an error instead of silently dropping the
    /// message.
    pub async fn send(&mut self, msg: Vec<Bytes>) -> io::Result<()> {
        let Some(target) = msg.first() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "ROUTER send() requires a routing id as the first frame",
            ));
        };

        let router_mandatory = self.shared_options.lock().router_mandatory;
        if router_mandatory && !self.registry.lock().contains_key(target) {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "ROUTER_MANDATORY: no peer with that routing id is connected",
            ));
        }

        trace!(routing_id = ?target, "[ROUTER] queuing outbound message");

        self.cmd_tx
            .send_async(RouterCmd::SendMessage(msg))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "ROUTER hub task is gone"))
    }

    /// Receive the next message. The first frame is the sending peer's
    /// routing id, followed by an empty delimiter frame, followed by the
    /// body.
    ///
    /// Returns `Ok(None)` once every peer task and the hub itself have shut
    /// down and no more messages will ever arrive.
    pub async fn recv(&mut self) -> io::Result<Option<Vec<Bytes>>> {
        Ok(self.inbound_rx.recv_async().await.ok())
    }

    /// Number of peers currently connected.
    pub fn peer_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Ask every connected peer to close and tear down the hub.
    pub async fn close(self) -> io::Result<()> {
        trace!("[ROUTER] Closing socket");
        let _ = self.cmd_tx.send_async(RouterCmd::Close).await;
        Ok(())
    }

    /// Get a copy of the socket options currently in effect.
    ///
    /// Changes made through [`Self::options_mut`] only affect peers accepted
    /// afterwards; already-connected peers keep the options snapshotted at
    /// accept time.
    #[inline]
    pub fn options(&self) -> SocketOptions {
        self.shared_options.lock().clone()
    }

    /// Get mutable access to the shared socket options.
    #[inline]
    pub fn options_mut(&self) -> parking_lot::MutexGuard<'_, SocketOptions> {
        self.shared_options.lock()
    }

    /// Replace the socket options wholesale.
    #[inline]
    pub fn set_options(&self, options: SocketOptions) {
        *self.shared_options.lock() = options;
    }

    /// Get the socket type.
    #[inline]
    pub const fn socket_type() -> SocketType {
        SocketType::Router
    }

    /// Get the endpoint this socket is bound to, if available.
    #[inline]
    pub fn last_endpoint(&self) -> Option<&Endpoint> {
        self.local_endpoint.as_ref()
    }
}

/// Accepts connections for as long as the listener is alive, spawning one
/// peer task per connection. Exits (and so stops accepting) only when the
/// listener itself errors.
async fn accept_loop(
    listener: TcpListener,
    shared_options: Arc<Mutex<SocketOptions>>,
    hub_event_tx: Sender<HubEvent>,
    inbound_tx: Sender<Vec<Bytes>>,
    registry: PeerRegistry,
) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "[ROUTER] accept loop stopping");
                return;
            }
        };

        if let Err(e) = zlink_core::tcp::enable_tcp_nodelay(&stream) {
            debug!(error = %e, "[ROUTER] failed to enable TCP_NODELAY for accepted peer");
        }
        trace!(%addr, "[ROUTER] accepted connection");

        compio::runtime::spawn(run_peer(
            stream,
            shared_options.clone(),
            hub_event_tx.clone(),
            inbound_tx.clone(),
            registry.clone(),
        ));
    }
}

/// Removes a peer's registry entry and notifies the hub when the peer task
/// exits, however it exits. Guards against a handed-over identity's old
/// task clobbering the new connection's entry by checking its own
/// generation token before removing.
struct PeerGuard {
    identity: Bytes,
    generation: u64,
    registry: PeerRegistry,
    hub_event_tx: Sender<HubEvent>,
}

impl Drop for PeerGuard {
    fn drop(&mut self) {
        let mut guard = self.registry.lock();
        let still_current =
            matches!(guard.get(&self.identity), Some((gen, _)) if *gen == self.generation);
        if still_current {
            guard.remove(&self.identity);
        }
        drop(guard);
        let _ = self.hub_event_tx.send(HubEvent::PeerDown {
            routing_id: self.identity.clone(),
        });
    }
}

async fn run_peer(
    stream: TcpStream,
    shared_options: Arc<Mutex<SocketOptions>>,
    hub_event_tx: Sender<HubEvent>,
    inbound_tx: Sender<Vec<Bytes>>,
    registry: PeerRegistry,
) {
    if let Err(e) =
        run_peer_session(stream, shared_options, hub_event_tx, inbound_tx, registry).await
    {
        debug!(error = %e, "[ROUTER] peer connection ended");
    }
}

async fn run_peer_session(
    mut stream: TcpStream,
    shared_options: Arc<Mutex<SocketOptions>>,
    hub_event_tx: Sender<HubEvent>,
    inbound_tx: Sender<Vec<Bytes>>,
    registry: PeerRegistry,
) -> io::Result<()> {
    let options = shared_options.lock().clone();

    let handshake_result = perform_handshake_with_timeout(
        &mut stream,
        SocketType::Router,
        None,
        Some(options.handshake_timeout),
    )
    .await
    .map_err(|e| io::Error::other(format!("Handshake failed: {}", e)))?;

    let explicit_id = shared_options.lock().connect_routing_id.take();
    let identity = explicit_id
        .or(handshake_result.peer_identity)
        .unwrap_or_else(|| {
            let n = PEER_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
            Bytes::from(format!("peer-{n}"))
        });

    debug!(
        ?identity,
        peer_socket_type = ?handshake_result.peer_socket_type,
        "[ROUTER] peer handshake complete"
    );

    let router_handover = options.router_handover;
    let generation = CONN_GEN_COUNTER.fetch_add(1, Ordering::Relaxed);
    let (peer_tx, peer_rx) = flume::unbounded::<PeerCmd>();

    {
        let mut guard = registry.lock();
        if let Some((_, old_tx)) = guard.get(&identity) {
            if router_handover {
                debug!(?identity, "[ROUTER] handing identity over to new connection");
                let _ = old_tx.send(PeerCmd::Close);
            } else {
                debug!(
                    ?identity,
                    "[ROUTER] duplicate identity rejected (router_handover disabled)"
                );
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "duplicate ROUTER identity and router_handover is disabled",
                ));
            }
        }
        guard.insert(identity.clone(), (generation, peer_tx.clone()));
    }

    let _guard = PeerGuard {
        identity: identity.clone(),
        generation,
        registry,
        hub_event_tx: hub_event_tx.clone(),
    };

    let _ = hub_event_tx.send(HubEvent::PeerUp {
        routing_id: identity.clone(),
        tx: peer_tx,
    });

    let mut engine = Engine::new(stream, SocketType::Router, options);
    let mut frames: SmallVec<[Bytes; 4]> = SmallVec::new();

    'peer: loop {
        // Drain whatever is already fully buffered before waiting on new
        // peer commands or wire bytes.
        loop {
            match engine.decoder.decode(&mut engine.recv) {
                Ok(Some(frame)) => {
                    if frame.is_control() {
                        engine.handle_control_frame(&frame.payload).await?;
                        continue;
                    }

                    let more = frame.more();
                    frames.push(frame.payload);

                    if !more {
                        let mut msg = Vec::with_capacity(frames.len() + 2);
                        msg.push(identity.clone());
                        msg.push(Bytes::new());
                        msg.extend(frames.drain(..));
                        engine.send_read_credit().await?;
                        if inbound_tx.send_async(msg).await.is_err() {
                            break 'peer;
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => return Err(e.into()),
            }
        }

        enum Event {
            Cmd(Result<PeerCmd, flume::RecvError>),
            Read(io::Result<usize>),
        }

        let event = {
            let cmd_fut = Box::pin(peer_rx.recv_async());
            let read_fut = Box::pin(engine.read_raw_with_heartbeat());
            futures::select_biased! {
                cmd = cmd_fut => Event::Cmd(cmd),
                n = read_fut => Event::Read(n),
            }
        };

        match event {
            Event::Cmd(Ok(PeerCmd::SendBody(body))) => {
                if engine.reserve_send_slot().is_err() {
                    debug!(?identity, "[ROUTER] peer at send HWM, dropping outbound message");
                    continue;
                }
                engine.write_buf.clear();
                encode_multipart(&body, &mut engine.write_buf);
                engine.write_from_buf().await?;
            }
            Event::Cmd(Ok(PeerCmd::Close)) | Event::Cmd(Err(_)) => break 'peer,
            Event::Read(Ok(0)) => break 'peer,
            Event::Read(Ok(_)) => {}
            Event::Read(Err(e)) => return Err(e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_identity_counters_are_monotonic() {
        let a = PEER_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let b = PEER_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        assert!(b > a);

        let c = CONN_GEN_COUNTER.fetch_add(1, Ordering::Relaxed);
        let d = CONN_GEN_COUNTER.fetch_add(1, Ordering::Relaxed);
        assert!(d > c);
    }
}
