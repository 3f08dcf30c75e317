//! ZMP Integrated Actor
//!
//! This module provides the integration layer that composes:
//! - zlink-core's protocol-agnostic SocketActor (IO primitive)
//! - zlink-zmp's ZmpSession (protocol state machine)
//! - Hub connections (Router/PubSub)
//!
//! # Architecture
//!
//! ```text
//!     Application
//!          ↓
//!   ZmpIntegratedActor  ← This layer (composition)
//!          ↓
//!   SocketActor (core) + ZmpSession (protocol) + Hubs
//!          ↓
//!        IO
//! ```
//!
//! # Responsibilities
//!
//! - Forward raw bytes to ZmpSession
//! - Assemble ZMP frames into multipart messages
//! - Strip/inject ROUTER envelopes
//! - Route SUBSCRIBE/CANCEL frames to the PubSub hub
//! - Register with appropriate hubs
//! - Convert hub commands back to ZMP frames

use crate::codec::ZmpFrame;
use crate::session::{SessionEvent, SocketType, ZmpSession};

use bytes::Bytes;
use flume::{Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Global epoch counter for peer lifecycle tracking
static EPOCH_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Events from Router Hub to integrated actor
#[derive(Debug)]
pub enum HubEvent {
    PeerUp {
        routing_id: Bytes,
        tx: Sender<PeerCmd>,
    },
    PeerDown {
        routing_id: Bytes,
    },
}

/// Commands from Hub to peer
#[derive(Debug)]
pub enum PeerCmd {
    SendBody(Vec<Bytes>),
    Close,
}

/// Events for PubSub Hub
#[derive(Debug)]
pub enum PubSubEvent {
    PeerUp {
        routing_id: Bytes,
        epoch: u64,
        tx: Sender<PeerCmd>,
    },
    PeerDown {
        routing_id: Bytes,
        epoch: u64,
    },
    Subscribe {
        routing_id: Bytes,
        prefix: Bytes,
    },
    Unsubscribe {
        routing_id: Bytes,
        prefix: Bytes,
    },
}

/// Commands from Router Hub
#[derive(Debug)]
pub enum RouterCmd {
    SendMessage(Vec<Bytes>),
    Close,
}

/// Commands from PubSub Hub
#[derive(Debug)]
pub enum PubSubCmd {
    Publish(Vec<Bytes>),
    Close,
}

/// ZMP-integrated socket actor that bridges core IO with protocol logic.
///
/// Not `Send`/`Sync` — designed for a single-threaded async context. Use
/// channels for cross-task communication.
pub struct ZmpIntegratedActor {
    /// ZMP protocol session state machine
    pub(crate) session: ZmpSession,

    /// Socket type (determines routing behavior)
    pub(crate) socket_type: SocketType,

    /// Unique epoch for this connection
    epoch: u64,

    /// Peer's routing identity (set after handshake)
    routing_id: Option<Bytes>,

    /// Multipart message accumulator
    multipart: Vec<Bytes>,

    /// Channels for sending completed messages to application
    user_tx: Sender<Vec<Bytes>>,

    /// Channel for receiving messages from application
    pub(crate) user_rx: Receiver<Vec<Bytes>>,

    /// Optional Router Hub connection
    router_hub: Option<Sender<HubEvent>>,

    /// Optional PubSub Hub connection
    pubsub_hub: Option<Sender<PubSubEvent>>,

    /// Commands from hub to this peer
    peer_rx: Option<Receiver<PeerCmd>>,

    /// Sender for routing PeerCmd to the socket (for hub registration)
    peer_cmd_tx: Sender<PeerCmd>,

    /// Outbound frame queue (to be sent to SocketActor)
    write_queue: Vec<Bytes>,
}

impl ZmpIntegratedActor {
    /// Create a new ZMP integrated actor.
    pub fn new(
        socket_type: SocketType,
        identity: Option<Bytes>,
        user_tx: Sender<Vec<Bytes>>,
        user_rx: Receiver<Vec<Bytes>>,
    ) -> Self {
        let (peer_cmd_tx, peer_cmd_rx) = flume::unbounded();

        Self {
            session: ZmpSession::new(socket_type, identity),
            socket_type,
            epoch: EPOCH_COUNTER.fetch_add(1, Ordering::Relaxed),
            routing_id: None,
            multipart: Vec::new(),
            user_tx,
            user_rx,
            router_hub: None,
            pubsub_hub: None,
            peer_rx: Some(peer_cmd_rx),
            peer_cmd_tx,
            write_queue: Vec::new(),
        }
    }

    /// Main event loop for the integrated actor.
    ///
    /// Runtime-agnostic: drains pending user messages and hub commands,
    /// returning the ZMP frames that need to be written to the socket.
    pub async fn process_events(&mut self) -> Vec<Bytes> {
        let mut outgoing = Vec::new();

        match self.user_rx.try_recv() {
            Ok(msg) => outgoing.extend(self.encode_outgoing_message(msg)),
            Err(flume::TryRecvError::Empty) => {}
            Err(flume::TryRecvError::Disconnected) => {
                trace!(socket_type = ?self.socket_type, "user_rx disconnected");
            }
        }

        outgoing.extend(self.try_recv_peer_commands());
        outgoing
    }

    /// Encode outgoing multipart message into ZMP frames.
    fn encode_outgoing_message(&mut self, parts: Vec<Bytes>) -> Vec<Bytes> {
        if parts.is_empty() {
            return Vec::new();
        }

        let body: &[Bytes] = match self.socket_type {
            // ROUTER: user sends [RoutingID, Empty, Body...]; strip the
            // envelope before framing onto the wire.
            SocketType::Router if parts.len() >= 3 => &parts[2..],
            _ => &parts[..],
        };

        let last_idx = body.len().saturating_sub(1);
        body.iter()
            .enumerate()
            .map(|(idx, part)| ZmpFrame::data(part.clone(), idx < last_idx).encode())
            .collect()
    }

    /// Attach Router hub for ROUTER/DEALER sockets.
    pub fn attach_router(&mut self, hub_tx: Sender<HubEvent>, peer_rx: Receiver<PeerCmd>) {
        self.router_hub = Some(hub_tx);
        self.peer_rx = Some(peer_rx);
    }

    /// Attach PubSub hub for PUB/SUB sockets.
    pub fn attach_pubsub(&mut self, hub_tx: Sender<PubSubEvent>, peer_rx: Receiver<PeerCmd>) {
        self.pubsub_hub = Some(hub_tx);
        self.peer_rx = Some(peer_rx);
    }

    /// Our HELLO control frame, sent first on the wire.
    pub fn hello_frame(&self) -> Bytes {
        self.session.hello_frame()
    }

    /// Process received bytes from the socket.
    ///
    /// Returns frames to be written back to the socket.
    pub fn on_bytes(&mut self, bytes: Bytes) -> Vec<Bytes> {
        let events = self.session.on_bytes(bytes);

        for event in events {
            match event {
                SessionEvent::HandshakeComplete {
                    peer_identity,
                    peer_socket_type: _,
                } => {
                    self.handle_handshake_complete(peer_identity);
                }

                SessionEvent::Frame(frame) => {
                    self.handle_frame(frame);
                }

                SessionEvent::Control(_frame) => {
                    // Heartbeats and ERROR frames are handled at the engine
                    // layer once heartbeating is wired up; nothing to do here.
                }

                SessionEvent::SendBytes(b) => {
                    self.write_queue.push(b);
                }

                SessionEvent::Error(_) => {
                    self.handle_disconnect();
                    break;
                }
            }
        }

        self.write_queue.drain(..).collect()
    }

    /// Process user messages (application → network).
    ///
    /// Returns encoded frames to send.
    pub fn on_user_message(&mut self, parts: Vec<Bytes>) -> Vec<Bytes> {
        let parts_len = parts.len();
        parts
            .into_iter()
            .enumerate()
            .map(|(i, part)| ZmpFrame::data(part, i + 1 < parts_len).encode())
            .collect()
    }

    /// Process hub commands (Router/PubSub → network).
    ///
    /// Returns encoded frames to send.
    pub fn on_peer_command(&mut self, cmd: PeerCmd) -> Vec<Bytes> {
        match cmd {
            PeerCmd::SendBody(parts) => {
                let parts_len = parts.len();
                parts
                    .into_iter()
                    .enumerate()
                    .map(|(i, part)| ZmpFrame::data(part, i + 1 < parts_len).encode())
                    .collect()
            }
            PeerCmd::Close => {
                self.handle_disconnect();
                Vec::new()
            }
        }
    }

    /// Check for pending peer commands (non-blocking).
    pub fn try_recv_peer_commands(&mut self) -> Vec<Bytes> {
        let mut frames = Vec::new();
        let mut commands = Vec::new();

        if let Some(peer_rx) = &self.peer_rx {
            while let Ok(cmd) = peer_rx.try_recv() {
                commands.push(cmd);
            }
        }

        for cmd in commands {
            frames.extend(self.on_peer_command(cmd));
        }

        frames
    }

    pub(crate) fn handle_handshake_complete(&mut self, peer_identity: Option<Bytes>) {
        let rid = peer_identity.unwrap_or_else(|| Bytes::from(format!("anon-{}", self.epoch)));

        self.routing_id = Some(rid.clone());

        if let Some(hub) = &self.router_hub {
            let _ = hub.send(HubEvent::PeerUp {
                routing_id: rid.clone(),
                tx: self.peer_cmd_tx.clone(),
            });
        }

        if let Some(hub) = &self.pubsub_hub {
            let _ = hub.send(PubSubEvent::PeerUp {
                routing_id: rid.clone(),
                epoch: self.epoch,
                tx: self.peer_cmd_tx.clone(),
            });
        }
    }

    pub(crate) fn handle_frame(&mut self, frame: ZmpFrame) {
        if frame.is_subscribe() || frame.is_cancel() {
            self.handle_subscription(frame);
            return;
        }

        let has_more = frame.more();
        self.multipart.push(frame.payload);

        if !has_more {
            let mut msg = std::mem::take(&mut self.multipart);

            if self.socket_type == SocketType::Router {
                if let Some(rid) = &self.routing_id {
                    msg.insert(0, Bytes::new());
                    msg.insert(0, rid.clone());
                }
            }

            let _ = self.user_tx.send(msg);
        }
    }

    /// Route a wire-level SUBSCRIBE/CANCEL frame to the PubSub hub.
    fn handle_subscription(&mut self, frame: ZmpFrame) {
        let (Some(rid), Some(hub)) = (&self.routing_id, &self.pubsub_hub) else {
            return;
        };

        let event = if frame.is_subscribe() {
            PubSubEvent::Subscribe {
                routing_id: rid.clone(),
                prefix: frame.payload,
            }
        } else {
            PubSubEvent::Unsubscribe {
                routing_id: rid.clone(),
                prefix: frame.payload,
            }
        };
        let _ = hub.send(event);
    }

    fn handle_disconnect(&mut self) {
        if let Some(rid) = &self.routing_id {
            if let Some(hub) = &self.router_hub {
                let _ = hub.send(HubEvent::PeerDown {
                    routing_id: rid.clone(),
                });
            }

            if let Some(hub) = &self.pubsub_hub {
                let _ = hub.send(PubSubEvent::PeerDown {
                    routing_id: rid.clone(),
                    epoch: self.epoch,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_actor_with_epoch() {
        let (tx, _rx) = flume::unbounded();
        let (_user_tx, user_rx) = flume::unbounded();

        let actor = ZmpIntegratedActor::new(SocketType::Dealer, None, tx, user_rx);
        assert!(actor.epoch > 0);
        assert!(actor.routing_id.is_none());
    }

    #[test]
    fn assembles_multipart_messages() {
        let (tx, rx) = flume::unbounded();
        let (_user_tx, user_rx) = flume::unbounded();

        let mut actor = ZmpIntegratedActor::new(SocketType::Dealer, None, tx, user_rx);

        let frame1 = ZmpFrame {
            flags: 0x01, // MORE
            payload: Bytes::from_static(b"part1"),
        };
        let frame2 = ZmpFrame {
            flags: 0x00, // No MORE
            payload: Bytes::from_static(b"part2"),
        };

        actor.handle_frame(frame1);
        assert!(rx.try_recv().is_err()); // Not complete yet

        actor.handle_frame(frame2);
        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.len(), 2);
        assert_eq!(msg[0].as_ref(), b"part1");
        assert_eq!(msg[1].as_ref(), b"part2");
    }

    #[test]
    fn routes_subscribe_frame_to_pubsub_hub() {
        let (tx, _rx) = flume::unbounded();
        let (_user_tx, user_rx) = flume::unbounded();
        let mut actor = ZmpIntegratedActor::new(SocketType::XPub, None, tx, user_rx);
        actor.routing_id = Some(Bytes::from_static(b"sub-1"));

        let (hub_tx, hub_rx) = flume::unbounded();
        actor.pubsub_hub = Some(hub_tx);

        actor.handle_frame(ZmpFrame::subscribe(Bytes::from_static(b"topic")));

        match hub_rx.try_recv().unwrap() {
            PubSubEvent::Subscribe { routing_id, prefix } => {
                assert_eq!(routing_id, Bytes::from_static(b"sub-1"));
                assert_eq!(prefix, Bytes::from_static(b"topic"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
