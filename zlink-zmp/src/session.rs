//! Sans-IO ZMP session state machine.
//!
//! `ZmpSession` drives one connection's handshake and framing without
//! touching a socket itself: bytes come in via `on_bytes`, frames and
//! control events come out as a `Vec<SessionEvent>`. The engine (see
//! `engine.rs`) owns the actual stream and feeds/drains this state machine.
//!
//! Unlike legacy ZMTP, ZMP has no greeting or mechanism negotiation: a
//! connection goes straight to a HELLO/READY control-frame exchange.

use crate::codec::{ZmpDecoder, ZmpError, ZmpFrame};
use crate::command::{self, CTRL_HELLO, CTRL_READY};
use bytes::Bytes;
use zlink_core::buffer::SegmentedBuffer;
use zlink_core::error::ZmpErrorCode;

pub use zlink_core::socket_type::SocketType;

/// Events emitted by the session (transport-agnostic).
pub enum SessionEvent {
    /// Send raw bytes immediately (HELLO / READY control frames).
    SendBytes(Bytes),

    /// A validated ZMP data frame.
    Frame(ZmpFrame),

    /// A validated ZMP control frame outside the handshake
    /// (HEARTBEAT-PING/PONG, ERROR) — the engine interprets these.
    Control(ZmpFrame),

    /// Handshake completed successfully.
    HandshakeComplete {
        peer_identity: Option<Bytes>,
        peer_socket_type: SocketType,
    },

    /// Fatal protocol error.
    Error(ZmpError),
}

enum State {
    AwaitHello {
        decoder: ZmpDecoder,
    },
    AwaitReady {
        decoder: ZmpDecoder,
        peer_socket_type: SocketType,
        peer_identity: Option<Bytes>,
    },
    Active {
        decoder: ZmpDecoder,
    },
}

/// Sans-IO ZMP session: HELLO/READY handshake followed by framed data.
pub struct ZmpSession {
    state: State,
    local_socket_type: SocketType,
    local_identity: Option<Bytes>,
    recv: SegmentedBuffer,
}

impl ZmpSession {
    #[must_use]
    pub fn new(local_socket_type: SocketType, local_identity: Option<Bytes>) -> Self {
        Self {
            state: State::AwaitHello {
                decoder: ZmpDecoder::new(),
            },
            local_socket_type,
            local_identity,
            recv: SegmentedBuffer::new(),
        }
    }

    /// Create a session that's already past the handshake phase.
    ///
    /// Use this when the handshake has already been performed synchronously
    /// (see `handshake.rs`) before handing the stream to the engine loop.
    #[must_use]
    pub fn new_active(local_socket_type: SocketType) -> Self {
        Self {
            state: State::Active {
                decoder: ZmpDecoder::new(),
            },
            local_socket_type,
            local_identity: None,
            recv: SegmentedBuffer::new(),
        }
    }

    /// Our HELLO control frame, sent first on the wire.
    #[must_use]
    pub fn hello_frame(&self) -> Bytes {
        let id = self.local_identity.as_deref().unwrap_or(&[]);
        let body = command::encode_hello(self.local_socket_type.to_wire(), id);
        ZmpFrame::command(body).encode()
    }

    /// Feed incoming bytes into the session, returning the events produced.
    pub fn on_bytes(&mut self, src: Bytes) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        self.recv.push(src);

        loop {
            match &mut self.state {
                State::AwaitHello { decoder } => match decoder.decode(&mut self.recv) {
                    Ok(Some(frame)) => {
                        if !frame.is_control()
                            || command::control_type(&frame.payload) != Some(CTRL_HELLO)
                        {
                            events.push(SessionEvent::Error(ZmpError::Protocol(
                                ZmpErrorCode::FlagsInvalid,
                            )));
                            break;
                        }

                        let (peer_type_byte, peer_identity) =
                            match command::decode_hello(&frame.payload) {
                                Ok(v) => v,
                                Err(e) => {
                                    events.push(SessionEvent::Error(e));
                                    break;
                                }
                            };
                        let peer_socket_type = match SocketType::from_wire(peer_type_byte) {
                            Some(t) => t,
                            None => {
                                events.push(SessionEvent::Error(ZmpError::Protocol(
                                    ZmpErrorCode::SocketTypeMismatch,
                                )));
                                break;
                            }
                        };
                        if !self.local_socket_type.is_compatible(peer_socket_type) {
                            events.push(SessionEvent::Error(ZmpError::Protocol(
                                ZmpErrorCode::SocketTypeMismatch,
                            )));
                            break;
                        }

                        let identity = (!peer_identity.is_empty()).then_some(peer_identity);
                        let new_decoder = ZmpDecoder::new();
                        let old_decoder = std::mem::replace(decoder, new_decoder);

                        let ready = command::encode_ready(&[(
                            "Socket-Type",
                            self.local_socket_type.as_str().as_bytes(),
                        )]);
                        events.push(SessionEvent::SendBytes(ZmpFrame::command(ready).encode()));

                        self.state = State::AwaitReady {
                            decoder: old_decoder,
                            peer_socket_type,
                            peer_identity: identity,
                        };
                    }
                    Ok(None) => break,
                    Err(e) => {
                        events.push(SessionEvent::Error(e));
                        break;
                    }
                },

                State::AwaitReady {
                    decoder,
                    peer_socket_type,
                    peer_identity,
                } => match decoder.decode(&mut self.recv) {
                    Ok(Some(frame)) => {
                        if !frame.is_control()
                            || command::control_type(&frame.payload) != Some(CTRL_READY)
                        {
                            events.push(SessionEvent::Error(ZmpError::Protocol(
                                ZmpErrorCode::FlagsInvalid,
                            )));
                            break;
                        }
                        if let Err(e) = command::decode_ready(&frame.payload) {
                            events.push(SessionEvent::Error(e));
                            break;
                        }

                        let peer_id = peer_identity.take();
                        let peer_st = *peer_socket_type;
                        let new_decoder = ZmpDecoder::new();
                        let old_decoder = std::mem::replace(decoder, new_decoder);

                        self.state = State::Active {
                            decoder: old_decoder,
                        };

                        events.push(SessionEvent::HandshakeComplete {
                            peer_identity: peer_id,
                            peer_socket_type: peer_st,
                        });
                    }
                    Ok(None) => break,
                    Err(e) => {
                        events.push(SessionEvent::Error(e));
                        break;
                    }
                },

                State::Active { decoder } => match decoder.decode(&mut self.recv) {
                    Ok(Some(frame)) => {
                        if frame.is_control() {
                            events.push(SessionEvent::Control(frame));
                        } else {
                            events.push(SessionEvent::Frame(frame));
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        events.push(SessionEvent::Error(e));
                        break;
                    }
                },
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_handshake_between_two_sessions() {
        let mut a = ZmpSession::new(SocketType::Dealer, Some(Bytes::from_static(b"a")));
        let mut b = ZmpSession::new(SocketType::Router, None);

        let hello_a = a.hello_frame();
        let hello_b = b.hello_frame();

        let events_b = b.on_bytes(hello_a);
        assert!(events_b
            .iter()
            .any(|e| matches!(e, SessionEvent::SendBytes(_))));

        let events_a = a.on_bytes(hello_b);
        assert!(events_a
            .iter()
            .any(|e| matches!(e, SessionEvent::SendBytes(_))));

        let ready_b = events_b
            .into_iter()
            .find_map(|e| match e {
                SessionEvent::SendBytes(b) => Some(b),
                _ => None,
            })
            .unwrap();
        let ready_a = events_a
            .into_iter()
            .find_map(|e| match e {
                SessionEvent::SendBytes(b) => Some(b),
                _ => None,
            })
            .unwrap();

        let final_a = a.on_bytes(ready_b);
        assert!(final_a
            .iter()
            .any(|e| matches!(e, SessionEvent::HandshakeComplete { .. })));

        let final_b = b.on_bytes(ready_a);
        assert!(final_b
            .iter()
            .any(|e| matches!(e, SessionEvent::HandshakeComplete { .. })));
    }

    #[test]
    fn rejects_incompatible_socket_types() {
        let mut a = ZmpSession::new(SocketType::Pub, None);
        let b = ZmpSession::new(SocketType::Push, None);

        let events = a.on_bytes(b.hello_frame());
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::Error(_))));
    }
}
