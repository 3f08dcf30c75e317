//! Control-frame bodies carried inside ZMP frames with the CONTROL flag set.
//!
//! Every control frame's payload starts with a 1-byte control-type code,
//! followed by a type-specific body:
//!
//! | code | name          | body                                          |
//! |------|---------------|------------------------------------------------|
//! | 0x01 | HELLO         | socket_type(u8) len(u8) id(len)                |
//! | 0x02 | HEARTBEAT-PING| ttl_ds(u16 BE) ctx_len(u8) ctx(ctx_len)         |
//! | 0x03 | HEARTBEAT-PONG| ctx_len(u8) ctx(ctx_len)                       |
//! | 0x04 | READY         | repeated: name_len(u8) name value_len(u32 BE) value |
//! | 0x05 | ERROR         | code(u8) reason_len(u8) reason(reason_len)     |
//! | 0x06 | ACTIVATE-WRITE| count(u32 BE)                                  |
//!
//! ACTIVATE-WRITE is the wire form of the pipe's `activate_write` flow
//! control signal (see `zlink_core::mailbox::Command::ActivateWrite`): a
//! peer that has dequeued `count` messages sends it to free that much of
//! the sender's HWM window.

use crate::codec::ZmpError;
use bytes::{BufMut, Bytes, BytesMut};
use zlink_core::error::ZmpErrorCode;

pub const CTRL_HELLO: u8 = 0x01;
pub const CTRL_PING: u8 = 0x02;
pub const CTRL_PONG: u8 = 0x03;
pub const CTRL_READY: u8 = 0x04;
pub const CTRL_ERROR: u8 = 0x05;
pub const CTRL_ACTIVATE_WRITE: u8 = 0x06;

/// Maximum context echoed back in a PING/PONG pair.
pub const MAX_HEARTBEAT_CTX: usize = 16;

fn proto(code: ZmpErrorCode) -> ZmpError {
    ZmpError::Protocol(code)
}

/// Build a HELLO control-frame body.
#[must_use]
pub fn encode_hello(socket_type: u8, routing_id: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(3 + routing_id.len());
    out.put_u8(CTRL_HELLO);
    out.put_u8(socket_type);
    out.put_u8(routing_id.len() as u8);
    out.extend_from_slice(routing_id);
    out.freeze()
}

/// Parse a HELLO body (control-type byte included).
pub fn decode_hello(body: &[u8]) -> crate::codec::Result<(u8, Bytes)> {
    if body.first().copied() != Some(CTRL_HELLO) {
        return Err(proto(ZmpErrorCode::Internal));
    }
    if body.len() < 3 {
        return Err(proto(ZmpErrorCode::Internal));
    }
    let socket_type = body[1];
    let id_len = body[2] as usize;
    if body.len() < 3 + id_len {
        return Err(proto(ZmpErrorCode::Internal));
    }
    Ok((socket_type, Bytes::copy_from_slice(&body[3..3 + id_len])))
}

/// Build a HEARTBEAT-PING body.
#[must_use]
pub fn encode_ping(ttl_ds: u16, ctx: &[u8]) -> Bytes {
    let ctx_len = ctx.len().min(MAX_HEARTBEAT_CTX);
    let mut out = BytesMut::with_capacity(4 + ctx_len);
    out.put_u8(CTRL_PING);
    out.put_u16(ttl_ds);
    out.put_u8(ctx_len as u8);
    out.extend_from_slice(&ctx[..ctx_len]);
    out.freeze()
}

/// Parse a HEARTBEAT-PING body, returning `(ttl_ds, ctx)`.
pub fn decode_ping(body: &[u8]) -> crate::codec::Result<(u16, Bytes)> {
    if body.first().copied() != Some(CTRL_PING) {
        return Err(proto(ZmpErrorCode::Internal));
    }
    if body.len() < 4 {
        return Err(proto(ZmpErrorCode::Internal));
    }
    let ttl_ds = u16::from_be_bytes([body[1], body[2]]);
    let ctx_len = body[3] as usize;
    if body.len() < 4 + ctx_len {
        return Err(proto(ZmpErrorCode::Internal));
    }
    Ok((ttl_ds, Bytes::copy_from_slice(&body[4..4 + ctx_len])))
}

/// Build a HEARTBEAT-PONG body that echoes the PING's context.
#[must_use]
pub fn encode_pong(ctx: &[u8]) -> Bytes {
    let ctx_len = ctx.len().min(MAX_HEARTBEAT_CTX);
    let mut out = BytesMut::with_capacity(2 + ctx_len);
    out.put_u8(CTRL_PONG);
    out.put_u8(ctx_len as u8);
    out.extend_from_slice(&ctx[..ctx_len]);
    out.freeze()
}

/// Parse a HEARTBEAT-PONG body, returning the echoed context.
pub fn decode_pong(body: &[u8]) -> crate::codec::Result<Bytes> {
    if body.first().copied() != Some(CTRL_PONG) {
        return Err(proto(ZmpErrorCode::Internal));
    }
    if body.len() < 2 {
        return Err(proto(ZmpErrorCode::Internal));
    }
    let ctx_len = body[1] as usize;
    if body.len() < 2 + ctx_len {
        return Err(proto(ZmpErrorCode::Internal));
    }
    Ok(Bytes::copy_from_slice(&body[2..2 + ctx_len]))
}

/// Build a READY body out of `(name, value)` metadata properties.
#[must_use]
pub fn encode_ready(props: &[(&str, &[u8])]) -> Bytes {
    let mut out = BytesMut::new();
    out.put_u8(CTRL_READY);
    for (name, value) in props {
        let name_bytes = name.as_bytes();
        out.put_u8(name_bytes.len() as u8);
        out.extend_from_slice(name_bytes);
        out.put_u32(value.len() as u32);
        out.extend_from_slice(value);
    }
    out.freeze()
}

/// Parse a READY body into its `(name, value)` metadata properties.
pub fn decode_ready(body: &[u8]) -> crate::codec::Result<Vec<(String, Bytes)>> {
    if body.first().copied() != Some(CTRL_READY) {
        return Err(proto(ZmpErrorCode::Internal));
    }
    let mut props = Vec::new();
    let mut offset = 1;
    while offset < body.len() {
        if offset + 1 > body.len() {
            return Err(proto(ZmpErrorCode::Internal));
        }
        let name_len = body[offset] as usize;
        offset += 1;
        if offset + name_len > body.len() {
            return Err(proto(ZmpErrorCode::Internal));
        }
        let name = std::str::from_utf8(&body[offset..offset + name_len])
            .map_err(|_| proto(ZmpErrorCode::Internal))?
            .to_owned();
        offset += name_len;

        if offset + 4 > body.len() {
            return Err(proto(ZmpErrorCode::Internal));
        }
        let value_len = u32::from_be_bytes([
            body[offset],
            body[offset + 1],
            body[offset + 2],
            body[offset + 3],
        ]) as usize;
        offset += 4;
        if offset + value_len > body.len() {
            return Err(proto(ZmpErrorCode::Internal));
        }
        let value = Bytes::copy_from_slice(&body[offset..offset + value_len]);
        offset += value_len;

        props.push((name, value));
    }
    Ok(props)
}

/// Build an ERROR body: the peer-reported code plus a short human reason.
#[must_use]
pub fn encode_error(code: ZmpErrorCode, reason: &str) -> Bytes {
    let reason = &reason.as_bytes()[..reason.len().min(255)];
    let mut out = BytesMut::with_capacity(3 + reason.len());
    out.put_u8(CTRL_ERROR);
    out.put_u8(code.to_wire());
    out.put_u8(reason.len() as u8);
    out.extend_from_slice(reason);
    out.freeze()
}

/// Parse an ERROR body into `(code, reason)`.
pub fn decode_error(body: &[u8]) -> crate::codec::Result<(ZmpErrorCode, String)> {
    if body.first().copied() != Some(CTRL_ERROR) {
        return Err(proto(ZmpErrorCode::Internal));
    }
    if body.len() < 3 {
        return Err(proto(ZmpErrorCode::Internal));
    }
    let code = ZmpErrorCode::from_wire(body[1]);
    let reason_len = body[2] as usize;
    if body.len() < 3 + reason_len {
        return Err(proto(ZmpErrorCode::Internal));
    }
    let reason = String::from_utf8_lossy(&body[3..3 + reason_len]).into_owned();
    Ok((code, reason))
}

/// Build an ACTIVATE-WRITE body: "I have dequeued `count` more messages".
#[must_use]
pub fn encode_activate_write(count: u32) -> Bytes {
    let mut out = BytesMut::with_capacity(5);
    out.put_u8(CTRL_ACTIVATE_WRITE);
    out.put_u32(count);
    out.freeze()
}

/// Parse an ACTIVATE-WRITE body, returning the freed message count.
pub fn decode_activate_write(body: &[u8]) -> crate::codec::Result<u32> {
    if body.first().copied() != Some(CTRL_ACTIVATE_WRITE) {
        return Err(proto(ZmpErrorCode::Internal));
    }
    if body.len() < 5 {
        return Err(proto(ZmpErrorCode::Internal));
    }
    Ok(u32::from_be_bytes([body[1], body[2], body[3], body[4]]))
}

/// The control-type byte a control frame's payload starts with, if any.
#[must_use]
pub fn control_type(body: &[u8]) -> Option<u8> {
    body.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_round_trips() {
        let body = encode_hello(5, b"peer-1");
        let (st, id) = decode_hello(&body).unwrap();
        assert_eq!(st, 5);
        assert_eq!(id, Bytes::from_static(b"peer-1"));
    }

    #[test]
    fn ping_pong_round_trip() {
        let ping = encode_ping(300, b"ctx");
        let (ttl, ctx) = decode_ping(&ping).unwrap();
        assert_eq!(ttl, 300);
        assert_eq!(ctx, Bytes::from_static(b"ctx"));

        let pong = encode_pong(&ctx);
        let echoed = decode_pong(&pong).unwrap();
        assert_eq!(echoed, Bytes::from_static(b"ctx"));
    }

    #[test]
    fn ready_round_trips_properties() {
        let body = encode_ready(&[("Socket-Type", b"DEALER"), ("Identity", b"abc")]);
        let props = decode_ready(&body).unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(props[0].0, "Socket-Type");
        assert_eq!(props[0].1, Bytes::from_static(b"DEALER"));
        assert_eq!(props[1].1, Bytes::from_static(b"abc"));
    }

    #[test]
    fn activate_write_round_trips() {
        let body = encode_activate_write(4);
        let count = decode_activate_write(&body).unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn error_round_trips() {
        let body = encode_error(ZmpErrorCode::SocketTypeMismatch, "incompatible peer");
        let (code, reason) = decode_error(&body).unwrap();
        assert_eq!(code, ZmpErrorCode::SocketTypeMismatch);
        assert_eq!(reason, "incompatible peer");
    }
}
