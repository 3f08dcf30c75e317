//! Synchronous ZMP handshake that completes before a socket is handed to
//! its engine loop.
//!
//! Unlike legacy ZMTP, ZMP has no greeting or mechanism negotiation: the
//! connection opens directly with a HELLO control frame from each side,
//! followed by READY once the peer's HELLO has been validated.
//!
//! Running this synchronously (rather than through `ZmpSession`) avoids
//! handing a stream to `Engine` before both peers have agreed on socket
//! types, so application data can never race the handshake.

use crate::codec::{ZmpError, HEADER_LEN, MAGIC, VERSION};
use crate::command::{self, CTRL_HELLO, CTRL_READY};
use crate::session::SocketType;
use bytes::{Buf, Bytes};
use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use std::time::Duration;
use tracing::debug;
use zlink_core::error::ZmpErrorCode;

/// Control frames during the handshake are small; reject anything absurd
/// rather than let a misbehaving peer make us allocate without bound.
const MAX_HANDSHAKE_BODY: usize = 4096;

/// Result of a successful handshake.
#[derive(Debug)]
pub struct HandshakeResult {
    pub peer_identity: Option<Bytes>,
    pub peer_socket_type: SocketType,
}

/// Perform the HELLO/READY handshake on `stream`, with no timeout.
pub async fn perform_handshake<S>(
    stream: &mut S,
    local_socket_type: SocketType,
    identity: Option<&[u8]>,
) -> Result<HandshakeResult, ZmpError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug!(socket_type = local_socket_type.as_str(), "starting ZMP handshake");

    let hello = command::encode_hello(local_socket_type.to_wire(), identity.unwrap_or(&[]));
    write_control(stream, &hello).await?;

    let (peer_type_byte, peer_identity) = loop {
        let (flags, body) = read_frame(stream).await?;
        if flags != crate::codec::FLAG_CONTROL {
            return Err(ZmpError::Protocol(ZmpErrorCode::FlagsInvalid));
        }
        if command::control_type(&body) != Some(CTRL_HELLO) {
            return Err(ZmpError::Protocol(ZmpErrorCode::FlagsInvalid));
        }
        break command::decode_hello(&body)?;
    };

    let peer_socket_type = SocketType::from_wire(peer_type_byte)
        .ok_or(ZmpError::Protocol(ZmpErrorCode::SocketTypeMismatch))?;
    if !local_socket_type.is_compatible(peer_socket_type) {
        return Err(ZmpError::Protocol(ZmpErrorCode::SocketTypeMismatch));
    }

    let ready = command::encode_ready(&[("Socket-Type", local_socket_type.as_str().as_bytes())]);
    write_control(stream, &ready).await?;

    loop {
        let (flags, body) = read_frame(stream).await?;
        if flags != crate::codec::FLAG_CONTROL {
            return Err(ZmpError::Protocol(ZmpErrorCode::FlagsInvalid));
        }
        if command::control_type(&body) != Some(CTRL_READY) {
            return Err(ZmpError::Protocol(ZmpErrorCode::FlagsInvalid));
        }
        command::decode_ready(&body)?;
        break;
    }

    debug!(peer = peer_socket_type.as_str(), "ZMP handshake complete");

    let peer_identity = (!peer_identity.is_empty()).then_some(peer_identity);
    Ok(HandshakeResult {
        peer_identity,
        peer_socket_type,
    })
}

/// Perform the handshake, failing with a `HandshakeTimeout` error if it
/// does not complete within `timeout` (when given).
pub async fn perform_handshake_with_timeout<S>(
    stream: &mut S,
    local_socket_type: SocketType,
    identity: Option<&[u8]>,
    timeout: Option<Duration>,
) -> Result<HandshakeResult, ZmpError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let fut = perform_handshake(stream, local_socket_type, identity);
    match timeout {
        None => fut.await,
        Some(duration) => match compio::time::timeout(duration, fut).await {
            Ok(result) => result,
            Err(_) => Err(ZmpError::Protocol(ZmpErrorCode::HandshakeTimeout)),
        },
    }
}

async fn write_control<S>(stream: &mut S, body: &Bytes) -> Result<(), ZmpError>
where
    S: AsyncWrite + Unpin,
{
    let frame = crate::codec::ZmpFrame::command(body.clone()).encode();
    let BufResult(res, _) = stream.write_all(frame).await;
    res.map_err(|_| ZmpError::Protocol(ZmpErrorCode::Internal))?;
    Ok(())
}

/// Read a single frame's header + body off the wire, synchronously.
async fn read_frame<S>(stream: &mut S) -> Result<(u8, Bytes), ZmpError>
where
    S: AsyncRead + Unpin,
{
    let header_buf = [0u8; HEADER_LEN];
    let BufResult(res, header_buf) = stream.read_exact(header_buf).await;
    res.map_err(|_| ZmpError::Protocol(ZmpErrorCode::Internal))?;

    if header_buf[0] != MAGIC {
        return Err(ZmpError::Protocol(ZmpErrorCode::InvalidMagic));
    }
    if header_buf[1] != VERSION {
        return Err(ZmpError::Protocol(ZmpErrorCode::VersionMismatch));
    }
    if header_buf[3] != 0 {
        return Err(ZmpError::Protocol(ZmpErrorCode::FlagsInvalid));
    }
    let flags = header_buf[2];

    let mut len_slice = &header_buf[4..8];
    let body_len = len_slice.get_u32() as usize;
    if body_len > MAX_HANDSHAKE_BODY {
        return Err(ZmpError::Protocol(ZmpErrorCode::BodyTooLarge));
    }

    let body_buf = vec![0u8; body_len];
    let BufResult(res, body_buf) = stream.read_exact(body_buf).await;
    res.map_err(|_| ZmpError::Protocol(ZmpErrorCode::Internal))?;

    Ok((flags, Bytes::from(body_buf)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_byte_round_trip() {
        // Sanity check that the frame this module writes is the frame
        // ZmpDecoder expects to read back.
        let hello = command::encode_hello(SocketType::Dealer.to_wire(), b"id");
        let frame = crate::codec::ZmpFrame::command(hello.clone()).encode();
        assert_eq!(frame[0], MAGIC);
        assert_eq!(frame[1], VERSION);
        assert_eq!(frame[2], crate::codec::FLAG_CONTROL);

        let body_len = u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]) as usize;
        assert_eq!(body_len, hello.len());
    }
}
