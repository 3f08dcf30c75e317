//! ZMP wire framing: the byte-level encoding of frames on a connection.
//!
//! Every frame is a fixed 8-byte header followed by a body:
//!
//! ```text
//! +--------+---------+------------------+---------+-----------------+
//! | magic  | version | flags            | reserved| body_len (u32)   |
//! | 1 byte | 1 byte  | 1 byte           | 1 byte  | 4 bytes, BE      |
//! +--------+---------+------------------+---------+-----------------+
//! ```
//!
//! `magic` is always `0x5A`, `version` is always `0x02`, `reserved` must be
//! zero. Flags are a bitmask: bit0 MORE, bit1 CONTROL, bit2 IDENTITY,
//! bit3 SUBSCRIBE, bit4 CANCEL; bits 5-7 are reserved and must be zero.
//! CONTROL is mutually exclusive with MORE and IDENTITY; SUBSCRIBE and
//! CANCEL are mutually exclusive with each other.

use bytes::{Buf, Bytes, BytesMut};
use zlink_core::buffer::SegmentedBuffer;
use zlink_core::error::ZmpErrorCode;
use std::io;

use crate::config::STAGING_BUF_INITIAL_CAP;

pub const MAGIC: u8 = 0x5A;
pub const VERSION: u8 = 0x02;
pub const HEADER_LEN: usize = 8;

pub const FLAG_MORE: u8 = 0x01;
pub const FLAG_CONTROL: u8 = 0x02;
pub const FLAG_IDENTITY: u8 = 0x04;
pub const FLAG_SUBSCRIBE: u8 = 0x08;
pub const FLAG_CANCEL: u8 = 0x10;
const FLAG_RESERVED_MASK: u8 = 0xE0;

/// Errors produced while framing/deframing the wire protocol.
///
/// This is a thin, `io::Error`-friendly wrapper around [`ZmpErrorCode`];
/// the code is what actually gets reported to the peer in an ERROR frame.
#[derive(Debug, thiserror::Error)]
pub enum ZmpError {
    #[error("protocol violation: {0}")]
    Protocol(#[from] ZmpErrorCode),
}

impl ZmpError {
    #[must_use]
    pub const fn code(&self) -> ZmpErrorCode {
        match self {
            Self::Protocol(code) => *code,
        }
    }
}

impl From<ZmpError> for io::Error {
    fn from(err: ZmpError) -> Self {
        Self::new(io::ErrorKind::InvalidData, err)
    }
}

pub type Result<T> = std::result::Result<T, ZmpError>;

/// A decoded ZMP frame: flags plus an owned, zero-copy payload slice.
#[derive(Debug, Clone)]
pub struct ZmpFrame {
    pub flags: u8,
    pub payload: Bytes,
}

impl ZmpFrame {
    #[inline]
    pub const fn more(&self) -> bool {
        (self.flags & FLAG_MORE) != 0
    }

    #[inline]
    pub const fn is_control(&self) -> bool {
        (self.flags & FLAG_CONTROL) != 0
    }

    /// Alias kept for callers that speak of "commands" rather than "control frames".
    #[inline]
    pub const fn is_command(&self) -> bool {
        self.is_control()
    }

    #[inline]
    pub const fn is_identity(&self) -> bool {
        (self.flags & FLAG_IDENTITY) != 0
    }

    #[inline]
    pub const fn is_subscribe(&self) -> bool {
        (self.flags & FLAG_SUBSCRIBE) != 0
    }

    #[inline]
    pub const fn is_cancel(&self) -> bool {
        (self.flags & FLAG_CANCEL) != 0
    }

    fn validate_flags(flags: u8) -> Result<()> {
        if flags & FLAG_RESERVED_MASK != 0 {
            return Err(ZmpError::Protocol(ZmpErrorCode::FlagsInvalid));
        }
        if flags & FLAG_CONTROL != 0 && flags & (FLAG_MORE | FLAG_IDENTITY) != 0 {
            return Err(ZmpError::Protocol(ZmpErrorCode::FlagsInvalid));
        }
        if flags & FLAG_SUBSCRIBE != 0 && flags & FLAG_CANCEL != 0 {
            return Err(ZmpError::Protocol(ZmpErrorCode::FlagsInvalid));
        }
        Ok(())
    }

    /// Create a data frame.
    #[must_use]
    pub const fn data(payload: Bytes, more: bool) -> Self {
        let flags = if more { FLAG_MORE } else { 0 };
        Self { flags, payload }
    }

    /// Create a control frame. `payload` begins with the control-type byte
    /// (see `command.rs`).
    #[must_use]
    pub const fn command(payload: Bytes) -> Self {
        Self {
            flags: FLAG_CONTROL,
            payload,
        }
    }

    /// Create a ROUTER/DEALER identity-prefix frame.
    #[must_use]
    pub const fn identity(payload: Bytes) -> Self {
        Self {
            flags: FLAG_IDENTITY,
            payload,
        }
    }

    /// Create a SUB/XSUB subscribe frame.
    #[must_use]
    pub const fn subscribe(topic: Bytes) -> Self {
        Self {
            flags: FLAG_SUBSCRIBE,
            payload: topic,
        }
    }

    /// Create a SUB/XSUB unsubscribe frame.
    #[must_use]
    pub const fn cancel(topic: Bytes) -> Self {
        Self {
            flags: FLAG_CANCEL,
            payload: topic,
        }
    }

    /// Encode this frame's 8-byte header + body.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let body_len = self.payload.len();
        let mut out = BytesMut::with_capacity(HEADER_LEN + body_len);
        out.extend_from_slice(&[MAGIC, VERSION, self.flags, 0]);
        out.extend_from_slice(&(body_len as u32).to_be_bytes());
        out.extend_from_slice(&self.payload);
        out.freeze()
    }
}

enum DecodeState {
    AwaitHeader,
    AwaitBody { flags: u8, len: usize },
}

/// Stateful ZMP decoder.
///
/// Fast path: the whole frame is already buffered, so the payload is a
/// zero-copy slice out of the `SegmentedBuffer`. Slow path: the frame
/// straddles a read boundary, so bytes are reassembled into `staging`.
pub struct ZmpDecoder {
    state: DecodeState,
    staging: BytesMut,
    max_body_len: usize,
    in_multipart: bool,
}

impl Default for ZmpDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ZmpDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_body_len(usize::MAX)
    }

    #[must_use]
    pub fn with_max_body_len(max_body_len: usize) -> Self {
        Self {
            state: DecodeState::AwaitHeader,
            staging: BytesMut::with_capacity(STAGING_BUF_INITIAL_CAP),
            max_body_len,
            in_multipart: false,
        }
    }

    /// Whether a multipart message is mid-flight (last frame had MORE set).
    ///
    /// # ZeroMQ Compatibility
    ///
    /// Corresponds to `ZMQ_RCVMORE` (13).
    #[inline]
    pub const fn has_more(&self) -> bool {
        self.in_multipart
    }

    /// Decode a single frame from `src`.
    ///
    /// Returns `Ok(Some(frame))` when a complete frame was decoded,
    /// `Ok(None)` when more bytes are needed, and `Err` on a protocol
    /// violation (caller should send an ERROR control frame and close).
    pub fn decode(&mut self, src: &mut SegmentedBuffer) -> Result<Option<ZmpFrame>> {
        loop {
            match &self.state {
                DecodeState::AwaitHeader => {
                    if src.len() < HEADER_LEN {
                        return Ok(None);
                    }
                    let mut hdr = [0u8; HEADER_LEN];
                    if !src.copy_prefix(HEADER_LEN, &mut hdr) {
                        return Ok(None);
                    }

                    if hdr[0] != MAGIC {
                        return Err(ZmpError::Protocol(ZmpErrorCode::InvalidMagic));
                    }
                    if hdr[1] != VERSION {
                        return Err(ZmpError::Protocol(ZmpErrorCode::VersionMismatch));
                    }
                    if hdr[3] != 0 {
                        return Err(ZmpError::Protocol(ZmpErrorCode::FlagsInvalid));
                    }
                    let flags = hdr[2];
                    ZmpFrame::validate_flags(flags)?;

                    let mut len_buf = &hdr[4..8];
                    let len = len_buf.get_u32() as usize;
                    if len > self.max_body_len {
                        return Err(ZmpError::Protocol(ZmpErrorCode::BodyTooLarge));
                    }

                    src.advance(HEADER_LEN);
                    self.state = DecodeState::AwaitBody { flags, len };
                }

                DecodeState::AwaitBody { flags, len } => {
                    let (flags, len) = (*flags, *len);

                    // Fast path: whole body already buffered and nothing staged yet.
                    if self.staging.is_empty() {
                        if src.len() >= len {
                            let payload = src
                                .take_bytes(len)
                                .expect("len check ensures body is available");
                            self.state = DecodeState::AwaitHeader;
                            self.in_multipart = flags & FLAG_MORE != 0;
                            return Ok(Some(ZmpFrame { flags, payload }));
                        }
                    }

                    // Slow path: reassemble across reads.
                    let needed = len - self.staging.len();
                    let take = needed.min(src.len());
                    if take > 0 {
                        if let Some(bytes) = src.take_bytes(take) {
                            self.staging.extend_from_slice(&bytes);
                        }
                    }

                    if self.staging.len() < len {
                        return Ok(None);
                    }

                    let payload = self.staging.split().freeze();
                    self.state = DecodeState::AwaitHeader;
                    self.in_multipart = flags & FLAG_MORE != 0;
                    return Ok(Some(ZmpFrame { flags, payload }));
                }
            }
        }
    }
}

/// Encode a multipart data message directly into a buffer.
///
/// Zero-allocation helper: reuses the caller's `BytesMut` instead of
/// building intermediate `ZmpFrame` values.
pub fn encode_multipart(msg: &[Bytes], buf: &mut BytesMut) {
    for (i, part) in msg.iter().enumerate() {
        let more = i + 1 < msg.len();
        let flags = if more { FLAG_MORE } else { 0 };

        buf.reserve(HEADER_LEN + part.len());
        buf.extend_from_slice(&[MAGIC, VERSION, flags, 0]);
        buf.extend_from_slice(&(part.len() as u32).to_be_bytes());
        buf.extend_from_slice(part);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(buf: &mut SegmentedBuffer, bytes: Bytes) {
        buf.push(bytes);
    }

    #[test]
    fn round_trips_single_frame() {
        let frame = ZmpFrame::data(Bytes::from_static(b"hello"), false);
        let encoded = frame.encode();

        let mut src = SegmentedBuffer::new();
        push(&mut src, encoded);

        let mut dec = ZmpDecoder::new();
        let decoded = dec.decode(&mut src).unwrap().unwrap();
        assert_eq!(decoded.payload, Bytes::from_static(b"hello"));
        assert!(!decoded.more());
    }

    #[test]
    fn decodes_frame_split_across_reads() {
        let frame = ZmpFrame::data(Bytes::from_static(b"0123456789"), true);
        let encoded = frame.encode();

        let mut src = SegmentedBuffer::new();
        let mut dec = ZmpDecoder::new();

        push(&mut src, encoded.slice(0..5));
        assert!(dec.decode(&mut src).unwrap().is_none());

        push(&mut src, encoded.slice(5..));
        let decoded = dec.decode(&mut src).unwrap().unwrap();
        assert_eq!(decoded.payload, Bytes::from_static(b"0123456789"));
        assert!(decoded.more());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bad = BytesMut::new();
        bad.extend_from_slice(&[0x00, VERSION, 0, 0, 0, 0, 0, 0]);
        let mut src = SegmentedBuffer::new();
        push(&mut src, bad.freeze());

        let mut dec = ZmpDecoder::new();
        let err = dec.decode(&mut src).unwrap_err();
        assert_eq!(err.code(), ZmpErrorCode::InvalidMagic);
    }

    #[test]
    fn rejects_version_mismatch() {
        let mut bad = BytesMut::new();
        bad.extend_from_slice(&[MAGIC, 0x01, 0, 0, 0, 0, 0, 0]);
        let mut src = SegmentedBuffer::new();
        push(&mut src, bad.freeze());

        let mut dec = ZmpDecoder::new();
        let err = dec.decode(&mut src).unwrap_err();
        assert_eq!(err.code(), ZmpErrorCode::VersionMismatch);
    }

    #[test]
    fn decodes_hand_built_header_with_flags_at_byte_two() {
        // Built by hand against spec.md's wire layout (magic, version,
        // flags, reserved, body_len) rather than via `ZmpFrame::encode`, so
        // this fails if encode/decode ever agree with each other but not
        // with the wire format.
        let mut raw = BytesMut::new();
        raw.extend_from_slice(&[MAGIC, VERSION, FLAG_MORE, 0]);
        raw.extend_from_slice(&3u32.to_be_bytes());
        raw.extend_from_slice(b"abc");

        let mut src = SegmentedBuffer::new();
        push(&mut src, raw.freeze());

        let mut dec = ZmpDecoder::new();
        let frame = dec.decode(&mut src).unwrap().unwrap();
        assert_eq!(frame.flags, FLAG_MORE);
        assert!(frame.more());
        assert_eq!(frame.payload, Bytes::from_static(b"abc"));
    }

    #[test]
    fn rejects_nonzero_reserved_byte() {
        let mut bad = BytesMut::new();
        bad.extend_from_slice(&[MAGIC, VERSION, 0, 0x01, 0, 0, 0, 0]);
        let mut src = SegmentedBuffer::new();
        push(&mut src, bad.freeze());

        let mut dec = ZmpDecoder::new();
        let err = dec.decode(&mut src).unwrap_err();
        assert_eq!(err.code(), ZmpErrorCode::FlagsInvalid);
    }

    #[test]
    fn rejects_control_and_more_combined() {
        let mut bad = BytesMut::new();
        bad.extend_from_slice(&[MAGIC, VERSION, FLAG_CONTROL | FLAG_MORE, 0, 0, 0, 0, 0]);
        let mut src = SegmentedBuffer::new();
        push(&mut src, bad.freeze());

        let mut dec = ZmpDecoder::new();
        let err = dec.decode(&mut src).unwrap_err();
        assert_eq!(err.code(), ZmpErrorCode::FlagsInvalid);
    }

    #[test]
    fn rejects_body_too_large() {
        let mut bad = BytesMut::new();
        bad.extend_from_slice(&[MAGIC, VERSION, 0, 0]);
        bad.extend_from_slice(&100u32.to_be_bytes());
        let mut src = SegmentedBuffer::new();
        push(&mut src, bad.freeze());

        let mut dec = ZmpDecoder::with_max_body_len(10);
        let err = dec.decode(&mut src).unwrap_err();
        assert_eq!(err.code(), ZmpErrorCode::BodyTooLarge);
    }

    #[test]
    fn encode_multipart_sets_more_on_all_but_last() {
        let mut buf = BytesMut::new();
        let msg = vec![Bytes::from_static(b"a"), Bytes::from_static(b"bb")];
        encode_multipart(&msg, &mut buf);

        let mut src = SegmentedBuffer::new();
        push(&mut src, buf.freeze());

        let mut dec = ZmpDecoder::new();
        let f1 = dec.decode(&mut src).unwrap().unwrap();
        assert!(f1.more());
        let f2 = dec.decode(&mut src).unwrap().unwrap();
        assert!(!f2.more());
    }
}
