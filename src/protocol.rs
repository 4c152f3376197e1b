//! Wire protocol codec (C2).
//!
//! Fixed 16-byte header, payload up to [`MAX_PAYLOAD`] bytes, 2-byte
//! CRC-16/CCITT-FALSE trailer. The header is never transmuted from an
//! in-memory struct — `encode`/`decode` are the contract, laid out
//! byte-by-byte so endianness and padding can never leak from the host's
//! representation.
//!
//! ```text
//! offset  size  field
//! 0       2     magic   0x5AA5 (on the wire: A5 5A)
//! 2       1     type    0=STREAM 1=CMD 2=ACK 3=NACK
//! 3       1     ver     protocol version (0)
//! 4       2     len     payload length, 0..=MAX_PAYLOAD
//! 6       2     rsv     reserved, must be 0
//! 8       4     seq     monotonic (STREAM) / correlator (CMD, echoed in ACK/NACK)
//! 12      4     ts_ms   device monotonic time at emission
//! 16      len   payload
//! 16+len  2     crc     CRC-16/CCITT-FALSE over [0, 16+len), low byte first
//! ```

use crate::config::{CRC_LEN, HEADER_LEN, MAX_FRAME, MAX_PAYLOAD};

/// Wire magic, little-endian `A5 5A`.
pub const MAGIC: u16 = 0x5AA5;

/// Current protocol version.
pub const VERSION: u8 = 0;

/// Frame type tag.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum FrameType {
    Stream = 0,
    Cmd = 1,
    Ack = 2,
    Nack = 3,
}

impl FrameType {
    fn from_u8(v: u8) -> Option<FrameType> {
        match v {
            0 => Some(FrameType::Stream),
            1 => Some(FrameType::Cmd),
            2 => Some(FrameType::Ack),
            3 => Some(FrameType::Nack),
            _ => None,
        }
    }
}

/// Decoded frame header.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Header {
    pub frame_type: FrameType,
    pub ver: u8,
    pub len: u16,
    pub seq: u32,
    pub ts_ms: u32,
}

/// Failure reason for [`encode`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EncodeError {
    /// Payload exceeds [`MAX_PAYLOAD`].
    TooBig,
    /// Destination slice is too small to hold the full frame.
    BufferTooSmall,
}

/// Result of a decode attempt.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DecodeOutcome<'a> {
    /// A complete, CRC-valid frame was found.
    Frame {
        hdr: Header,
        payload: &'a [u8],
        /// Bytes consumed from the input (== `HEADER_LEN + len + CRC_LEN`).
        consumed: usize,
    },
    /// Fewer than `HEADER_LEN + len + CRC_LEN` bytes are present yet.
    Incomplete,
    /// Header or CRC failed validation; caller should resync.
    Invalid,
}

/// CRC-16/CCITT-FALSE: poly `0x1021`, init `0xFFFF`, no reflection, no final XOR.
pub fn crc16_ccitt_false(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &b in data {
        crc ^= (b as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Encode `(type, payload, seq, ts)` into `out`, returning the total bytes
/// written (`HEADER_LEN + payload.len() + CRC_LEN`). Never allocates.
pub fn encode(
    out: &mut [u8],
    frame_type: FrameType,
    payload: &[u8],
    seq: u32,
    ts_ms: u32,
) -> Result<usize, EncodeError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(EncodeError::TooBig);
    }
    let total = HEADER_LEN + payload.len() + CRC_LEN;
    if out.len() < total {
        return Err(EncodeError::BufferTooSmall);
    }

    out[0..2].copy_from_slice(&MAGIC.to_le_bytes());
    out[2] = frame_type as u8;
    out[3] = VERSION;
    out[4..6].copy_from_slice(&(payload.len() as u16).to_le_bytes());
    out[6..8].copy_from_slice(&0u16.to_le_bytes());
    out[8..12].copy_from_slice(&seq.to_le_bytes());
    out[12..16].copy_from_slice(&ts_ms.to_le_bytes());
    out[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);

    let span = HEADER_LEN + payload.len();
    let crc = crc16_ccitt_false(&out[..span]);
    out[span] = (crc & 0xFF) as u8;
    out[span + 1] = (crc >> 8) as u8;

    Ok(total)
}

/// Decode the header (without validating CRC or requiring the payload to be
/// present). Used by callers that only need `len` to compute `frame_len`
/// (the TX/RX engines' resync peek).
pub fn decode_header(buf: &[u8]) -> Option<Header> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    let magic = u16::from_le_bytes([buf[0], buf[1]]);
    if magic != MAGIC {
        return None;
    }
    let frame_type = FrameType::from_u8(buf[2])?;
    let ver = buf[3];
    if ver != VERSION {
        return None;
    }
    let len = u16::from_le_bytes([buf[4], buf[5]]);
    if len as usize > MAX_PAYLOAD {
        return None;
    }
    let rsv = u16::from_le_bytes([buf[6], buf[7]]);
    if rsv != 0 {
        return None;
    }
    let seq = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
    let ts_ms = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);
    Some(Header { frame_type, ver, len, seq, ts_ms })
}

/// Decode a complete frame from `buf`. Requires at least `HEADER_LEN +
/// CRC_LEN` bytes to distinguish `Incomplete` from `Invalid`.
pub fn decode(buf: &[u8]) -> DecodeOutcome<'_> {
    if buf.len() < HEADER_LEN + CRC_LEN {
        return DecodeOutcome::Incomplete;
    }

    let hdr = match decode_header(buf) {
        Some(h) => h,
        None => return DecodeOutcome::Invalid,
    };

    let consumed = HEADER_LEN + hdr.len as usize + CRC_LEN;
    if buf.len() < consumed {
        return DecodeOutcome::Incomplete;
    }

    let span = HEADER_LEN + hdr.len as usize;
    let got = u16::from_le_bytes([buf[span], buf[span + 1]]);
    let calc = crc16_ccitt_false(&buf[..span]);
    if got != calc {
        return DecodeOutcome::Invalid;
    }

    DecodeOutcome::Frame { hdr, payload: &buf[HEADER_LEN..span], consumed }
}

/// Total frame length implied by a decoded/peeked header.
#[inline]
pub fn frame_len(hdr: &Header) -> usize {
    HEADER_LEN + hdr.len as usize + CRC_LEN
}

const _: () = assert!(MAX_FRAME == HEADER_LEN + MAX_PAYLOAD + CRC_LEN);
