//! Wire frame codec
//!
//! One data fragment travels the air as a length-prefixed frame with a
//! fixed 7-byte header:
//!
//! ```text
//! ┌────────┬─────────────┬─────────────┬───────┬──────────┬────────────┐
//! │ 0      │ 1-2         │ 3-4         │ 5     │ 6        │ 7..        │
//! │ length │ destination │ source      │ seq   │ reserved │ payload    │
//! │        │ (LE u16)    │ (LE u16)    │       │ (zero)   │ (len - 7)  │
//! └────────┴─────────────┴─────────────┴───────┴──────────┴────────────┘
//! ```
//!
//! `length` covers the whole frame, so the minimum is 7 and the maximum
//! 255, leaving up to 248 payload bytes. Decoding rejects any frame whose
//! length byte claims less than a full header.

use crate::address::Addr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bytes of header before the payload.
pub const FRAME_HEADER_LEN: usize = 7;

/// Largest frame the length byte can describe.
pub const FRAME_MAX: usize = 255;

/// Largest payload a single fragment can carry.
pub const PAYLOAD_MAX: usize = FRAME_MAX - FRAME_HEADER_LEN;

/// Frame encode/decode failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("payload of {0} bytes exceeds the 248-byte maximum")]
    PayloadTooLarge(usize),
    #[error("buffer of {have} bytes cannot hold a {need}-byte frame")]
    BufferTooSmall { need: usize, have: usize },
    #[error("frame length {0} is shorter than the 7-byte header")]
    TooShort(usize),
    #[error("frame length byte says {length} but only {available} bytes arrived")]
    Truncated { length: u8, available: usize },
}

/// One unit of application data in flight between two addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    dst: Addr,
    src: Addr,
    seq: u8,
    payload: Vec<u8>,
}

impl Fragment {
    /// Build a fragment, refusing payloads that cannot be framed.
    pub fn new(dst: Addr, src: Addr, seq: u8, payload: &[u8]) -> Result<Self, FrameError> {
        if payload.len() > PAYLOAD_MAX {
            return Err(FrameError::PayloadTooLarge(payload.len()));
        }
        Ok(Fragment {
            dst,
            src,
            seq,
            payload: payload.to_vec(),
        })
    }

    pub fn dst(&self) -> Addr {
        self.dst
    }

    pub fn src(&self) -> Addr {
        self.src
    }

    pub fn seq(&self) -> u8 {
        self.seq
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Total on-air size of this fragment.
    pub fn frame_len(&self) -> usize {
        FRAME_HEADER_LEN + self.payload.len()
    }

    /// Write the frame into `buf`, returning the bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, FrameError> {
        let need = self.frame_len();
        if buf.len() < need {
            return Err(FrameError::BufferTooSmall {
                need,
                have: buf.len(),
            });
        }
        buf[0] = need as u8;
        buf[1..3].copy_from_slice(&self.dst.as_u16().to_le_bytes());
        buf[3..5].copy_from_slice(&self.src.as_u16().to_le_bytes());
        buf[5] = self.seq;
        buf[6] = 0;
        buf[7..need].copy_from_slice(&self.payload);
        Ok(need)
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.frame_len()];
        // the buffer is sized to fit, so this cannot fail
        let n = self.encode(&mut buf).unwrap_or(0);
        buf.truncate(n);
        buf
    }

    /// Parse a frame. Bytes past the declared length are ignored, so a
    /// fixed-size radio buffer can be handed in directly.
    pub fn decode(bytes: &[u8]) -> Result<Fragment, FrameError> {
        let &length = bytes.first().ok_or(FrameError::TooShort(0))?;
        let length = length as usize;
        if length < FRAME_HEADER_LEN {
            return Err(FrameError::TooShort(length));
        }
        if length > bytes.len() {
            return Err(FrameError::Truncated {
                length: length as u8,
                available: bytes.len(),
            });
        }
        Ok(Fragment {
            dst: Addr::from_u16(u16::from_le_bytes([bytes[1], bytes[2]])),
            src: Addr::from_u16(u16::from_le_bytes([bytes[3], bytes[4]])),
            seq: bytes[5],
            payload: bytes[FRAME_HEADER_LEN..length].to_vec(),
        })
    }

    /// The identity used for duplicate suppression.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            src: self.src,
            seq: self.seq,
            payload_crc: crc16_ccitt(&self.payload),
        }
    }
}

/// `(source, sequence, payload hash)` tuple identifying a recently seen
/// fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub src: Addr,
    pub seq: u8,
    pub payload_crc: u16,
}

/// CRC-16-CCITT, used as the payload hash in fingerprints.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}
