//! QUIC frame decoding
//!
//! Initial packets carry PADDING, PING, ACK and CRYPTO frames. Only the
//! first three appear before the ClientHello completes in practice, and the
//! decoder treats anything it does not recognize as malformed input rather
//! than skipping bytes it cannot frame.

use serde::Serialize;

use crate::wire::{read_next_vli, SliceReader};

use super::error::FrameError;

/// PADDING frame type
pub const FRAME_TYPE_PADDING: u64 = 0x00;
/// PING frame type
pub const FRAME_TYPE_PING: u64 = 0x01;
/// CRYPTO frame type
pub const FRAME_TYPE_CRYPTO: u64 = 0x06;

/// One decoded QUIC frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// A run of zero bytes; `length` counts the type byte and the run
    Padding { length: u64 },
    /// A liveness probe with no payload
    Ping,
    /// A fragment of the TLS handshake stream
    Crypto {
        offset: u64,
        length: u64,
        #[serde(skip)]
        data: Vec<u8>,
    },
}

impl Frame {
    /// The wire frame type.
    #[must_use]
    pub const fn frame_type(&self) -> u64 {
        match self {
            Self::Padding { .. } => FRAME_TYPE_PADDING,
            Self::Ping => FRAME_TYPE_PING,
            Self::Crypto { .. } => FRAME_TYPE_CRYPTO,
        }
    }

    /// The low byte of the frame type, as hashed into the fingerprint.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn type_low_byte(&self) -> u8 {
        (self.frame_type() & 0xff) as u8
    }
}

/// Decode every frame in a decrypted Initial payload.
///
/// # Errors
///
/// Returns [`FrameError::UnknownType`] for any frame type other than
/// PADDING, PING or CRYPTO, and [`FrameError::Truncated`] when a frame body
/// ends early.
pub fn read_all_frames(r: &mut SliceReader<'_>) -> Result<Vec<Frame>, FrameError> {
    let mut frames = Vec::new();

    while !r.is_empty() {
        let (frame_type, _) = read_next_vli(r)?;

        match frame_type {
            FRAME_TYPE_PADDING => {
                // count zero bytes; the first non-zero byte belongs to the
                // next frame and is pushed back
                let mut length = 1u64;
                while let Ok(b) = r.read_u8() {
                    if b != 0x00 {
                        r.unread_byte();
                        break;
                    }
                    length += 1;
                }
                frames.push(Frame::Padding { length });
            }
            FRAME_TYPE_PING => frames.push(Frame::Ping),
            FRAME_TYPE_CRYPTO => {
                let (offset, _) = read_next_vli(r)?;
                let (length, _) = read_next_vli(r)?;
                let len = usize::try_from(length)
                    .map_err(|_| FrameError::Truncated(crate::wire::WireError::UnexpectedEof))?;
                let data = r.read_exact(len)?.to_vec();
                frames.push(Frame::Crypto {
                    offset,
                    length,
                    data,
                });
            }
            other => return Err(FrameError::UnknownType(other)),
        }
    }

    Ok(frames)
}
