//! CRYPTO stream reassembly
//!
//! A client may spread its ClientHello over several CRYPTO frames in several
//! Initial packets, in any order. The reassembler keeps a contiguous prefix
//! and a small map of pending fragments keyed by absolute offset, splicing
//! fragments onto the prefix as the gaps fill. The total length becomes
//! known once the 4-byte TLS Handshake header has been assembled.

use std::collections::HashMap;

use tracing::trace;

use super::error::ReassemblyError;
use super::frame::Frame;

/// Maximum number of pending fragments buffered per stream.
pub const MAX_CRYPTO_FRAGMENTS: usize = 32;

/// Maximum reassembled CRYPTO stream length in bytes.
pub const MAX_CRYPTO_LENGTH: u64 = 0x10000;

/// Outcome of feeding a fragment to the reassembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblyStatus {
    /// More fragments are required before the ClientHello is complete
    NeedMore,
    /// The full ClientHello has been assembled
    Complete,
}

/// Reassembles a fragmented ClientHello from CRYPTO frames.
#[derive(Debug, Default)]
pub struct ClientHelloReconstructor {
    /// Total handshake message length, 0 until the header is assembled
    full_len: u32,
    /// Contiguous reassembled prefix
    buf: Vec<u8>,
    /// Pending fragments by absolute offset
    frags: HashMap<u64, Vec<u8>>,
}

impl ClientHelloReconstructor {
    /// Create an empty reassembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one CRYPTO fragment.
    ///
    /// Fragments may arrive in any order; out-of-order fragments are held
    /// until the bytes before them arrive.
    ///
    /// # Errors
    ///
    /// - [`ReassemblyError::DuplicateFragment`] when a pending fragment
    ///   already claims this offset
    /// - [`ReassemblyError::OverlapFragment`] when the range overlaps a
    ///   pending fragment or the reassembled prefix
    /// - [`ReassemblyError::TooManyFragments`] when the pending map is over
    ///   its bound
    /// - [`ReassemblyError::OffsetTooHigh`] when the fragment (or the
    ///   declared message) extends past [`MAX_CRYPTO_LENGTH`]
    pub fn add_fragment(
        &mut self,
        offset: u64,
        frag: &[u8],
    ) -> Result<ReassemblyStatus, ReassemblyError> {
        if self.frags.contains_key(&offset) {
            return Err(ReassemblyError::DuplicateFragment);
        }

        let frag_len = frag.len() as u64;
        for (&off, pending) in &self.frags {
            let pending_len = pending.len() as u64;
            if (off < offset && off + pending_len > offset)
                || (offset < off && offset + frag_len > off)
            {
                return Err(ReassemblyError::OverlapFragment);
            }
        }
        if offset < self.buf.len() as u64 {
            return Err(ReassemblyError::OverlapFragment);
        }

        if self.frags.len() > MAX_CRYPTO_FRAGMENTS {
            return Err(ReassemblyError::TooManyFragments);
        }

        if offset + frag_len > MAX_CRYPTO_LENGTH {
            return Err(ReassemblyError::OffsetTooHigh);
        }

        self.frags.insert(offset, frag.to_vec());

        // splice every fragment that now lines up with the prefix
        while let Some(next) = self.frags.remove(&(self.buf.len() as u64)) {
            self.buf.extend_from_slice(&next);
        }

        if self.full_len == 0 && self.buf.len() >= 4 {
            // Handshake header: 1-byte type, 3-byte big-endian length
            self.full_len = 4 + u32::from_be_bytes([0, self.buf[1], self.buf[2], self.buf[3]]);
            if u64::from(self.full_len) > MAX_CRYPTO_LENGTH {
                return Err(ReassemblyError::OffsetTooHigh);
            }
            trace!(full_len = self.full_len, "learned ClientHello length");
        }

        if self.full_len > 0 && self.buf.len() as u64 >= u64::from(self.full_len) {
            return Ok(ReassemblyStatus::Complete);
        }
        Ok(ReassemblyStatus::NeedMore)
    }

    /// Feed every CRYPTO frame from a decoded packet.
    ///
    /// Stops early and reports [`ReassemblyStatus::Complete`] as soon as the
    /// ClientHello finishes.
    ///
    /// # Errors
    ///
    /// Propagates the first [`ReassemblyError`] from [`Self::add_fragment`].
    pub fn add_frames(&mut self, frames: &[Frame]) -> Result<ReassemblyStatus, ReassemblyError> {
        for frame in frames {
            if let Frame::Crypto { offset, data, .. } = frame {
                if self.add_fragment(*offset, data)? == ReassemblyStatus::Complete {
                    return Ok(ReassemblyStatus::Complete);
                }
            }
        }
        Ok(ReassemblyStatus::NeedMore)
    }

    /// The reassembled ClientHello bytes, once complete.
    #[must_use]
    pub fn reconstructed(&self) -> Option<&[u8]> {
        if self.full_len == 0 || (self.buf.len() as u64) < u64::from(self.full_len) {
            return None;
        }
        Some(&self.buf[..self.full_len as usize])
    }
}
