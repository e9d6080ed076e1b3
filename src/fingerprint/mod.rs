//! Fingerprint digest helpers
//!
//! Every identifier in this crate is the first 8 bytes of a SHA-1 digest,
//! read as a big-endian integer. SHA-1 is used purely for its fixed,
//! well-known output layout; it has no security role here. The helpers fix
//! the field framing: variable-length inputs are preceded by their 32-bit
//! big-endian byte length, scalars are written big-endian with no prefix.

use sha1::{Digest, Sha1};

/// Incremental SHA-1 hasher with the framing used by all fingerprints.
#[derive(Debug, Default)]
pub struct FingerprintHasher {
    hasher: Sha1,
}

impl FingerprintHasher {
    /// Create a fresh hasher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash a byte array: 32-bit big-endian length, then the bytes.
    pub fn update_arr(&mut self, arr: &[u8]) {
        #[allow(clippy::cast_possible_truncation)]
        let len = arr.len() as u32;
        self.hasher.update(len.to_be_bytes());
        self.hasher.update(arr);
    }

    /// Hash a u16 sequence as its big-endian byte rendering, length-prefixed.
    pub fn update_u16_arr(&mut self, arr: &[u16]) {
        self.update_arr(&u16s_to_bytes(arr));
    }

    /// Hash a bare big-endian u16 with no length prefix.
    pub fn update_u16(&mut self, v: u16) {
        self.hasher.update(v.to_be_bytes());
    }

    /// Hash a bare big-endian u32 with no length prefix.
    pub fn update_u32(&mut self, v: u32) {
        self.hasher.update(v.to_be_bytes());
    }

    /// Hash a bare big-endian u64 with no length prefix.
    pub fn update_u64(&mut self, v: u64) {
        self.hasher.update(v.to_be_bytes());
    }

    /// Finish and return the first 8 digest bytes as a big-endian u64.
    #[must_use]
    pub fn finish_u64(self) -> u64 {
        let digest = self.hasher.finalize();
        let mut first8 = [0u8; 8];
        first8.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(first8)
    }

    /// Finish and return the first 8 digest bytes as a big-endian i64.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn finish_i64(self) -> i64 {
        self.finish_u64() as i64
    }
}

/// A 64-bit fingerprint identifier with its canonical hex rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FingerprintId(pub u64);

impl FingerprintId {
    /// Wrap a signed identifier, preserving the bit pattern.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn from_signed(id: i64) -> Self {
        Self(id as u64)
    }

    /// Lowercase hex rendering of the 8 big-endian bytes.
    #[must_use]
    pub fn as_hex(self) -> String {
        hex::encode(self.0.to_be_bytes())
    }
}

/// Render a u16 sequence as big-endian bytes.
pub(crate) fn u16s_to_bytes(arr: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(arr.len() * 2);
    for v in arr {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out
}
