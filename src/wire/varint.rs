//! QUIC variable-length integer codec
//!
//! The top two bits of the first byte select the encoding width (1, 2, 4 or
//! 8 bytes); the remaining bits form the big-endian magnitude. See RFC 9000
//! Section 16.

use thiserror::Error;

use super::SliceReader;

/// Controls whether [`unset_vli_bits`] actually clears the length bits.
///
/// Stored transport-parameter values have their VLI prefix bits cleared so
/// that hashing only sees the numeric magnitude, not the encoding width the
/// client happened to pick.
const UNSET_VLI_BITS: bool = true;

/// Wire-format errors raised by the byte-level readers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// The input ended before the indicated number of bytes was available
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// The input length does not match the VLI length class
    #[error("input length does not match the VLI length class")]
    InvalidLength,
}

/// Read the next variable-length integer from the reader.
///
/// Returns the decoded value and the number of bytes consumed.
///
/// ```
/// use wireprint::wire::{read_next_vli, SliceReader};
///
/// let mut r = SliceReader::new(&[0x44, 0xbc]);
/// assert_eq!(read_next_vli(&mut r).unwrap(), (1212, 2));
/// ```
///
/// # Errors
///
/// Returns [`WireError::UnexpectedEof`] when the reader runs out of bytes
/// before the encoding is complete.
pub fn read_next_vli(r: &mut SliceReader<'_>) -> Result<(u64, usize), WireError> {
    let first = r.read_u8()?;
    let n = match first & 0xc0 {
        0x00 => 1,
        0x40 => 2,
        0x80 => 4,
        _ => 8,
    };

    let mut val = u64::from(first & 0x3f);
    for _ in 1..n {
        val = (val << 8) | u64::from(r.read_u8()?);
    }

    Ok((val, n))
}

/// Decode a complete variable-length integer.
///
/// Unlike [`read_next_vli`], the input must contain exactly the bytes of one
/// encoded integer.
///
/// # Errors
///
/// Returns [`WireError::InvalidLength`] when the input length does not match
/// the length class selected by the first byte.
pub fn decode_vli(vli: &[u8]) -> Result<u64, WireError> {
    let mut r = SliceReader::new(vli);
    let (val, n) = read_next_vli(&mut r)?;
    if n != vli.len() {
        return Err(WireError::InvalidLength);
    }
    Ok(val)
}

/// Clear the two VLI length bits of the first byte in place.
///
/// No-op on an empty slice.
pub fn unset_vli_bits(vli: &mut [u8]) {
    if UNSET_VLI_BITS {
        if let Some(first) = vli.first_mut() {
            *first &= 0x3f;
        }
    }
}
