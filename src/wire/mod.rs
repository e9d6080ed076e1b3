//! Wire-format primitives
//!
//! This module provides the low-level byte plumbing shared by the TLS and
//! QUIC parsers:
//!
//! - QUIC variable-length integers (RFC 9000 Section 16)
//! - a cursor over a byte slice with a one-byte rewind, used by the frame
//!   decoder to push back the byte that terminates a PADDING run
//! - a rewindable async stream that replays already-consumed bytes before
//!   delegating to the underlying connection, so a fingerprinted TCP stream
//!   can be handed to a real TLS stack untouched

mod reader;
mod rewind;
mod varint;

pub use reader::SliceReader;
pub use rewind::RewindStream;
pub use varint::{decode_vli, read_next_vli, unset_vli_bits, WireError};
