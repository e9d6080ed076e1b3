//! Error types for TLS `ClientHello` handling

use std::io;

use thiserror::Error;

/// Errors raised while reading or parsing a `ClientHello`
///
/// Any of these makes the `ClientHello` unusable for fingerprinting; the
/// store is not updated and the offending peer is simply not fingerprinted.
#[derive(Debug, Error)]
pub enum TlsError {
    /// The first record byte is not the handshake content type (0x16)
    #[error("not a TLS handshake record")]
    NotHandshake,

    /// The handshake message is not a ClientHello (type 0x01)
    #[error("not a ClientHello handshake message")]
    NotClientHello,

    /// The record ended before a required field
    #[error("truncated ClientHello: {0}")]
    Truncated(&'static str),

    /// An extension payload did not match its declared layout
    #[error("malformed {0} extension")]
    MalformedExtension(&'static str),

    /// I/O error while reading the record off a stream
    #[error("I/O error reading ClientHello: {0}")]
    Io(#[from] io::Error),
}
