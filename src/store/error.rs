//! Error types for the fingerprint stores

use thiserror::Error;

use crate::quic::{GatherError, QuicError};
use crate::tls::TlsError;

/// Errors surfaced by the fingerprint stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// The fingerprinter was closed; all future calls fail fast
    #[error("fingerprinter is closed")]
    Closed,

    /// No entry is present for the requested peer key
    #[error("no entry for peer {0}")]
    NotFound(String),

    /// The ClientHello could not be read or parsed
    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),

    /// The Initial packet could not be decoded
    #[error("QUIC error: {0}")]
    Quic(#[from] QuicError),

    /// The per-peer gathering rejected the packet or failed
    #[error("gathering error: {0}")]
    Gather(#[from] GatherError),
}

impl StoreError {
    /// Check if this error is recoverable: everything except closure only
    /// affects the offending peer.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Closed => false,
            Self::NotFound(_) | Self::Tls(_) => true,
            Self::Quic(e) => e.is_recoverable(),
            Self::Gather(e) => e.is_recoverable(),
        }
    }
}
