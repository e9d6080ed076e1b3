//! Error types for wireprint
//!
//! Each subsystem defines its own error enum next to the code that raises it;
//! this module aggregates them into a single crate-level error with recovery
//! hints. The classification follows one rule: errors caused by one peer's
//! bytes are recoverable for the process (drop the peer, keep serving), while
//! errors in the fingerprinter lifecycle are not.

use std::io;

use thiserror::Error;

use crate::quic::{FrameError, GatherError, QuicError, ReassemblyError};
use crate::store::StoreError;
use crate::tls::TlsError;
use crate::wire::WireError;

/// Top-level error type for wireprint
#[derive(Debug, Error)]
pub enum WireprintError {
    /// Wire-format errors (variable-length integers, truncated buffers)
    #[error("Wire format error: {0}")]
    Wire(#[from] WireError),

    /// TLS ClientHello reading and parsing errors
    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),

    /// QUIC Initial packet decoding errors
    #[error("QUIC error: {0}")]
    Quic(#[from] QuicError),

    /// QUIC frame decoding errors
    #[error("QUIC frame error: {0}")]
    Frame(#[from] FrameError),

    /// CRYPTO stream reassembly errors
    #[error("CRYPTO reassembly error: {0}")]
    Reassembly(#[from] ReassemblyError),

    /// Initial packet gathering errors
    #[error("Gathering error: {0}")]
    Gather(#[from] GatherError),

    /// Fingerprint store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// I/O errors not covered by other categories
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl WireprintError {
    /// Check if this error is recoverable (the caller can keep processing
    /// other peers or further packets from the same peer)
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Wire(_) | Self::Tls(_) | Self::Frame(_) => true,
            Self::Quic(e) => e.is_recoverable(),
            Self::Reassembly(e) => e.is_recoverable(),
            Self::Gather(e) => e.is_recoverable(),
            Self::Store(e) => e.is_recoverable(),
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock
                    | io::ErrorKind::ConnectionReset
            ),
        }
    }
}

/// Type alias for Result with `WireprintError`
pub type Result<T> = std::result::Result<T, WireprintError>;
