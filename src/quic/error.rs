//! Error types for the QUIC Initial pipeline
//!
//! The taxonomy separates three classes: benign rejections (the packet is
//! simply not a QUIC Initial and the caller should ignore it), per-packet
//! failures (dropped, processing continues), and per-gathering failures
//! (the peer's gathering is abandoned).

use thiserror::Error;

use crate::tls::TlsError;
use crate::wire::WireError;

/// Errors raised while decoding a QUIC Initial packet
#[derive(Debug, Error)]
pub enum QuicError {
    /// The packet is not in QUIC long header format
    #[error("packet is not in QUIC long header format")]
    NotLongHeader,

    /// The packet is a long header but not an Initial packet
    #[error("packet is not a QUIC Initial packet")]
    NotInitial,

    /// Fewer than 7 bytes before the token length field
    #[error("packet too short")]
    PacketTooShort,

    /// The declared payload length is below the protocol minimum of 20
    #[error("declared packet length too short: {0}")]
    PayloadTooShort(u64),

    /// The packet ended before a declared field
    #[error("truncated packet: {0}")]
    Truncated(#[from] WireError),

    /// Initial key derivation failed
    #[error("initial key derivation failed")]
    KeyDerivation,

    /// AEAD authentication failed, the payload cannot be decrypted
    #[error("AEAD open failed")]
    AeadOpenFailed,

    /// The decrypted payload contained an undecodable frame
    #[error("frame decoding failed: {0}")]
    Frame(#[from] FrameError),
}

impl QuicError {
    /// True for the sentinel rejections that mean "not my traffic": the
    /// fingerprinter treats these as silent no-ops.
    #[must_use]
    pub const fn is_benign(&self) -> bool {
        matches!(self, Self::NotLongHeader | Self::NotInitial)
    }

    /// All decode errors poison only the offending packet.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        true
    }
}

/// Errors raised while decoding QUIC frames
#[derive(Debug, Error)]
pub enum FrameError {
    /// Initial packets are restricted to PADDING, PING and CRYPTO here;
    /// anything else is treated as malformed input
    #[error("unknown frame type {0:#04x}")]
    UnknownType(u64),

    /// A frame body ended before its declared length
    #[error("truncated frame: {0}")]
    Truncated(#[from] WireError),
}

/// Errors raised by the CRYPTO stream reassembler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReassemblyError {
    /// A fragment with this offset is already pending
    #[error("duplicate CRYPTO fragment")]
    DuplicateFragment,

    /// The fragment overlaps a pending fragment or the reassembled prefix
    #[error("overlapping CRYPTO fragment")]
    OverlapFragment,

    /// More pending fragments than the reassembler is willing to buffer
    #[error("too many CRYPTO fragments")]
    TooManyFragments,

    /// The fragment extends past the maximum CRYPTO stream length
    #[error("CRYPTO fragment offset too high")]
    OffsetTooHigh,
}

impl ReassemblyError {
    /// Duplicate and overlapping fragments are dropped while gathering
    /// continues; the buffering bounds abandon the whole gathering.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::DuplicateFragment | Self::OverlapFragment)
    }
}

/// Errors raised while gathering a peer's Initial packets
#[derive(Debug, Error)]
pub enum GatherError {
    /// The gathering deadline passed before the ClientHello completed
    #[error("client initials gathering has expired")]
    Expired,

    /// The packet number or packet count exceeded the per-peer bounds
    #[error("packet rejected: gathering limits exceeded")]
    PacketRejected,

    /// The reassembler rejected a CRYPTO fragment
    #[error("failed to reassemble ClientHello: {0}")]
    Reassembly(#[from] ReassemblyError),

    /// The reassembled bytes did not parse as a ClientHello
    #[error("failed to parse reassembled ClientHello: {0}")]
    ClientHello(#[from] TlsError),

    /// The ClientHello carries no quic_transport_parameters extension
    #[error("no QUIC transport parameters extension in ClientHello")]
    MissingTransportParameters,

    /// The quic_transport_parameters extension payload is malformed
    #[error("malformed QUIC transport parameters: {0}")]
    TransportParameters(#[source] WireError),

    /// The gathering has not produced a complete ClientHello yet
    #[error("gathering is not complete")]
    Incomplete,
}

impl GatherError {
    /// True when the gathering itself survives the error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::PacketRejected | Self::Incomplete => true,
            Self::Reassembly(e) => e.is_recoverable(),
            Self::Expired
            | Self::ClientHello(_)
            | Self::MissingTransportParameters
            | Self::TransportParameters(_) => false,
        }
    }
}
