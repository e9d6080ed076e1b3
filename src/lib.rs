//! wireprint: Passive TLS and QUIC client fingerprinting
//!
//! This crate identifies TLS and QUIC clients by parsing the first flight of
//! handshake bytes and reducing the observed parameters to stable numeric
//! identifiers. It never originates traffic and never negotiates TLS; the
//! only decryption it performs is on QUIC Initial packets, whose keys are
//! derived from a public salt and the client-chosen Destination Connection ID.
//!
//! # Architecture
//!
//! ```text
//! TCP stream → ClientHello reader → parser → TlsFingerprinter store
//!                                      ↑
//! UDP payload → Initial decoder → CRYPTO reassembly → QuicFingerprinter store
//!               (HP removal, AEAD open, frame decode)
//! ```
//!
//! # Features
//!
//! - **TLS fingerprinting**: parse a `ClientHello` record and compute a
//!   SHA-1-based 64-bit identifier, with GREASE values folded to a fixed
//!   placeholder and a normalized variant that survives extension-order
//!   randomization
//! - **QUIC fingerprinting**: derive Initial keys from the DCID, remove
//!   header protection, decrypt the payload, reassemble the fragmented
//!   `ClientHello` across packets and compute a composite identifier over
//!   header shape, `ClientHello` and transport parameters
//! - **Concurrent stores**: per-peer keyed caches with per-entry TTL and an
//!   await-on-completion lookup for multi-packet QUIC flights
//!
//! # Quick Start
//!
//! ```no_run
//! use wireprint::store::QuicFingerprinter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fingerprinter = QuicFingerprinter::new();
//!
//! // Feed UDP payloads as they arrive; non-QUIC packets are ignored.
//! let peer = "192.0.2.7:51034".to_string();
//! let payload: Vec<u8> = vec![/* QUIC Initial packet bytes */];
//! fingerprinter.handle_packet(&peer, &payload).await?;
//!
//! // Block until the ClientHello has been reassembled or the deadline hits.
//! let fp = fingerprinter.lookup_await(&peer).await?;
//! println!("QUIC fingerprint: {}", fp.hex_id);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`wire`]: QUIC variable-length integers, slice cursor, rewindable stream
//! - [`tls`]: `ClientHello` record reading, parsing and fingerprint hash
//! - [`quic`]: Initial packet crypto, frame decoding, CRYPTO reassembly,
//!   transport parameters and the composite QUIC fingerprint
//! - [`fingerprint`]: SHA-1 digest helpers shared by the hash computations
//! - [`store`]: concurrent TTL stores keyed by peer address
//! - [`error`]: aggregated error types

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod fingerprint;
pub mod quic;
pub mod store;
pub mod tls;
pub mod wire;

// Re-export commonly used types at the crate root
pub use error::{Result, WireprintError};
pub use fingerprint::{FingerprintHasher, FingerprintId};
pub use quic::{
    client_initial_keys, compute_header_protection, decode_initial, decrypt_aes128_gcm,
    generate_quic_fingerprint, is_grease_transport_parameter, ClientHelloReconstructor,
    ClientInitial, Frame, FrameError, GatherError, GatheredClientInitials, QuicClientHello,
    QuicError, QuicFingerprint, QuicHeader, ReassemblyError, ReassemblyStatus,
    TransportParameters, MAX_CRYPTO_FRAGMENTS, MAX_CRYPTO_LENGTH,
};
pub use store::{
    QuicFingerprinter, StoreError, TlsFingerprinter, DEFAULT_QUIC_FINGERPRINT_TTL,
    DEFAULT_TLS_FINGERPRINT_TTL,
};
pub use tls::{is_grease_u16, ClientHello, TlsError, GREASE_PLACEHOLDER};
pub use wire::{decode_vli, read_next_vli, unset_vli_bits, RewindStream, SliceReader, WireError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
