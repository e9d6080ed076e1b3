//! QUIC Initial packet pipeline
//!
//! Everything needed to turn raw UDP payloads into a QUIC client
//! fingerprint:
//!
//! 1. [`decode_initial`] rejects non-Initial traffic, derives the
//!    per-connection keys from the DCID, removes header protection, opens
//!    the AEAD payload and decodes the frames
//! 2. [`ClientHelloReconstructor`] reassembles the fragmented ClientHello
//!    from CRYPTO frames in any arrival order
//! 3. [`GatheredClientInitials`] aggregates a peer's packets until the
//!    ClientHello and its transport parameters parse completely
//! 4. [`generate_quic_fingerprint`] waits for completion and computes the
//!    composite identifier
//!
//! Initial-level protection is not confidentiality: the keys derive from a
//! published salt and the client's own connection ID, so any on-path
//! observer can do what this module does.

mod crypto;
mod error;
mod fingerprint;
mod frame;
mod header;
mod initial;
mod reassembly;
mod transport_params;

pub use crypto::{
    client_initial_keys, compute_header_protection, decrypt_aes128_gcm, INITIAL_SALT,
};
pub use error::{FrameError, GatherError, QuicError, ReassemblyError};
pub use fingerprint::{generate_quic_fingerprint, QuicFingerprint};
pub use frame::{
    read_all_frames, Frame, FRAME_TYPE_CRYPTO, FRAME_TYPE_PADDING, FRAME_TYPE_PING,
};
pub use header::{decode_initial, QuicHeader};
pub use initial::{
    ClientInitial, GatheredClientInitials, QuicClientHello, DEFAULT_MAX_PACKET_COUNT,
    DEFAULT_MAX_PACKET_NUMBER, TOKEN_ABSENT, TOKEN_PRESENT,
};
pub use reassembly::{
    ClientHelloReconstructor, ReassemblyStatus, MAX_CRYPTO_FRAGMENTS, MAX_CRYPTO_LENGTH,
};
pub use transport_params::{
    is_grease_transport_parameter, TransportParameters, QTP_GREASE_PLACEHOLDER,
};
