//! TLS `ClientHello` parsing and fingerprinting
//!
//! The parser consumes one TLS handshake record, keeps the raw bytes for
//! replay, extracts every parameter that identifies a client implementation
//! and reduces them to two 64-bit identifiers: `nid` over the extension
//! order as observed on the wire, and `norm_nid` over the sorted extension
//! IDs, which survives browser extension-order randomization.
//!
//! GREASE code points (RFC 8701) are folded to a fixed placeholder wherever
//! they appear, so two connections from the same client never differ by the
//! random reserved values it drew.

mod client_hello;
mod error;
mod grease;

pub use client_hello::{read_client_hello, ClientHello};
pub use error::TlsError;
pub use grease::{fold_grease_u16, is_grease_u16, GREASE_PLACEHOLDER};
