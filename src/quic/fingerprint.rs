//! Composite QUIC fingerprint
//!
//! The final identifier mixes three 64-bit inputs: the gathered-initials ID
//! (header shape and frame types), the normalized ClientHello ID and the
//! transport-parameters ID. The ClientHello ID is signed; the cast to
//! unsigned is bit-preserving so the composite is stable across
//! implementations.

use std::sync::Arc;

use serde::Serialize;

use crate::fingerprint::{FingerprintHasher, FingerprintId};

use super::error::GatherError;
use super::initial::GatheredClientInitials;

/// A complete QUIC client fingerprint.
#[derive(Debug, Clone, Serialize)]
pub struct QuicFingerprint {
    /// The gathered Initial packets this fingerprint was computed from
    pub client_initials: Arc<GatheredClientInitials>,

    /// Composite numeric ID
    pub num_id: u64,
    /// Hex rendering of `num_id`
    pub hex_id: String,

    /// User-Agent header, set by the caller when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl QuicFingerprint {
    /// Compute the composite fingerprint of an already-completed gathering.
    ///
    /// Returns `None` while the gathering is still in progress.
    #[must_use]
    pub fn from_completed(gci: &Arc<GatheredClientInitials>) -> Option<Self> {
        let (gathered_id, hello_norm_nid, tp_id) = gci.fingerprint_inputs()?;

        let mut h = FingerprintHasher::new();
        h.update_u64(gathered_id);
        h.update_u64(FingerprintId::from_signed(hello_norm_nid).0);
        h.update_u64(tp_id);
        let num_id = h.finish_u64();

        Some(Self {
            client_initials: Arc::clone(gci),
            num_id,
            hex_id: FingerprintId(num_id).as_hex(),
            user_agent: None,
        })
    }
}

/// Wait for a gathering to complete and compute its composite fingerprint.
///
/// # Errors
///
/// Returns [`GatherError::Expired`] when the gathering deadline passes
/// before completion, and [`GatherError::Incomplete`] if the completed state
/// cannot be read back (which indicates a publication bug, not bad input).
pub async fn generate_quic_fingerprint(
    gci: &Arc<GatheredClientInitials>,
) -> Result<QuicFingerprint, GatherError> {
    gci.wait().await?;
    QuicFingerprint::from_completed(gci).ok_or(GatherError::Incomplete)
}
