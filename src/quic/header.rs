//! QUIC Initial packet decoding
//!
//! Takes one UDP payload, rejects anything that is not a v1 long-header
//! Initial packet, removes header protection, opens the AEAD payload and
//! decodes the frames. The protected first byte hides the packet-number
//! length in its low two bits; the mask is derived from a 16-byte sample
//! taken 4 bytes into the encrypted payload, i.e. after a maximum-length
//! packet number field.

use serde::Serialize;
use tracing::trace;

use crate::wire::{read_next_vli, SliceReader};

use super::crypto::{
    client_initial_keys, compute_header_protection, decrypt_aes128_gcm, HP_SAMPLE_SIZE, TAG_SIZE,
};
use super::error::QuicError;
use super::frame::{read_all_frames, Frame};

/// Minimum bytes before the token length field: first byte, version,
/// DCID length, SCID length plus one byte of connection ID headroom.
const MIN_HEADER_BYTES: usize = 7;

/// Minimum declared payload length: packet number plus AEAD tag plus sample.
const MIN_PACKET_LENGTH: u64 = 20;

/// Header fields of a decoded QUIC Initial packet.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QuicHeader {
    /// 4-byte wire version
    pub version: Vec<u8>,
    /// Destination Connection ID length
    #[serde(rename = "dcid_len")]
    pub dcid_length: u32,
    /// Source Connection ID length
    #[serde(rename = "scid_len")]
    pub scid_length: u32,
    /// Decoded packet number bytes
    #[serde(rename = "pn")]
    pub packet_number: Vec<u8>,
    /// Whether the packet carried a token
    #[serde(rename = "token")]
    pub has_token: bool,

    #[serde(skip)]
    pub(crate) packet_number_value: u64,
}

impl QuicHeader {
    /// The decoded packet number as an integer, used as the AEAD sequence
    /// and as the gathering sort key.
    #[must_use]
    pub const fn packet_number_value(&self) -> u64 {
        self.packet_number_value
    }
}

/// Decode one QUIC Initial packet: header, header-protection removal, AEAD
/// open and frame extraction.
///
/// # Errors
///
/// [`QuicError::NotLongHeader`] and [`QuicError::NotInitial`] are benign
/// rejections for traffic that is not a QUIC Initial. Everything else marks
/// a packet that looked like an Initial but could not be decoded.
#[allow(clippy::cast_possible_truncation)]
pub fn decode_initial(p: &[u8]) -> Result<(QuicHeader, Vec<Frame>), QuicError> {
    if p.len() < MIN_HEADER_BYTES {
        return Err(QuicError::PacketTooShort);
    }

    let protected_first = p[0];
    // long header form bit and the QUIC fixed bit must both be set
    if protected_first & 0xc0 != 0xc0 {
        return Err(QuicError::NotLongHeader);
    }
    // Initial packets have the type bits clear
    if protected_first & 0x30 != 0 {
        return Err(QuicError::NotInitial);
    }

    let mut r = SliceReader::new(p);
    r.read_exact(1)?;
    let version = r.read_exact(4)?.to_vec();

    let dcid_len = usize::from(r.read_u8()?);
    let initial_random = r.read_exact(dcid_len)?.to_vec();

    let scid_len = usize::from(r.read_u8()?);
    r.read_exact(scid_len)?;

    let (token_len, _) = read_next_vli(&mut r)?;
    let token_len = usize::try_from(token_len)
        .map_err(|_| QuicError::Truncated(crate::wire::WireError::UnexpectedEof))?;
    r.read_exact(token_len)?;
    let has_token = token_len > 0;

    let (packet_len, _) = read_next_vli(&mut r)?;
    if packet_len < MIN_PACKET_LENGTH {
        return Err(QuicError::PayloadTooShort(packet_len));
    }

    // header bytes end where the protected payload begins
    let header_end = r.position();
    let payload = r.read_exact(packet_len as usize)?;

    let (key, iv, hp_key) = client_initial_keys(&initial_random)?;

    let sample: [u8; HP_SAMPLE_SIZE] = payload[4..4 + HP_SAMPLE_SIZE]
        .try_into()
        .map_err(|_| QuicError::PayloadTooShort(packet_len))?;
    let mask = compute_header_protection(&hp_key, &sample);

    // only the low 4 bits of the first byte are protected
    let first = protected_first ^ (mask[0] & 0x0f);
    let pn_len = usize::from(first & 0x03) + 1;

    // associated data: the header with the first byte and packet number
    // unmasked
    let mut aad = p[..header_end].to_vec();
    aad[0] = first;

    let mut packet_number = Vec::with_capacity(pn_len);
    let mut packet_number_value = 0u64;
    for i in 0..pn_len {
        let b = payload[i] ^ mask[1 + i];
        aad.push(b);
        packet_number.push(b);
        packet_number_value = (packet_number_value << 8) | u64::from(b);
    }

    let ciphertext = &payload[pn_len..payload.len() - TAG_SIZE];
    let tag: [u8; TAG_SIZE] = payload[payload.len() - TAG_SIZE..]
        .try_into()
        .map_err(|_| QuicError::PayloadTooShort(packet_len))?;

    let plaintext = decrypt_aes128_gcm(&iv, packet_number_value, &key, ciphertext, &aad, &tag)?;

    trace!(
        pn = packet_number_value,
        payload_len = plaintext.len(),
        "decrypted Initial packet"
    );

    let frames = read_all_frames(&mut SliceReader::new(&plaintext))?;

    Ok((
        QuicHeader {
            version,
            dcid_length: dcid_len as u32,
            scid_length: scid_len as u32,
            packet_number,
            has_token,
            packet_number_value,
        },
        frames,
    ))
}
