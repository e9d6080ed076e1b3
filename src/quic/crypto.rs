//! QUIC Initial packet cryptography (RFC 9001 Section 5)
//!
//! Initial packets are protected with keys every observer can derive: the
//! secret input is the client-chosen Destination Connection ID and the salt
//! is a published constant. This module derives the client keys, computes
//! the header-protection mask and opens the AEAD payload.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes128Gcm, Nonce,
};
use hkdf::Hkdf;
use sha2::Sha256;
use tracing::trace;

use super::error::QuicError;

/// QUIC v1 initial salt (RFC 9001 Section 5.2)
pub const INITIAL_SALT: [u8; 20] = [
    0x38, 0x76, 0x2c, 0xf7, 0xf5, 0x59, 0x34, 0xb3, 0x4d, 0x17, 0x9a, 0xe6, 0xa4, 0xc8, 0x0c,
    0xad, 0xcc, 0xbb, 0x7f, 0x0a,
];

/// AES-128-GCM key size
pub(crate) const KEY_SIZE: usize = 16;

/// AEAD nonce base size
pub(crate) const IV_SIZE: usize = 12;

/// AEAD authentication tag size
pub(crate) const TAG_SIZE: usize = 16;

/// Header protection sample size
pub(crate) const HP_SAMPLE_SIZE: usize = 16;

/// Derive the client Initial key, IV and header-protection key from the
/// DCID of the first Initial packet (the "initial random").
///
/// - `initial_secret = HKDF-Extract(salt, initial_random)`
/// - `client_secret = HKDF-Expand-Label(initial_secret, "client in", 32)`
/// - `key = HKDF-Expand-Label(client_secret, "quic key", 16)`
/// - `iv = HKDF-Expand-Label(client_secret, "quic iv", 12)`
/// - `hp = HKDF-Expand-Label(client_secret, "quic hp", 16)`
///
/// # Errors
///
/// Returns [`QuicError::KeyDerivation`] when any HKDF step fails.
pub fn client_initial_keys(
    initial_random: &[u8],
) -> Result<([u8; KEY_SIZE], [u8; IV_SIZE], [u8; KEY_SIZE]), QuicError> {
    let initial_secret = Hkdf::<Sha256>::new(Some(&INITIAL_SALT), initial_random);

    let mut client_secret = [0u8; 32];
    initial_secret
        .expand(&expand_label_info("client in", 32), &mut client_secret)
        .map_err(|_| QuicError::KeyDerivation)?;

    // The client secret is already a PRK; expand from it directly.
    let client = Hkdf::<Sha256>::from_prk(&client_secret).map_err(|_| QuicError::KeyDerivation)?;

    let mut key = [0u8; KEY_SIZE];
    client
        .expand(&expand_label_info("quic key", KEY_SIZE as u16), &mut key)
        .map_err(|_| QuicError::KeyDerivation)?;

    let mut iv = [0u8; IV_SIZE];
    client
        .expand(&expand_label_info("quic iv", IV_SIZE as u16), &mut iv)
        .map_err(|_| QuicError::KeyDerivation)?;

    let mut hp_key = [0u8; KEY_SIZE];
    client
        .expand(&expand_label_info("quic hp", KEY_SIZE as u16), &mut hp_key)
        .map_err(|_| QuicError::KeyDerivation)?;

    trace!("derived client Initial keys");
    Ok((key, iv, hp_key))
}

/// Build the HKDF-Expand-Label info structure (RFC 8446 Section 7.1):
/// u16 output length, u8-length-prefixed `"tls13 " + label`, empty context.
fn expand_label_info(label: &str, length: u16) -> Vec<u8> {
    let full_label = format!("tls13 {label}");
    let mut info = Vec::with_capacity(4 + full_label.len());
    info.extend_from_slice(&length.to_be_bytes());
    #[allow(clippy::cast_possible_truncation)]
    info.push(full_label.len() as u8);
    info.extend_from_slice(full_label.as_bytes());
    info.push(0);
    info
}

/// Compute the 5-byte header-protection mask: AES-128-ECB over one 16-byte
/// ciphertext sample, truncated.
#[must_use]
pub fn compute_header_protection(
    hp_key: &[u8; KEY_SIZE],
    sample: &[u8; HP_SAMPLE_SIZE],
) -> [u8; 5] {
    use aes::cipher::{BlockEncrypt, KeyInit};
    use aes::Aes128;

    let cipher = Aes128::new(hp_key.into());
    let mut block = [0u8; 16];
    block.copy_from_slice(sample);
    cipher.encrypt_block(aes::Block::from_mut_slice(&mut block));

    [block[0], block[1], block[2], block[3], block[4]]
}

/// Open an AES-128-GCM sealed Initial payload.
///
/// The nonce is the IV with the 8-byte big-endian sequence number XORed into
/// its last 8 bytes; the sequence is the decoded packet number.
///
/// # Errors
///
/// Returns [`QuicError::AeadOpenFailed`] when authentication fails.
pub fn decrypt_aes128_gcm(
    iv: &[u8; IV_SIZE],
    seq: u64,
    key: &[u8; KEY_SIZE],
    ciphertext: &[u8],
    aad: &[u8],
    tag: &[u8; TAG_SIZE],
) -> Result<Vec<u8>, QuicError> {
    let mut nonce = *iv;
    for (i, b) in seq.to_be_bytes().iter().enumerate() {
        nonce[IV_SIZE - 8 + i] ^= b;
    }

    let cipher = Aes128Gcm::new_from_slice(key).map_err(|_| QuicError::AeadOpenFailed)?;

    let mut msg = Vec::with_capacity(ciphertext.len() + tag.len());
    msg.extend_from_slice(ciphertext);
    msg.extend_from_slice(tag);

    cipher
        .decrypt(Nonce::from_slice(&nonce), Payload { msg: &msg, aad })
        .map_err(|_| QuicError::AeadOpenFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unhex(s: &str) -> Vec<u8> {
        hex::decode(s).expect("valid hex")
    }

    #[test]
    fn test_expand_label_info_layout() {
        let info = expand_label_info("client in", 32);
        assert_eq!(info[0], 0x00);
        assert_eq!(info[1], 32);
        assert_eq!(info[2], 15); // "tls13 client in"
        assert_eq!(&info[3..18], b"tls13 client in");
        assert_eq!(info[18], 0);
    }

    #[test]
    fn test_client_initial_keys_vector() {
        let initial_random = [0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let (key, iv, hp_key) = client_initial_keys(&initial_random).unwrap();

        assert_eq!(hex::encode(key), "b14b918124fda5c8d79847602fa3520b");
        assert_eq!(hex::encode(iv), "ddbc15dea80925a55686a7df");
        assert_eq!(hex::encode(hp_key), "6df4e9d737cdf714711d7c617ee82981");
    }

    #[test]
    fn test_header_protection_vector() {
        let hp_key: [u8; 16] = unhex("6df4e9d737cdf714711d7c617ee82981").try_into().unwrap();
        let sample: [u8; 16] = unhex("ed78716be9711ba498b7ed868443bb2e").try_into().unwrap();

        let mask = compute_header_protection(&hp_key, &sample);
        assert_eq!(mask, [0xed, 0x98, 0x95, 0xbb, 0x15]);
    }

    #[test]
    fn test_aes128_gcm_open_vector() {
        let iv: [u8; 12] = unhex("ddbc15dea80925a55686a7df").try_into().unwrap();
        let key: [u8; 16] = unhex("b14b918124fda5c8d79847602fa3520b").try_into().unwrap();
        let ciphertext = unhex(
            "1c36a7ed78716be9711ba498b7ed868443bb2e0c514d4d848eadcc7a00d25ce9f9afa483978088de836be6\
             8c0b32a24595d7813ea5414a9199329a6d9f7f760dd8bb249bf3f53d9a77fbb7b395b8d66d7879a51fe59e\
             f9601f79998eb3568e1fdc789f640acab3858a82ef2930fa5ce14b5b9ea0bdb29f4572da85aa3def39b7ef\
             afffa074b9267070d50b5d07842e49bba3bc787ff295d6ae3b514305f102afe5a047b3fb4c99eb92a274d2\
             44d60492c0e2e6e212cef0f9e3f62efd0955e71c768aa6bb3cd80bbb3755c8b7ebee32712f40f224511948\
             7021b4b84e1565e3ca31967ac8604d4032170dec280aeefa095d08",
        );
        let aad = unhex("c00000000108000102030405060705635f63696400410300");
        let tag: [u8; 16] = unhex("b3b7241ef6646a6c86e5c62ce08be099").try_into().unwrap();

        let plaintext = decrypt_aes128_gcm(&iv, 0, &key, &ciphertext, &aad, &tag).unwrap();

        // a CRYPTO frame wrapping a TLS ClientHello
        assert_eq!(
            &plaintext[..10],
            &unhex("060040ee010000ea0303")[..],
        );
        assert_eq!(plaintext.len(), ciphertext.len());
    }

    #[test]
    fn test_aes128_gcm_rejects_bad_tag() {
        let iv = [0u8; 12];
        let key = [0u8; 16];
        let tag = [0u8; 16];
        assert!(matches!(
            decrypt_aes128_gcm(&iv, 0, &key, &[0u8; 32], &[], &tag),
            Err(QuicError::AeadOpenFailed)
        ));
    }

    #[test]
    fn test_sequence_changes_nonce() {
        // same inputs with a different sequence must not authenticate
        let initial_random = [0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let (key, iv, _) = client_initial_keys(&initial_random).unwrap();
        let ciphertext = unhex("1c36a7ed78716be9711ba498b7ed8684");
        let tag: [u8; 16] = unhex("b3b7241ef6646a6c86e5c62ce08be099").try_into().unwrap();

        assert!(decrypt_aes128_gcm(&iv, 1, &key, &ciphertext, &[], &tag).is_err());
    }
}
