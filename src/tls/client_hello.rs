//! TLS `ClientHello` record reading, parsing and fingerprint hash
//!
//! # Record format
//!
//! ```text
//! ContentType (1) = 0x16
//! ProtocolVersion (2)
//! Length (2)
//! HandshakeType (1) = 0x01
//! Length (3)
//! ProtocolVersion (2)
//! Random (32)
//! SessionID (1 + n)
//! CipherSuites (2 + n)
//! CompressionMethods (1 + n)
//! Extensions (2 + n)
//! ```
//!
//! The parser accepts and records every extension, including unknown ones,
//! because the fingerprint depends on the exact extension ID sequence the
//! client sent. For the recognized extensions it also keeps the semantic
//! payload and, where the hash needs it, a length-prefixed serialization
//! preserving how the client laid the list out on the wire.

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::fingerprint::{FingerprintHasher, FingerprintId};
use crate::wire::SliceReader;

use super::error::TlsError;
use super::grease::fold_grease_u16;

/// TLS `ContentType` for Handshake
const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;

/// TLS `HandshakeType` for `ClientHello`
const HANDSHAKE_TYPE_CLIENT_HELLO: u8 = 0x01;

const EXT_SERVER_NAME: u16 = 0;
const EXT_SUPPORTED_GROUPS: u16 = 10;
const EXT_EC_POINT_FORMATS: u16 = 11;
const EXT_SIGNATURE_ALGORITHMS: u16 = 13;
const EXT_ALPN: u16 = 16;
const EXT_COMPRESS_CERTIFICATE: u16 = 27;
const EXT_RECORD_SIZE_LIMIT: u16 = 28;
const EXT_SUPPORTED_VERSIONS: u16 = 43;
const EXT_PSK_KEY_EXCHANGE_MODES: u16 = 45;
const EXT_KEY_SHARE: u16 = 51;
const EXT_QUIC_TRANSPORT_PARAMETERS: u16 = 57;
const EXT_APPLICATION_SETTINGS: u16 = 17513;

/// A parsed TLS `ClientHello` with its fingerprint identifiers.
///
/// The raw record bytes are retained verbatim so a caller that consumed them
/// off a connection can rewind and replay the `ClientHello` to a real TLS
/// stack.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientHello {
    #[serde(skip)]
    raw: Vec<u8>,

    /// TLS record-layer version
    pub tls_record_version: u16,
    /// TLS handshake-layer version
    pub tls_handshake_version: u16,

    /// Offered cipher suites in order, GREASE folded
    pub cipher_suites: Vec<u16>,
    /// Offered compression methods in order
    pub compression_methods: Vec<u8>,
    /// Extension IDs as observed on the wire, GREASE folded
    pub extensions: Vec<u16>,
    /// The same extension IDs sorted ascending
    pub extensions_normalized: Vec<u16>,

    /// server_name(0) host name
    pub server_name: String,
    /// supported_groups(10), GREASE folded
    pub supported_groups: Vec<u16>,
    /// ec_point_formats(11)
    pub ec_point_formats: Vec<u8>,
    /// signature_algorithms(13), GREASE folded
    pub signature_algorithms: Vec<u16>,
    /// alpn(16) protocol names
    pub alpn: Vec<String>,
    /// compress_certificate(27) algorithms
    pub compress_certificate: Vec<u16>,
    /// record_size_limit(28) value bytes
    pub record_size_limit: Vec<u8>,
    /// supported_versions(43), GREASE folded
    pub supported_versions: Vec<u16>,
    /// psk_key_exchange_modes(45)
    pub psk_key_exchange_modes: Vec<u8>,
    /// key_share(51) group IDs, GREASE folded
    pub key_share: Vec<u16>,
    /// application_settings(17513) protocol names
    pub application_settings: Vec<String>,

    /// User-Agent header, set by the caller when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Fingerprint over the wire extension order
    pub nid: i64,
    /// Fingerprint over the sorted extension IDs
    pub norm_nid: i64,
    /// Hex rendering of `nid`
    pub id: String,
    /// Hex rendering of `norm_nid`
    pub norm_id: String,

    // Length-prefixed helper forms kept only for the hash
    #[serde(skip)]
    length_prefixed_supported_groups: Vec<u16>,
    #[serde(skip)]
    length_prefixed_ec_point_formats: Vec<u8>,
    #[serde(skip)]
    length_prefixed_signature_algos: Vec<u16>,
    #[serde(skip)]
    alpn_with_lengths: Vec<u8>,
    #[serde(skip)]
    length_prefixed_cert_compress_algos: Vec<u8>,
    #[serde(skip)]
    keyshare_groups_with_lengths: Vec<u16>,

    // quic_transport_parameters(57) payload, consumed by the QUIC path
    #[serde(skip)]
    transport_parameters_raw: Option<Vec<u8>>,
}

/// Read one `ClientHello` record from a stream and parse it.
///
/// Exactly 5 header bytes plus the declared record length are consumed.
///
/// # Errors
///
/// Returns [`TlsError::NotHandshake`] when the first byte is not 0x16,
/// [`TlsError::Io`] on short reads, and any parse error from
/// [`ClientHello::parse`].
pub async fn read_client_hello<R>(r: &mut R) -> Result<ClientHello, TlsError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 5];
    r.read_exact(&mut header).await?;

    if header[0] != CONTENT_TYPE_HANDSHAKE {
        return Err(TlsError::NotHandshake);
    }

    let record_len = usize::from(u16::from_be_bytes([header[3], header[4]]));
    let mut raw = vec![0u8; 5 + record_len];
    raw[..5].copy_from_slice(&header);
    r.read_exact(&mut raw[5..]).await?;

    ClientHello::parse(raw)
}

impl ClientHello {
    /// Parse a raw TLS record into a `ClientHello`.
    ///
    /// `raw` must start with the 5-byte record header; trailing bytes beyond
    /// the declared record length are dropped.
    ///
    /// # Errors
    ///
    /// Returns a [`TlsError`] on anything that makes the record unusable for
    /// fingerprinting: wrong content or handshake type, truncation, or an
    /// extension payload that does not match its declared layout.
    pub fn parse(mut raw: Vec<u8>) -> Result<Self, TlsError> {
        if raw.len() < 5 {
            return Err(TlsError::Truncated("record header"));
        }
        if raw[0] != CONTENT_TYPE_HANDSHAKE {
            return Err(TlsError::NotHandshake);
        }

        let record_len = usize::from(u16::from_be_bytes([raw[3], raw[4]]));
        if raw.len() < 5 + record_len {
            return Err(TlsError::Truncated("record body"));
        }
        raw.truncate(5 + record_len);

        let mut ch = Self {
            tls_record_version: u16::from_be_bytes([raw[1], raw[2]]),
            ..Self::default()
        };

        ch.parse_body(&raw[5..])?;
        ch.raw = raw;
        ch.calc_fingerprints();

        trace!(
            id = %ch.id,
            norm_id = %ch.norm_id,
            server_name = %ch.server_name,
            "parsed ClientHello"
        );

        Ok(ch)
    }

    fn parse_body(&mut self, body: &[u8]) -> Result<(), TlsError> {
        let mut r = SliceReader::new(body);

        if r.read_u8().map_err(|_| TlsError::Truncated("handshake type"))?
            != HANDSHAKE_TYPE_CLIENT_HELLO
        {
            return Err(TlsError::NotClientHello);
        }
        r.read_exact(3)
            .map_err(|_| TlsError::Truncated("handshake length"))?;

        self.tls_handshake_version = r
            .read_u16()
            .map_err(|_| TlsError::Truncated("handshake version"))?;
        r.read_exact(32).map_err(|_| TlsError::Truncated("random"))?;

        let session_id_len = usize::from(
            r.read_u8()
                .map_err(|_| TlsError::Truncated("session ID length"))?,
        );
        r.read_exact(session_id_len)
            .map_err(|_| TlsError::Truncated("session ID"))?;

        let suites_len = usize::from(
            r.read_u16()
                .map_err(|_| TlsError::Truncated("cipher suites length"))?,
        );
        let mut suites = SliceReader::new(
            r.read_exact(suites_len)
                .map_err(|_| TlsError::Truncated("cipher suites"))?,
        );
        while !suites.is_empty() {
            let suite = suites
                .read_u16()
                .map_err(|_| TlsError::Truncated("cipher suite"))?;
            self.cipher_suites.push(fold_grease_u16(suite));
        }

        let compression_len = usize::from(
            r.read_u8()
                .map_err(|_| TlsError::Truncated("compression methods length"))?,
        );
        self.compression_methods = r
            .read_exact(compression_len)
            .map_err(|_| TlsError::Truncated("compression methods"))?
            .to_vec();

        if r.is_empty() {
            // no extensions is legal, if unusual
            self.extensions_normalized = self.extensions.clone();
            return Ok(());
        }

        let extensions_len = usize::from(
            r.read_u16()
                .map_err(|_| TlsError::Truncated("extensions length"))?,
        );
        let mut exts = SliceReader::new(
            r.read_exact(extensions_len)
                .map_err(|_| TlsError::Truncated("extensions"))?,
        );

        while !exts.is_empty() {
            let ext_id = exts
                .read_u16()
                .map_err(|_| TlsError::Truncated("extension ID"))?;
            let ext_len = usize::from(
                exts.read_u16()
                    .map_err(|_| TlsError::Truncated("extension length"))?,
            );
            let payload = exts
                .read_exact(ext_len)
                .map_err(|_| TlsError::Truncated("extension data"))?;

            self.extensions.push(fold_grease_u16(ext_id));
            if fold_grease_u16(ext_id) != ext_id {
                // GREASE extension, payload carries no signal
                continue;
            }

            self.parse_extension(ext_id, payload)?;
        }

        self.extensions_normalized = self.extensions.clone();
        self.extensions_normalized.sort_unstable();

        Ok(())
    }

    fn parse_extension(&mut self, ext_id: u16, payload: &[u8]) -> Result<(), TlsError> {
        match ext_id {
            EXT_SERVER_NAME => {
                if let Some(name) = parse_server_name(payload)? {
                    self.server_name = name;
                }
            }
            EXT_SUPPORTED_GROUPS => {
                self.supported_groups = parse_u16_list(payload, "supported_groups")?;
                #[allow(clippy::cast_possible_truncation)]
                self.length_prefixed_supported_groups
                    .push(2 * self.supported_groups.len() as u16);
                self.length_prefixed_supported_groups
                    .extend_from_slice(&self.supported_groups);
            }
            EXT_EC_POINT_FORMATS => {
                self.ec_point_formats = parse_u8_list(payload, "ec_point_formats")?;
                #[allow(clippy::cast_possible_truncation)]
                self.length_prefixed_ec_point_formats
                    .push(self.ec_point_formats.len() as u8);
                self.length_prefixed_ec_point_formats
                    .extend_from_slice(&self.ec_point_formats);
            }
            EXT_SIGNATURE_ALGORITHMS => {
                self.signature_algorithms = parse_u16_list(payload, "signature_algorithms")?;
                #[allow(clippy::cast_possible_truncation)]
                self.length_prefixed_signature_algos
                    .push(2 * self.signature_algorithms.len() as u16);
                self.length_prefixed_signature_algos
                    .extend_from_slice(&self.signature_algorithms);
            }
            EXT_ALPN => {
                self.alpn = parse_string_list(payload, "alpn")?;
                self.alpn_with_lengths = payload.to_vec();
            }
            EXT_COMPRESS_CERTIFICATE => {
                self.compress_certificate = parse_compress_certificate(payload)?;
                #[allow(clippy::cast_possible_truncation)]
                self.length_prefixed_cert_compress_algos
                    .push(2 * self.compress_certificate.len() as u8);
                for algo in &self.compress_certificate {
                    self.length_prefixed_cert_compress_algos
                        .extend_from_slice(&algo.to_be_bytes());
                }
            }
            EXT_RECORD_SIZE_LIMIT => {
                self.record_size_limit = payload.to_vec();
            }
            EXT_SUPPORTED_VERSIONS => {
                self.supported_versions = parse_supported_versions(payload)?;
            }
            EXT_PSK_KEY_EXCHANGE_MODES => {
                self.psk_key_exchange_modes = parse_u8_list(payload, "psk_key_exchange_modes")?;
            }
            EXT_KEY_SHARE => {
                for (group, data_len) in parse_key_share(payload)? {
                    self.key_share.push(group);
                    self.keyshare_groups_with_lengths.push(group);
                    self.keyshare_groups_with_lengths.push(data_len);
                }
            }
            EXT_APPLICATION_SETTINGS => {
                self.application_settings = parse_string_list(payload, "application_settings")?;
            }
            EXT_QUIC_TRANSPORT_PARAMETERS => {
                self.transport_parameters_raw = Some(payload.to_vec());
            }
            _ => {}
        }
        Ok(())
    }

    /// Compute both fingerprint identifiers and their hex renderings.
    fn calc_fingerprints(&mut self) {
        self.nid = self.fingerprint_nid(false);
        self.norm_nid = self.fingerprint_nid(true);
        self.id = FingerprintId::from_signed(self.nid).as_hex();
        self.norm_id = FingerprintId::from_signed(self.norm_nid).as_hex();
    }

    /// Compute the fingerprint numeric ID.
    ///
    /// The normalized variant hashes the sorted extension IDs instead of the
    /// wire order and is the identifier that survives extension-order
    /// randomization.
    #[must_use]
    pub fn fingerprint_nid(&self, normalized: bool) -> i64 {
        let mut h = FingerprintHasher::new();
        h.update_u16(self.tls_record_version);
        h.update_u16(self.tls_handshake_version);

        h.update_u16_arr(&self.cipher_suites);
        h.update_arr(&self.compression_methods);
        if normalized {
            h.update_u16_arr(&self.extensions_normalized);
        } else {
            h.update_u16_arr(&self.extensions);
        }
        h.update_u16_arr(&self.length_prefixed_supported_groups);
        h.update_arr(&self.length_prefixed_ec_point_formats);
        h.update_u16_arr(&self.length_prefixed_signature_algos);
        h.update_arr(&self.alpn_with_lengths);
        h.update_u16_arr(&self.keyshare_groups_with_lengths);
        h.update_arr(&self.psk_key_exchange_modes);
        h.update_u16_arr(&self.supported_versions);
        h.update_arr(&self.length_prefixed_cert_compress_algos);
        h.update_arr(&self.record_size_limit);

        h.finish_i64()
    }

    /// Hex rendering of the fingerprint ID.
    #[must_use]
    pub fn fingerprint_id(&self, normalized: bool) -> String {
        FingerprintId::from_signed(self.fingerprint_nid(normalized)).as_hex()
    }

    /// The raw record bytes, exactly as consumed.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Payload of the quic_transport_parameters(57) extension, if present.
    #[must_use]
    pub fn transport_parameters_raw(&self) -> Option<&[u8]> {
        self.transport_parameters_raw.as_deref()
    }
}

fn parse_server_name(payload: &[u8]) -> Result<Option<String>, TlsError> {
    let mut r = SliceReader::new(payload);
    let list_len = usize::from(
        r.read_u16()
            .map_err(|_| TlsError::MalformedExtension("server_name"))?,
    );
    let mut list = SliceReader::new(
        r.read_exact(list_len)
            .map_err(|_| TlsError::MalformedExtension("server_name"))?,
    );

    while !list.is_empty() {
        let name_type = list
            .read_u8()
            .map_err(|_| TlsError::MalformedExtension("server_name"))?;
        let name_len = usize::from(
            list.read_u16()
                .map_err(|_| TlsError::MalformedExtension("server_name"))?,
        );
        let name = list
            .read_exact(name_len)
            .map_err(|_| TlsError::MalformedExtension("server_name"))?;

        if name_type == 0x00 {
            return Ok(std::str::from_utf8(name).ok().map(str::to_owned));
        }
    }

    Ok(None)
}

/// Parse a u16-length-prefixed list of u16 values, folding GREASE.
fn parse_u16_list(payload: &[u8], what: &'static str) -> Result<Vec<u16>, TlsError> {
    let mut r = SliceReader::new(payload);
    let byte_len = usize::from(r.read_u16().map_err(|_| TlsError::MalformedExtension(what))?);
    let mut list = SliceReader::new(
        r.read_exact(byte_len)
            .map_err(|_| TlsError::MalformedExtension(what))?,
    );

    let mut out = Vec::with_capacity(byte_len / 2);
    while !list.is_empty() {
        let v = list
            .read_u16()
            .map_err(|_| TlsError::MalformedExtension(what))?;
        out.push(fold_grease_u16(v));
    }
    Ok(out)
}

/// Parse a u8-length-prefixed list of bytes.
fn parse_u8_list(payload: &[u8], what: &'static str) -> Result<Vec<u8>, TlsError> {
    let mut r = SliceReader::new(payload);
    let len = usize::from(r.read_u8().map_err(|_| TlsError::MalformedExtension(what))?);
    Ok(r.read_exact(len)
        .map_err(|_| TlsError::MalformedExtension(what))?
        .to_vec())
}

/// Parse a u16-length-prefixed list of u8-length-prefixed strings.
fn parse_string_list(payload: &[u8], what: &'static str) -> Result<Vec<String>, TlsError> {
    let mut r = SliceReader::new(payload);
    let list_len = usize::from(r.read_u16().map_err(|_| TlsError::MalformedExtension(what))?);
    let mut list = SliceReader::new(
        r.read_exact(list_len)
            .map_err(|_| TlsError::MalformedExtension(what))?,
    );

    let mut out = Vec::new();
    while !list.is_empty() {
        let len = usize::from(list.read_u8().map_err(|_| TlsError::MalformedExtension(what))?);
        let bytes = list
            .read_exact(len)
            .map_err(|_| TlsError::MalformedExtension(what))?;
        if let Ok(s) = std::str::from_utf8(bytes) {
            out.push(s.to_owned());
        }
    }
    Ok(out)
}

/// compress_certificate carries a u8 byte-length prefix before its u16 algorithms.
fn parse_compress_certificate(payload: &[u8]) -> Result<Vec<u16>, TlsError> {
    let mut r = SliceReader::new(payload);
    let byte_len = usize::from(
        r.read_u8()
            .map_err(|_| TlsError::MalformedExtension("compress_certificate"))?,
    );
    let mut list = SliceReader::new(
        r.read_exact(byte_len)
            .map_err(|_| TlsError::MalformedExtension("compress_certificate"))?,
    );

    let mut out = Vec::with_capacity(byte_len / 2);
    while !list.is_empty() {
        let v = list
            .read_u16()
            .map_err(|_| TlsError::MalformedExtension("compress_certificate"))?;
        out.push(fold_grease_u16(v));
    }
    Ok(out)
}

/// supported_versions carries a u8 byte-length prefix before its u16 versions.
fn parse_supported_versions(payload: &[u8]) -> Result<Vec<u16>, TlsError> {
    let mut r = SliceReader::new(payload);
    let byte_len = usize::from(
        r.read_u8()
            .map_err(|_| TlsError::MalformedExtension("supported_versions"))?,
    );
    let mut list = SliceReader::new(
        r.read_exact(byte_len)
            .map_err(|_| TlsError::MalformedExtension("supported_versions"))?,
    );

    let mut out = Vec::with_capacity(byte_len / 2);
    while !list.is_empty() {
        let v = list
            .read_u16()
            .map_err(|_| TlsError::MalformedExtension("supported_versions"))?;
        out.push(fold_grease_u16(v));
    }
    Ok(out)
}

/// key_share entries are (group, data length, data); only the group IDs and
/// data lengths matter for the fingerprint.
fn parse_key_share(payload: &[u8]) -> Result<Vec<(u16, u16)>, TlsError> {
    let mut r = SliceReader::new(payload);
    let total = usize::from(
        r.read_u16()
            .map_err(|_| TlsError::MalformedExtension("key_share"))?,
    );
    let mut list = SliceReader::new(
        r.read_exact(total)
            .map_err(|_| TlsError::MalformedExtension("key_share"))?,
    );

    let mut out = Vec::new();
    while !list.is_empty() {
        let group = list
            .read_u16()
            .map_err(|_| TlsError::MalformedExtension("key_share"))?;
        let data_len = list
            .read_u16()
            .map_err(|_| TlsError::MalformedExtension("key_share"))?;
        list.read_exact(usize::from(data_len))
            .map_err(|_| TlsError::MalformedExtension("key_share"))?;
        out.push((fold_grease_u16(group), data_len));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::GREASE_PLACEHOLDER;

    // === Test ClientHello builder ===

    struct HelloBuilder {
        cipher_suites: Vec<u16>,
        compression: Vec<u8>,
        extensions: Vec<(u16, Vec<u8>)>,
    }

    impl HelloBuilder {
        fn new() -> Self {
            Self {
                cipher_suites: vec![0x1301, 0x1302, 0x1303],
                compression: vec![0x00],
                extensions: Vec::new(),
            }
        }

        fn cipher_suites(mut self, suites: &[u16]) -> Self {
            self.cipher_suites = suites.to_vec();
            self
        }

        fn ext(mut self, id: u16, payload: Vec<u8>) -> Self {
            self.extensions.push((id, payload));
            self
        }

        fn sni(self, name: &str) -> Self {
            let mut payload = Vec::new();
            #[allow(clippy::cast_possible_truncation)]
            let name_len = name.len() as u16;
            payload.extend_from_slice(&(name_len + 3).to_be_bytes());
            payload.push(0x00);
            payload.extend_from_slice(&name_len.to_be_bytes());
            payload.extend_from_slice(name.as_bytes());
            self.ext(EXT_SERVER_NAME, payload)
        }

        fn groups(self, groups: &[u16]) -> Self {
            let mut payload = Vec::new();
            #[allow(clippy::cast_possible_truncation)]
            payload.extend_from_slice(&(2 * groups.len() as u16).to_be_bytes());
            for g in groups {
                payload.extend_from_slice(&g.to_be_bytes());
            }
            self.ext(EXT_SUPPORTED_GROUPS, payload)
        }

        fn alpn(self, protocols: &[&str]) -> Self {
            let mut list = Vec::new();
            for p in protocols {
                #[allow(clippy::cast_possible_truncation)]
                list.push(p.len() as u8);
                list.extend_from_slice(p.as_bytes());
            }
            let mut payload = Vec::new();
            #[allow(clippy::cast_possible_truncation)]
            payload.extend_from_slice(&(list.len() as u16).to_be_bytes());
            payload.extend_from_slice(&list);
            self.ext(EXT_ALPN, payload)
        }

        fn sig_algos(self, algos: &[u16]) -> Self {
            let mut payload = Vec::new();
            #[allow(clippy::cast_possible_truncation)]
            payload.extend_from_slice(&(2 * algos.len() as u16).to_be_bytes());
            for a in algos {
                payload.extend_from_slice(&a.to_be_bytes());
            }
            self.ext(EXT_SIGNATURE_ALGORITHMS, payload)
        }

        fn versions(self, versions: &[u16]) -> Self {
            let mut payload = Vec::new();
            #[allow(clippy::cast_possible_truncation)]
            payload.push(2 * versions.len() as u8);
            for v in versions {
                payload.extend_from_slice(&v.to_be_bytes());
            }
            self.ext(EXT_SUPPORTED_VERSIONS, payload)
        }

        fn key_share_entries(self, entries: &[(u16, &[u8])]) -> Self {
            let mut list = Vec::new();
            for (group, data) in entries {
                list.extend_from_slice(&group.to_be_bytes());
                #[allow(clippy::cast_possible_truncation)]
                list.extend_from_slice(&(data.len() as u16).to_be_bytes());
                list.extend_from_slice(data);
            }
            let mut payload = Vec::new();
            #[allow(clippy::cast_possible_truncation)]
            payload.extend_from_slice(&(list.len() as u16).to_be_bytes());
            payload.extend_from_slice(&list);
            self.ext(EXT_KEY_SHARE, payload)
        }

        fn build(self) -> Vec<u8> {
            let mut exts = Vec::new();
            for (id, payload) in &self.extensions {
                exts.extend_from_slice(&id.to_be_bytes());
                #[allow(clippy::cast_possible_truncation)]
                exts.extend_from_slice(&(payload.len() as u16).to_be_bytes());
                exts.extend_from_slice(payload);
            }

            let mut body = Vec::new();
            body.extend_from_slice(&[0x03, 0x03]); // handshake version
            body.extend_from_slice(&[0u8; 32]); // random
            body.push(0x00); // empty session ID
            #[allow(clippy::cast_possible_truncation)]
            body.extend_from_slice(&(2 * self.cipher_suites.len() as u16).to_be_bytes());
            for s in &self.cipher_suites {
                body.extend_from_slice(&s.to_be_bytes());
            }
            #[allow(clippy::cast_possible_truncation)]
            body.push(self.compression.len() as u8);
            body.extend_from_slice(&self.compression);
            #[allow(clippy::cast_possible_truncation)]
            body.extend_from_slice(&(exts.len() as u16).to_be_bytes());
            body.extend_from_slice(&exts);

            let mut record = vec![0x16, 0x03, 0x01];
            #[allow(clippy::cast_possible_truncation)]
            record.extend_from_slice(&(body.len() as u16 + 4).to_be_bytes());
            record.push(0x01); // ClientHello
            #[allow(clippy::cast_possible_truncation)]
            record.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]); // u24
            record.extend_from_slice(&body);
            record
        }
    }

    fn typical_hello() -> HelloBuilder {
        HelloBuilder::new()
            .sni("example.com")
            .groups(&[0x001d, 0x0017])
            .sig_algos(&[0x0403, 0x0804])
            .alpn(&["h2", "http/1.1"])
            .versions(&[0x0304, 0x0303])
            .ext(EXT_PSK_KEY_EXCHANGE_MODES, vec![0x01, 0x01])
            .key_share_entries(&[(0x001d, &[0xab; 32])])
    }

    // === Parsing tests ===

    #[test]
    fn test_parse_basic_fields() {
        let ch = ClientHello::parse(typical_hello().build()).unwrap();

        assert_eq!(ch.tls_record_version, 0x0301);
        assert_eq!(ch.tls_handshake_version, 0x0303);
        assert_eq!(ch.cipher_suites, vec![0x1301, 0x1302, 0x1303]);
        assert_eq!(ch.compression_methods, vec![0x00]);
        assert_eq!(ch.server_name, "example.com");
        assert_eq!(ch.supported_groups, vec![0x001d, 0x0017]);
        assert_eq!(ch.signature_algorithms, vec![0x0403, 0x0804]);
        assert_eq!(ch.alpn, vec!["h2".to_string(), "http/1.1".to_string()]);
        assert_eq!(ch.supported_versions, vec![0x0304, 0x0303]);
        assert_eq!(ch.psk_key_exchange_modes, vec![0x01]);
        assert_eq!(ch.key_share, vec![0x001d]);
        assert_eq!(ch.extensions, vec![0, 10, 13, 16, 43, 45, 51]);
        assert_eq!(ch.extensions_normalized, vec![0, 10, 13, 16, 43, 45, 51]);
    }

    #[test]
    fn test_raw_is_retained_verbatim() {
        let record = typical_hello().build();
        let ch = ClientHello::parse(record.clone()).unwrap();
        assert_eq!(ch.raw(), record.as_slice());
    }

    #[test]
    fn test_trailing_bytes_are_dropped() {
        let mut record = typical_hello().build();
        let expected_len = record.len();
        record.extend_from_slice(&[0xde, 0xad]);
        let ch = ClientHello::parse(record).unwrap();
        assert_eq!(ch.raw().len(), expected_len);
    }

    #[test]
    fn test_grease_cipher_and_extension_folded() {
        let record = typical_hello()
            .cipher_suites(&[0x5a5a, 0x1301])
            .ext(0x3a3a, Vec::new()) // GREASE extension
            .build();
        let ch = ClientHello::parse(record).unwrap();

        assert_eq!(ch.cipher_suites, vec![GREASE_PLACEHOLDER, 0x1301]);
        assert_eq!(ch.extensions.last(), Some(&GREASE_PLACEHOLDER));
    }

    #[test]
    fn test_grease_key_share_group_folded() {
        let record = HelloBuilder::new()
            .key_share_entries(&[(0x7a7a, &[0x01]), (0x001d, &[0xab; 32])])
            .build();
        let ch = ClientHello::parse(record).unwrap();
        assert_eq!(ch.key_share, vec![GREASE_PLACEHOLDER, 0x001d]);
    }

    #[test]
    fn test_extensions_normalized_is_sorted() {
        let record = HelloBuilder::new()
            .versions(&[0x0304])
            .sni("example.com")
            .groups(&[0x001d])
            .build();
        let ch = ClientHello::parse(record).unwrap();
        assert_eq!(ch.extensions, vec![43, 0, 10]);
        assert_eq!(ch.extensions_normalized, vec![0, 10, 43]);
    }

    #[test]
    fn test_unknown_extension_recorded() {
        let record = HelloBuilder::new().ext(0xfe0d, vec![0x00, 0x01]).build();
        let ch = ClientHello::parse(record).unwrap();
        assert_eq!(ch.extensions, vec![0xfe0d]);
    }

    #[test]
    fn test_transport_parameters_payload_retained() {
        let qtp = vec![0x01, 0x04, 0x80, 0x00, 0x75, 0x30];
        let record = HelloBuilder::new()
            .ext(EXT_QUIC_TRANSPORT_PARAMETERS, qtp.clone())
            .build();
        let ch = ClientHello::parse(record).unwrap();
        assert_eq!(ch.transport_parameters_raw(), Some(qtp.as_slice()));
    }

    #[test]
    fn test_no_extensions() {
        let ch = ClientHello::parse(HelloBuilder::new().build()).unwrap();
        assert!(ch.extensions.is_empty());
        assert!(ch.server_name.is_empty());
    }

    // === Error tests ===

    #[test]
    fn test_not_a_handshake_record() {
        let mut record = typical_hello().build();
        record[0] = 0x17;
        assert!(matches!(
            ClientHello::parse(record),
            Err(TlsError::NotHandshake)
        ));
    }

    #[test]
    fn test_not_a_client_hello() {
        let mut record = typical_hello().build();
        record[5] = 0x02; // ServerHello
        assert!(matches!(
            ClientHello::parse(record),
            Err(TlsError::NotClientHello)
        ));
    }

    #[test]
    fn test_truncated_record() {
        let mut record = typical_hello().build();
        record.truncate(20);
        assert!(matches!(
            ClientHello::parse(record),
            Err(TlsError::Truncated(_))
        ));
    }

    #[test]
    fn test_malformed_extension_payload() {
        // SNI extension whose inner list length overruns the payload
        let record = HelloBuilder::new()
            .ext(EXT_SERVER_NAME, vec![0x00, 0xff, 0x00])
            .build();
        assert!(matches!(
            ClientHello::parse(record),
            Err(TlsError::MalformedExtension("server_name"))
        ));
    }

    // === Fingerprint tests ===

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = ClientHello::parse(typical_hello().build()).unwrap();
        let b = ClientHello::parse(typical_hello().build()).unwrap();
        assert_eq!(a.nid, b.nid);
        assert_eq!(a.norm_nid, b.norm_nid);
        assert_eq!(a.id, b.id);
        assert_eq!(a.norm_id, b.norm_id);
        assert_ne!(a.nid, 0);
    }

    #[test]
    fn test_hex_ids_match_nids() {
        let ch = ClientHello::parse(typical_hello().build()).unwrap();
        assert_eq!(ch.id, ch.fingerprint_id(false));
        assert_eq!(ch.norm_id, ch.fingerprint_id(true));
        assert_eq!(ch.id.len(), 16);
    }

    #[test]
    fn test_normalized_nid_invariant_under_extension_permutation() {
        let forward = HelloBuilder::new()
            .sni("example.com")
            .groups(&[0x001d, 0x0017])
            .versions(&[0x0304])
            .build();
        let reversed = HelloBuilder::new()
            .versions(&[0x0304])
            .groups(&[0x001d, 0x0017])
            .sni("example.com")
            .build();

        let a = ClientHello::parse(forward).unwrap();
        let b = ClientHello::parse(reversed).unwrap();

        assert_eq!(a.norm_nid, b.norm_nid);
        assert_ne!(a.nid, b.nid); // wire-order hash must see the difference
    }

    #[test]
    fn test_nid_invariant_under_grease_substitution() {
        let with_0a = HelloBuilder::new()
            .cipher_suites(&[0x0a0a, 0x1301])
            .ext(0x0a0a, Vec::new())
            .key_share_entries(&[(0x0a0a, &[0x01]), (0x001d, &[0xab; 32])])
            .build();
        let with_fa = HelloBuilder::new()
            .cipher_suites(&[0xfafa, 0x1301])
            .ext(0xcaca, Vec::new())
            .key_share_entries(&[(0xbaba, &[0x01]), (0x001d, &[0xab; 32])])
            .build();

        let a = ClientHello::parse(with_0a).unwrap();
        let b = ClientHello::parse(with_fa).unwrap();

        assert_eq!(a.nid, b.nid);
        assert_eq!(a.norm_nid, b.norm_nid);
    }

    #[test]
    fn test_inner_list_order_changes_fingerprint() {
        let a = ClientHello::parse(HelloBuilder::new().groups(&[0x001d, 0x0017]).build()).unwrap();
        let b = ClientHello::parse(HelloBuilder::new().groups(&[0x0017, 0x001d]).build()).unwrap();
        assert_ne!(a.norm_nid, b.norm_nid);
    }

    // === Async reader tests ===

    #[tokio::test]
    async fn test_read_client_hello_from_stream() {
        let record = typical_hello().build();
        let mut cursor = std::io::Cursor::new(record.clone());
        let ch = read_client_hello(&mut cursor).await.unwrap();
        assert_eq!(ch.raw(), record.as_slice());
        assert_eq!(ch.server_name, "example.com");
    }

    #[tokio::test]
    async fn test_read_client_hello_rejects_non_tls() {
        let mut cursor = std::io::Cursor::new(b"GET / HTTP/1.1\r\n".to_vec());
        assert!(matches!(
            read_client_hello(&mut cursor).await,
            Err(TlsError::NotHandshake)
        ));
    }

    #[tokio::test]
    async fn test_read_client_hello_short_stream() {
        let mut record = typical_hello().build();
        record.truncate(10);
        let mut cursor = std::io::Cursor::new(record);
        assert!(matches!(
            read_client_hello(&mut cursor).await,
            Err(TlsError::Io(_))
        ));
    }

    // === Serialization tests ===

    #[test]
    fn test_json_projection_keys() {
        let ch = ClientHello::parse(typical_hello().build()).unwrap();
        let json = serde_json::to_value(&ch).unwrap();

        for key in [
            "tls_record_version",
            "tls_handshake_version",
            "cipher_suites",
            "compression_methods",
            "extensions",
            "extensions_normalized",
            "server_name",
            "supported_groups",
            "ec_point_formats",
            "signature_algorithms",
            "alpn",
            "compress_certificate",
            "record_size_limit",
            "supported_versions",
            "psk_key_exchange_modes",
            "key_share",
            "application_settings",
            "nid",
            "norm_nid",
            "id",
            "norm_id",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        // raw bytes and hash-only fields must not leak into the projection
        assert!(json.get("raw").is_none());
        assert!(json.get("alpn_with_lengths").is_none());
        assert!(json.get("user_agent").is_none());
    }
}
