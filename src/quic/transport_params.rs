//! QUIC transport parameters (TLS extension 57)
//!
//! The transport-parameters extension is a flat list of (id, length, value)
//! entries. The fingerprint captures eleven enumerated values bytewise plus
//! the sorted set of every parameter ID the client sent. Reserved GREASE
//! IDs are folded to a fixed placeholder, and stored values have their VLI
//! length bits cleared so the hash sees the numeric magnitude rather than
//! the encoding width.

use serde::Serialize;

use crate::fingerprint::{FingerprintHasher, FingerprintId};
use crate::wire::{read_next_vli, unset_vli_bits, SliceReader, WireError};

/// Placeholder every GREASE transport parameter ID is folded to.
pub const QTP_GREASE_PLACEHOLDER: u64 = 27;

const QTP_MAX_IDLE_TIMEOUT: u64 = 0x01;
const QTP_MAX_UDP_PAYLOAD_SIZE: u64 = 0x03;
const QTP_INITIAL_MAX_DATA: u64 = 0x04;
const QTP_INITIAL_MAX_STREAM_DATA_BIDI_LOCAL: u64 = 0x05;
const QTP_INITIAL_MAX_STREAM_DATA_BIDI_REMOTE: u64 = 0x06;
const QTP_INITIAL_MAX_STREAM_DATA_UNI: u64 = 0x07;
const QTP_INITIAL_MAX_STREAMS_BIDI: u64 = 0x08;
const QTP_INITIAL_MAX_STREAMS_UNI: u64 = 0x09;
const QTP_ACK_DELAY_EXPONENT: u64 = 0x0a;
const QTP_MAX_ACK_DELAY: u64 = 0x0b;
const QTP_ACTIVE_CONNECTION_ID_LIMIT: u64 = 0x0e;

/// Check whether a transport parameter ID is a reserved GREASE value.
///
/// Reserved IDs are 27, 58, 89 and so on: `31 * N + 27` (RFC 9000
/// Section 18.1).
#[must_use]
pub const fn is_grease_transport_parameter(id: u64) -> bool {
    id >= 27 && (id - 27) % 31 == 0
}

/// The fingerprintable combination of a client's transport parameters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransportParameters {
    pub max_idle_timeout: Vec<u8>,
    pub max_udp_payload_size: Vec<u8>,
    pub initial_max_data: Vec<u8>,
    pub initial_max_stream_data_bidi_local: Vec<u8>,
    pub initial_max_stream_data_bidi_remote: Vec<u8>,
    pub initial_max_stream_data_uni: Vec<u8>,
    pub initial_max_streams_bidi: Vec<u8>,
    pub initial_max_streams_uni: Vec<u8>,
    pub ack_delay_exponent: Vec<u8>,
    pub max_ack_delay: Vec<u8>,
    pub active_connection_id_limit: Vec<u8>,

    /// Every parameter ID observed, GREASE folded, sorted ascending
    pub qtp_ids: Vec<u64>,

    /// Fingerprint over the value bytes and the ID set
    pub num_id: u64,
    /// Hex rendering of `num_id`
    pub hex_id: String,
}

impl TransportParameters {
    /// Parse the payload of the quic_transport_parameters(57) extension.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] when an entry's length field overruns the
    /// payload or a VLI is truncated.
    pub fn parse(ext_data: &[u8]) -> Result<Self, WireError> {
        let mut tp = Self::default();
        let mut r = SliceReader::new(ext_data);

        while !r.is_empty() {
            let (param_id, _) = read_next_vli(&mut r)?;
            let (value_len, _) = read_next_vli(&mut r)?;
            let value_len = usize::try_from(value_len).map_err(|_| WireError::UnexpectedEof)?;
            let mut value = r.read_exact(value_len)?.to_vec();

            match param_id {
                QTP_MAX_IDLE_TIMEOUT => {
                    unset_vli_bits(&mut value);
                    tp.max_idle_timeout = value;
                }
                QTP_MAX_UDP_PAYLOAD_SIZE => {
                    unset_vli_bits(&mut value);
                    tp.max_udp_payload_size = value;
                }
                QTP_INITIAL_MAX_DATA => {
                    unset_vli_bits(&mut value);
                    tp.initial_max_data = value;
                }
                QTP_INITIAL_MAX_STREAM_DATA_BIDI_LOCAL => {
                    unset_vli_bits(&mut value);
                    tp.initial_max_stream_data_bidi_local = value;
                }
                QTP_INITIAL_MAX_STREAM_DATA_BIDI_REMOTE => {
                    unset_vli_bits(&mut value);
                    tp.initial_max_stream_data_bidi_remote = value;
                }
                QTP_INITIAL_MAX_STREAM_DATA_UNI => {
                    unset_vli_bits(&mut value);
                    tp.initial_max_stream_data_uni = value;
                }
                QTP_INITIAL_MAX_STREAMS_BIDI => {
                    unset_vli_bits(&mut value);
                    tp.initial_max_streams_bidi = value;
                }
                QTP_INITIAL_MAX_STREAMS_UNI => {
                    unset_vli_bits(&mut value);
                    tp.initial_max_streams_uni = value;
                }
                QTP_ACK_DELAY_EXPONENT => {
                    unset_vli_bits(&mut value);
                    tp.ack_delay_exponent = value;
                }
                QTP_MAX_ACK_DELAY => {
                    unset_vli_bits(&mut value);
                    tp.max_ack_delay = value;
                }
                QTP_ACTIVE_CONNECTION_ID_LIMIT => {
                    unset_vli_bits(&mut value);
                    tp.active_connection_id_limit = value;
                }
                _ => {}
            }

            if is_grease_transport_parameter(param_id) {
                tp.qtp_ids.push(QTP_GREASE_PLACEHOLDER);
            } else {
                tp.qtp_ids.push(param_id);
            }
        }

        tp.qtp_ids.sort_unstable();

        tp.num_id = tp.calc_num_id();
        tp.hex_id = FingerprintId(tp.num_id).as_hex();

        Ok(tp)
    }

    fn calc_num_id(&self) -> u64 {
        let mut h = FingerprintHasher::new();
        h.update_arr(&self.max_idle_timeout);
        h.update_arr(&self.max_udp_payload_size);
        h.update_arr(&self.initial_max_data);
        h.update_arr(&self.initial_max_stream_data_bidi_local);
        h.update_arr(&self.initial_max_stream_data_bidi_remote);
        h.update_arr(&self.initial_max_stream_data_uni);
        h.update_arr(&self.initial_max_streams_bidi);
        h.update_arr(&self.initial_max_streams_uni);
        h.update_arr(&self.ack_delay_exponent);
        h.update_arr(&self.max_ack_delay);
        h.update_arr(&self.active_connection_id_limit);

        #[allow(clippy::cast_possible_truncation)]
        h.update_u32(self.qtp_ids.len() as u32);
        for &id in &self.qtp_ids {
            h.update_u64(id);
        }

        h.finish_u64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // === GREASE classification ===

    #[test]
    fn test_grease_transport_parameter_table() {
        for id in 0..27u64 {
            assert!(!is_grease_transport_parameter(id), "{id} is not GREASE");
        }
        assert!(is_grease_transport_parameter(27));
        assert!(!is_grease_transport_parameter(31));
        assert!(is_grease_transport_parameter(58));
        assert!(is_grease_transport_parameter(89));
        assert!(is_grease_transport_parameter(2_508_523_926_926_946_207));
    }

    // === Parsing ===

    /// Transport parameters as sent by a Chrome-like client, including a
    /// GREASE entry and several Google-specific IDs.
    fn chrome_like_ext_data() -> Vec<u8> {
        vec![
            0x09, 0x02, 0x40, 0x67, // initial_max_streams_uni
            0x0f, 0x00, // initial_source_connection_id (empty)
            0x01, 0x04, 0x80, 0x00, 0x75, 0x30, // max_idle_timeout
            0x05, 0x04, 0x80, 0x60, 0x00, 0x00, // initial_max_stream_data_bidi_local
            0xe2, 0xd0, 0x11, 0x38, 0x87, 0x0c, 0x6f, 0x9f, 0x01, 0x96, // GREASE id
            0x07, 0x04, 0x80, 0x60, 0x00, 0x00, // initial_max_stream_data_uni
            0x71, 0x28, 0x04, 0x52, 0x56, 0x43, 0x4d, // google_connection_options
            0x03, 0x02, 0x45, 0xc0, // max_udp_payload_size
            0x20, 0x04, 0x80, 0x01, 0x00, 0x00, // max_datagram_frame_size
            0x08, 0x02, 0x40, 0x64, // initial_max_streams_bidi
            0x80, 0xff, 0x73, 0xdb, 0x0c, 0x00, 0x00, 0x00, 0x01, 0xba, 0xca, 0x5a, 0x5a,
            0x00, 0x00, 0x00, 0x01, // version_information
            0x80, 0x00, 0x47, 0x52, 0x04, 0x00, 0x00, 0x00, 0x01, // google_quic_version
            0x06, 0x04, 0x80, 0x60, 0x00, 0x00, // initial_max_stream_data_bidi_remote
            0x04, 0x04, 0x80, 0xf0, 0x00, 0x00, // initial_max_data
        ]
    }

    #[test]
    fn test_parse_chrome_like_parameters() {
        let tp = TransportParameters::parse(&chrome_like_ext_data()).unwrap();

        // VLI length bits cleared on every stored value
        assert_eq!(tp.max_idle_timeout, vec![0x00, 0x00, 0x75, 0x30]);
        assert_eq!(tp.max_udp_payload_size, vec![0x05, 0xc0]);
        assert_eq!(tp.initial_max_data, vec![0x00, 0xf0, 0x00, 0x00]);
        assert_eq!(
            tp.initial_max_stream_data_bidi_local,
            vec![0x00, 0x60, 0x00, 0x00]
        );
        assert_eq!(
            tp.initial_max_stream_data_bidi_remote,
            vec![0x00, 0x60, 0x00, 0x00]
        );
        assert_eq!(tp.initial_max_stream_data_uni, vec![0x00, 0x60, 0x00, 0x00]);
        assert_eq!(tp.initial_max_streams_bidi, vec![0x00, 0x64]);
        assert_eq!(tp.initial_max_streams_uni, vec![0x00, 0x67]);
        assert!(tp.ack_delay_exponent.is_empty());
        assert!(tp.max_ack_delay.is_empty());
        assert!(tp.active_connection_id_limit.is_empty());

        // sorted, with the GREASE id folded to 27
        assert_eq!(
            tp.qtp_ids,
            vec![
                0x01,
                0x03,
                0x04,
                0x05,
                0x06,
                0x07,
                0x08,
                0x09,
                0x0f,
                27,
                0x20,
                0x3128,
                0x4752,
                0x00ff_73db,
            ]
        );
    }

    #[test]
    fn test_ids_are_sorted_regardless_of_wire_order() {
        let forward = TransportParameters::parse(&[0x01, 0x01, 0x0a, 0x03, 0x01, 0x0b]).unwrap();
        let reversed = TransportParameters::parse(&[0x03, 0x01, 0x0b, 0x01, 0x01, 0x0a]).unwrap();
        assert_eq!(forward.qtp_ids, vec![0x01, 0x03]);
        assert_eq!(forward.qtp_ids, reversed.qtp_ids);
    }

    #[test]
    fn test_vli_width_is_ignored_in_values() {
        // 30000 encoded as a 4-byte VLI and the magnitude-only bytes differ
        // by the cleared prefix bits
        let tp = TransportParameters::parse(&[0x01, 0x04, 0x80, 0x00, 0x75, 0x30]).unwrap();
        assert_eq!(tp.max_idle_timeout, vec![0x00, 0x00, 0x75, 0x30]);
    }

    #[test]
    fn test_parse_rejects_overrunning_value() {
        // declared length 4, only 2 bytes present
        assert!(TransportParameters::parse(&[0x01, 0x04, 0x80, 0x00]).is_err());
    }

    #[test]
    fn test_parse_rejects_truncated_vli() {
        assert!(TransportParameters::parse(&[0x40]).is_err());
    }

    #[test]
    fn test_empty_extension() {
        let tp = TransportParameters::parse(&[]).unwrap();
        assert!(tp.qtp_ids.is_empty());
        assert_ne!(tp.num_id, 0);
    }

    // === Fingerprint ===

    #[test]
    fn test_num_id_stable_and_hex_matches() {
        let a = TransportParameters::parse(&chrome_like_ext_data()).unwrap();
        let b = TransportParameters::parse(&chrome_like_ext_data()).unwrap();
        assert_eq!(a.num_id, b.num_id);
        assert_eq!(a.hex_id, FingerprintId(a.num_id).as_hex());
        assert_eq!(a.hex_id.len(), 16);
    }

    #[test]
    fn test_num_id_insensitive_to_grease_value() {
        // two different GREASE ids fold to the same placeholder
        let with_27 = TransportParameters::parse(&[0x1b, 0x01, 0x00]).unwrap();
        let with_58 = TransportParameters::parse(&[0x3a, 0x01, 0x00]).unwrap();
        assert_eq!(with_27.qtp_ids, with_58.qtp_ids);
        assert_eq!(with_27.num_id, with_58.num_id);
    }

    #[test]
    fn test_num_id_sensitive_to_value_bytes() {
        let a = TransportParameters::parse(&[0x01, 0x01, 0x1e]).unwrap();
        let b = TransportParameters::parse(&[0x01, 0x01, 0x3c]).unwrap();
        assert_ne!(a.num_id, b.num_id);
    }
}
