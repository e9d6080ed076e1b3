//! Gathering of a peer's Initial packets
//!
//! A client's first flight may spread the ClientHello over several Initial
//! packets. [`GatheredClientInitials`] is the per-peer state machine that
//! accepts decoded packets until the embedded ClientHello and its transport
//! parameters parse completely, then publishes a one-shot completion that
//! [`GatheredClientInitials::wait`] observes.
//!
//! Two bounds protect against hostile peers: packets with a decoded number
//! above `max_packet_number` and packets beyond `max_packet_count` are
//! rejected outright, and the gathering dies at its deadline.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::fingerprint::{FingerprintHasher, FingerprintId};
use crate::tls::{ClientHello, TlsError};

use super::error::{GatherError, QuicError};
use super::frame::Frame;
use super::header::{decode_initial, QuicHeader};
use super::reassembly::{ClientHelloReconstructor, ReassemblyStatus};
use super::transport_params::TransportParameters;

/// Token marker hashed when the first Initial carried a token.
pub const TOKEN_PRESENT: u32 = 0x0000_0001;
/// Token marker hashed when the first Initial carried no token.
pub const TOKEN_ABSENT: u32 = 0x0000_0000;

/// Default bound on the decoded packet number of an accepted Initial.
pub const DEFAULT_MAX_PACKET_NUMBER: u64 = 32;
/// Default bound on the number of Initials gathered per peer.
pub const DEFAULT_MAX_PACKET_COUNT: usize = 4;

/// One parsed Initial packet: header, decoded frames and the raw datagram.
#[derive(Debug, Clone, Serialize)]
pub struct ClientInitial {
    /// Decoded header fields
    pub header: QuicHeader,
    /// Frame type IDs in wire order
    #[serde(rename = "frames")]
    frame_types: Vec<u64>,
    /// Decoded frames in wire order
    #[serde(skip)]
    pub frames: Vec<Frame>,
    #[serde(skip)]
    raw: Vec<u8>,
}

impl ClientInitial {
    /// Decode one UDP payload into a `ClientInitial`.
    ///
    /// # Errors
    ///
    /// Propagates [`QuicError`] from the Initial decoder; the benign
    /// rejections keep their meaning.
    pub fn parse(p: &[u8]) -> Result<Self, QuicError> {
        let (header, frames) = decode_initial(p)?;
        Ok(Self::from_parts(header, frames, p.to_vec()))
    }

    pub(crate) fn from_parts(header: QuicHeader, frames: Vec<Frame>, raw: Vec<u8>) -> Self {
        let frame_types = frames.iter().map(Frame::frame_type).collect();
        Self {
            header,
            frame_types,
            frames,
            raw,
        }
    }

    /// Frame type IDs in wire order.
    #[must_use]
    pub fn frame_types(&self) -> &[u64] {
        &self.frame_types
    }

    /// The raw packet bytes as received.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

/// A ClientHello recovered from a reassembled CRYPTO stream.
///
/// QUIC carries the handshake without the TLS record layer, so parsing
/// synthesizes a record prefix; the version bytes in that prefix are not a
/// real TLS version and are discarded by consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct QuicClientHello {
    inner: ClientHello,
}

impl QuicClientHello {
    /// Parse reassembled CRYPTO bytes as a ClientHello.
    ///
    /// # Errors
    ///
    /// Propagates any [`TlsError`] from the record parser.
    #[allow(clippy::cast_possible_truncation)]
    pub fn parse(p: &[u8]) -> Result<Self, TlsError> {
        let mut record = Vec::with_capacity(5 + p.len());
        record.push(0x16);
        record.extend_from_slice(&[0x00, 0x00]);
        record.extend_from_slice(&(p.len() as u16).to_be_bytes());
        record.extend_from_slice(p);

        Ok(Self {
            inner: ClientHello::parse(record)?,
        })
    }

    /// The CRYPTO stream bytes, without the synthetic record prefix.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.inner.raw()[5..]
    }
}

impl Deref for QuicClientHello {
    type Target = ClientHello;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Debug, Default)]
struct GatherInner {
    /// Gathered packets, sorted by decoded packet number
    packets: Vec<ClientInitial>,
    reconstructor: ClientHelloReconstructor,
    client_hello: Option<std::sync::Arc<QuicClientHello>>,
    transport_parameters: Option<std::sync::Arc<TransportParameters>>,
    num_id: u64,
    hex_id: String,
}

/// Per-peer aggregation of Initial packets until the ClientHello completes.
#[derive(Debug)]
pub struct GatheredClientInitials {
    inner: Mutex<GatherInner>,
    deadline: Instant,
    max_packet_number: u64,
    max_packet_count: usize,
    completed: AtomicBool,
    notify: Notify,
}

impl Default for GatheredClientInitials {
    fn default() -> Self {
        Self::new()
    }
}

impl GatheredClientInitials {
    /// Create a gathering that never expires.
    #[must_use]
    pub fn new() -> Self {
        Self::with_deadline(Instant::now() + std::time::Duration::from_secs(86400 * 365))
    }

    /// Create a gathering that expires at `deadline`.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Mutex::new(GatherInner::default()),
            deadline,
            max_packet_number: DEFAULT_MAX_PACKET_NUMBER,
            max_packet_count: DEFAULT_MAX_PACKET_COUNT,
            completed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Override the per-peer packet bounds.
    #[must_use]
    pub fn with_limits(mut self, max_packet_number: u64, max_packet_count: usize) -> Self {
        self.max_packet_number = max_packet_number;
        self.max_packet_count = max_packet_count;
        self
    }

    /// Add one decoded Initial packet.
    ///
    /// Packets arriving after completion are dropped silently: an Initial
    /// carrying only an ACK after the ClientHello finished is expected
    /// traffic, not an error.
    ///
    /// # Errors
    ///
    /// - [`GatherError::Expired`] once past the deadline
    /// - [`GatherError::PacketRejected`] when the packet number or packet
    ///   count exceeds the per-peer bounds
    /// - reassembly and parse errors when the flight is malformed
    pub fn add_packet(&self, packet: ClientInitial) -> Result<(), GatherError> {
        let mut inner = self.inner.lock();

        if self.expired() {
            return Err(GatherError::Expired);
        }

        if self.completed.load(Ordering::Acquire) {
            trace!("gathering already complete, dropping packet");
            return Ok(());
        }

        let pn = packet.header.packet_number_value();
        if pn > self.max_packet_number || inner.packets.len() >= self.max_packet_count {
            return Err(GatherError::PacketRejected);
        }

        if inner
            .packets
            .iter()
            .any(|p| p.header.packet_number_value() == pn)
        {
            trace!(pn, "duplicate packet number, discarding");
            return Ok(());
        }

        let crypto_fragments: Vec<(u64, Vec<u8>)> = packet
            .frames
            .iter()
            .filter_map(|f| match f {
                Frame::Crypto { offset, data, .. } => Some((*offset, data.clone())),
                _ => None,
            })
            .collect();

        inner.packets.push(packet);
        inner
            .packets
            .sort_by_key(|p| p.header.packet_number_value());

        let mut status = ReassemblyStatus::NeedMore;
        for (offset, data) in &crypto_fragments {
            if inner.reconstructor.add_fragment(*offset, data)? == ReassemblyStatus::Complete {
                status = ReassemblyStatus::Complete;
                break;
            }
        }

        if status == ReassemblyStatus::NeedMore {
            return Ok(());
        }

        self.complete_locked(&mut inner)
    }

    /// Finish the gathering: parse the reassembled ClientHello, attach the
    /// transport parameters, compute the composite ID and publish.
    fn complete_locked(&self, inner: &mut GatherInner) -> Result<(), GatherError> {
        let bytes = inner
            .reconstructor
            .reconstructed()
            .ok_or(GatherError::Incomplete)?
            .to_vec();

        let hello = QuicClientHello::parse(&bytes)?;
        let qtp_raw = hello
            .transport_parameters_raw()
            .ok_or(GatherError::MissingTransportParameters)?;
        let tp =
            TransportParameters::parse(qtp_raw).map_err(GatherError::TransportParameters)?;

        inner.num_id = calc_gathered_num_id(&inner.packets);
        inner.hex_id = FingerprintId(inner.num_id).as_hex();
        inner.client_hello = Some(std::sync::Arc::new(hello));
        inner.transport_parameters = Some(std::sync::Arc::new(tp));

        // one-shot publication, still under the lock
        self.completed.store(true, Ordering::Release);
        self.notify.notify_waiters();

        debug!(hex_id = %inner.hex_id, packets = inner.packets.len(), "gathering complete");
        Ok(())
    }

    /// Whether the gathering deadline has passed.
    #[must_use]
    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Whether the ClientHello has been fully reassembled and parsed.
    #[must_use]
    pub fn completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Block until the gathering completes or its deadline passes.
    ///
    /// # Errors
    ///
    /// Returns [`GatherError::Expired`] when the deadline elapses first.
    pub async fn wait(&self) -> Result<(), GatherError> {
        loop {
            let notified = self.notify.notified();
            if self.completed() {
                return Ok(());
            }
            tokio::select! {
                () = notified => {}
                () = tokio::time::sleep_until(self.deadline) => {
                    if self.completed() {
                        return Ok(());
                    }
                    return Err(GatherError::Expired);
                }
            }
        }
    }

    /// The reassembled ClientHello, once complete.
    #[must_use]
    pub fn client_hello(&self) -> Option<std::sync::Arc<QuicClientHello>> {
        self.inner.lock().client_hello.clone()
    }

    /// The transport parameters, once complete.
    #[must_use]
    pub fn transport_parameters(&self) -> Option<std::sync::Arc<TransportParameters>> {
        self.inner.lock().transport_parameters.clone()
    }

    /// The gathered-initials numeric ID, 0 until complete.
    #[must_use]
    pub fn num_id(&self) -> u64 {
        self.inner.lock().num_id
    }

    /// Hex rendering of the numeric ID, empty until complete.
    #[must_use]
    pub fn hex_id(&self) -> String {
        self.inner.lock().hex_id.clone()
    }

    /// The three hash inputs of the composite fingerprint, once complete.
    #[must_use]
    pub(crate) fn fingerprint_inputs(&self) -> Option<(u64, i64, u64)> {
        let inner = self.inner.lock();
        let hello = inner.client_hello.as_ref()?;
        let tp = inner.transport_parameters.as_ref()?;
        Some((inner.num_id, hello.norm_nid, tp.num_id))
    }
}

impl Serialize for GatheredClientInitials {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let inner = self.inner.lock();
        let mut st = serializer.serialize_struct("GatheredClientInitials", 5)?;
        st.serialize_field("packets", &inner.packets)?;
        st.serialize_field("client_hello", &inner.client_hello)?;
        st.serialize_field("transport_parameters", &inner.transport_parameters)?;
        st.serialize_field("num_id", &inner.num_id)?;
        st.serialize_field("hex_id", &inner.hex_id)?;
        st.end()
    }
}

/// SHA-1 composite over the first packet's header shape and the merged,
/// deduplicated, sorted frame types of the whole flight.
fn calc_gathered_num_id(packets: &[ClientInitial]) -> u64 {
    let first = &packets[0];

    let mut h = FingerprintHasher::new();
    h.update_arr(&first.header.version);
    h.update_u32(first.header.dcid_length);
    h.update_u32(first.header.scid_length);
    h.update_arr(&first.header.packet_number);

    let mut frame_ids: Vec<u8> = packets
        .iter()
        .flat_map(|p| p.frames.iter().map(Frame::type_low_byte))
        .collect();
    frame_ids.sort_unstable();
    frame_ids.dedup();
    h.update_arr(&frame_ids);

    h.update_u32(if first.header.has_token {
        TOKEN_PRESENT
    } else {
        TOKEN_ABSENT
    });

    h.finish_u64()
}
