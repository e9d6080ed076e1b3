//! Fingerprint stores
//!
//! Both fingerprinters share a contract: a concurrent map from peer key to
//! a value with per-entry TTL. No global lock protects lookups; each entry
//! carries its own synchronization, so one peer's handshake never blocks
//! another's.
//!
//! Expiry is a deferred task per insert with compare-and-delete: the task
//! only removes the entry it scheduled for, so a newer entry under the same
//! key is never clobbered by an older entry's timer.
//!
//! # Example
//!
//! ```no_run
//! use wireprint::store::TlsFingerprinter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fingerprinter = TlsFingerprinter::new();
//!
//! let stream = tokio::net::TcpStream::connect("192.0.2.1:443").await?;
//! let peer = stream.peer_addr()?;
//!
//! // consumes the ClientHello, returns a stream that replays it
//! let _rewound = fingerprinter.handle_tcp(stream, peer).await?;
//!
//! if let Some(hello) = fingerprinter.peek(&peer.to_string()) {
//!     println!("TLS fingerprint: {}", hello.norm_id);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod quic;
mod tls;

use std::time::Duration;

pub use error::StoreError;
pub use quic::QuicFingerprinter;
pub use tls::TlsFingerprinter;

/// Default TTL for stored TLS ClientHello entries.
pub const DEFAULT_TLS_FINGERPRINT_TTL: Duration = Duration::from_secs(10);

/// Default TTL and gathering deadline for QUIC entries.
pub const DEFAULT_QUIC_FINGERPRINT_TTL: Duration = Duration::from_secs(10);
