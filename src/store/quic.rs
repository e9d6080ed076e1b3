//! QUIC fingerprint store
//!
//! Feeds raw UDP payloads into per-peer gatherings. Traffic that is not a
//! QUIC Initial is a silent no-op, so the store can sit on a socket shared
//! with other UDP protocols. The first packet from a peer creates its
//! gathering with a deadline; `lookup_await` blocks until that gathering
//! publishes completion or the deadline passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::quic::{
    generate_quic_fingerprint, ClientInitial, GatheredClientInitials, QuicFingerprint,
};

use super::error::StoreError;
use super::DEFAULT_QUIC_FINGERPRINT_TTL;

/// Concurrent store of per-peer Initial gatherings keyed by peer address.
#[derive(Debug)]
pub struct QuicFingerprinter {
    gatherings: Arc<DashMap<String, Arc<GatheredClientInitials>>>,
    timeout: Duration,
    closed: AtomicBool,
}

impl Default for QuicFingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

impl QuicFingerprinter {
    /// Create a fingerprinter with the default gathering deadline and TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_QUIC_FINGERPRINT_TTL)
    }

    /// Create a fingerprinter with a custom gathering deadline and TTL.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            gatherings: Arc::new(DashMap::new()),
            timeout,
            closed: AtomicBool::new(false),
        }
    }

    /// Decode one UDP payload and feed it to the peer's gathering.
    ///
    /// Packets that are not QUIC Initials are ignored. The first Initial
    /// from a peer creates its gathering with the store's deadline.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after [`Self::close`]; decode errors
    /// for packets that looked like Initials but could not be decrypted;
    /// gathering errors for rejected or malformed flights.
    pub async fn handle_packet(&self, from: &str, p: &[u8]) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }

        let initial = match ClientInitial::parse(p) {
            Ok(initial) => initial,
            Err(e) if e.is_benign() => {
                trace!(from, "not a QUIC Initial, ignoring");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let gathering = self.gathering_for(from);
        gathering.add_packet(initial)?;
        Ok(())
    }

    /// Get the peer's gathering, creating it (and scheduling its expiry) on
    /// first sight.
    fn gathering_for(&self, from: &str) -> Arc<GatheredClientInitials> {
        match self.gatherings.entry(from.to_string()) {
            Entry::Occupied(e) => Arc::clone(e.get()),
            Entry::Vacant(v) => {
                let gathering = Arc::new(GatheredClientInitials::with_deadline(
                    Instant::now() + self.timeout,
                ));
                v.insert(Arc::clone(&gathering));
                self.spawn_expiry(from.to_string(), Arc::clone(&gathering));
                debug!(from, "started QUIC gathering");
                gathering
            }
        }
    }

    fn spawn_expiry(&self, key: String, gathering: Arc<GatheredClientInitials>) {
        let gatherings = Arc::clone(&self.gatherings);
        let ttl = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if gatherings
                .remove_if(&key, |_, v| Arc::ptr_eq(v, &gathering))
                .is_some()
            {
                trace!(key = %key, "QUIC gathering entry expired");
            }
        });
    }

    /// Non-blocking lookup: the fingerprint, only if the peer's gathering
    /// has already completed.
    #[must_use]
    pub fn lookup(&self, from: &str) -> Option<QuicFingerprint> {
        let gathering = self.gatherings.get(from).map(|e| Arc::clone(e.value()))?;
        if !gathering.completed() {
            return None;
        }
        QuicFingerprint::from_completed(&gathering)
    }

    /// Block until the peer's gathering completes, then compute the
    /// fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no gathering exists for the
    /// key, or the gathering's expiry error when the deadline passes first.
    pub async fn lookup_await(&self, from: &str) -> Result<QuicFingerprint, StoreError> {
        let gathering = self
            .gatherings
            .get(from)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| StoreError::NotFound(from.to_string()))?;

        Ok(generate_quic_fingerprint(&gathering).await?)
    }

    /// Close the fingerprinter; future handlers fail fast.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Whether [`Self::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
