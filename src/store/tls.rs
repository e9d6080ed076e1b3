//! TLS fingerprint store
//!
//! Reads one `ClientHello` per connection, stores the parsed result keyed by
//! peer address and hands back a stream that replays the consumed bytes so
//! the connection can continue into a real TLS stack.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};

use crate::tls::{read_client_hello, ClientHello};
use crate::wire::RewindStream;

use super::error::StoreError;
use super::DEFAULT_TLS_FINGERPRINT_TTL;

/// Concurrent store of parsed `ClientHello`s keyed by peer address.
#[derive(Debug)]
pub struct TlsFingerprinter {
    entries: Arc<DashMap<String, Arc<ClientHello>>>,
    timeout: Duration,
    closed: AtomicBool,
}

impl Default for TlsFingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

impl TlsFingerprinter {
    /// Create a fingerprinter with the default entry TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TLS_FINGERPRINT_TTL)
    }

    /// Create a fingerprinter whose entries expire after `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            timeout,
            closed: AtomicBool::new(false),
        }
    }

    /// Parse a complete `ClientHello` record and store it under `from`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after [`Self::close`], or the parse
    /// error; a failed parse leaves the store untouched.
    pub async fn handle_message(&self, from: &str, p: &[u8]) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }

        let hello = ClientHello::parse(p.to_vec())?;
        self.store(from.to_string(), Arc::new(hello));
        Ok(())
    }

    /// Read one `ClientHello` off `stream`, store it under the peer address
    /// and return a stream that replays the consumed bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Closed`] after [`Self::close`], or the read or
    /// parse error. On error the consumed bytes are lost with the stream.
    pub async fn handle_tcp<S>(
        &self,
        mut stream: S,
        peer: SocketAddr,
    ) -> Result<RewindStream<S>, StoreError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }

        let hello = read_client_hello(&mut stream).await?;
        let replay = hello.raw().to_vec();

        debug!(peer = %peer, id = %hello.norm_id, "fingerprinted TLS connection");
        self.store(peer.to_string(), Arc::new(hello));

        Ok(RewindStream::new(stream, replay))
    }

    fn store(&self, key: String, hello: Arc<ClientHello>) {
        self.entries.insert(key.clone(), Arc::clone(&hello));

        let entries = Arc::clone(&self.entries);
        let ttl = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            // compare-and-delete: only remove the entry this task was
            // scheduled for, never a newer one under the same key
            if entries.remove_if(&key, |_, v| Arc::ptr_eq(v, &hello)).is_some() {
                trace!(key = %key, "TLS fingerprint entry expired");
            }
        });
    }

    /// Return the stored `ClientHello` without removing it.
    #[must_use]
    pub fn peek(&self, from: &str) -> Option<Arc<ClientHello>> {
        self.entries.get(from).map(|e| Arc::clone(e.value()))
    }

    /// Remove and return the stored `ClientHello`.
    #[must_use]
    pub fn pop(&self, from: &str) -> Option<Arc<ClientHello>> {
        self.entries.remove(from).map(|(_, v)| v)
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
