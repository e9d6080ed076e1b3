//! Rewindable async stream
//!
//! The TLS fingerprinter consumes the `ClientHello` bytes off the TCP stream
//! before the real TLS stack ever sees them. [`RewindStream`] makes the
//! stream appear untouched: reads drain the replay buffer first, then
//! delegate to the inner stream. Writes and shutdown pass straight through,
//! so a half-close initiated by either side still propagates.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// An `AsyncRead + AsyncWrite` wrapper that replays buffered bytes before
/// reading from the inner stream.
#[derive(Debug)]
pub struct RewindStream<S> {
    inner: S,
    replay: Vec<u8>,
    replay_pos: usize,
}

impl<S> RewindStream<S> {
    /// Wrap `inner`, replaying `replay` before any further reads.
    #[must_use]
    pub fn new(inner: S, replay: Vec<u8>) -> Self {
        Self {
            inner,
            replay,
            replay_pos: 0,
        }
    }

    /// Bytes still pending replay.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.replay.len() - self.replay_pos
    }

    /// Consume the wrapper and return the inner stream.
    ///
    /// Any bytes not yet replayed are discarded.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for RewindStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.replay_pos < this.replay.len() {
            let available = &this.replay[this.replay_pos..];
            let n = available.len().min(buf.remaining());
            buf.put_slice(&available[..n]);
            this.replay_pos += n;
            if this.replay_pos == this.replay.len() {
                this.replay = Vec::new();
                this.replay_pos = 0;
            }
            return Poll::Ready(Ok(()));
        }

        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for RewindStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
