//! Sealing half of a box stream.

use super::{BoxEncoder, HEADER_SIZE, MAX_BODY_SIZE};
use crate::config::DEFAULT_WRITE_BUFFER_SIZE;
use crate::handshake::DirectionKeys;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::AsyncWrite;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteState {
    Open,
    /// Goodbye sealed, draining it to the transport
    Goodbye,
    /// Shutting down the transport
    Closing,
    Closed,
    Failed,
}

/// Writes plaintext to `W` as sealed box stream frames.
///
/// Each `poll_write` seals up to the buffer limit and returns the number of
/// plaintext bytes accepted; once that much sealed data is waiting on the
/// transport, writes wait for it to drain. `poll_shutdown` sends the goodbye
/// frame and then shuts the transport down even if sending it failed.
///
/// If the transport fails while a write's frames are going out, the write
/// reports only the plaintext of the frames that reached it in full, or the
/// error itself when none did.
///
/// Any error is fatal: later writes fail with `BrokenPipe`.
#[derive(Debug)]
pub struct BoxWriter<W> {
    inner: W,
    encoder: BoxEncoder,
    pending: Vec<u8>,
    flushed: usize,
    buffer_limit: usize,
    state: WriteState,
    error: Option<io::Error>,
}

impl<W: AsyncWrite + Unpin> BoxWriter<W> {
    /// Wrap `inner`, sealing with the send half of the session keys.
    pub fn new(inner: W, keys: DirectionKeys) -> Self {
        Self::with_buffer_limit(inner, keys, DEFAULT_WRITE_BUFFER_SIZE)
    }

    /// Like [`BoxWriter::new`] with an explicit backpressure threshold.
    pub fn with_buffer_limit(inner: W, keys: DirectionKeys, buffer_limit: usize) -> Self {
        Self {
            inner,
            encoder: BoxEncoder::new(keys),
            pending: Vec::with_capacity(buffer_limit.min(DEFAULT_WRITE_BUFFER_SIZE)),
            flushed: 0,
            buffer_limit: buffer_limit.max(1),
            state: WriteState::Open,
            error: None,
        }
    }

    /// Sealed bytes not yet handed to the transport
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.pending.len() - self.flushed
    }

    /// Whether the goodbye frame has been sent and the transport shut down
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == WriteState::Closed
    }

    /// Underlying transport
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwrap the transport, discarding unsent frames.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn fail(&mut self, err: io::Error) -> io::Error {
        tracing::debug!("box stream writer failed: {}", err);
        self.state = WriteState::Failed;
        self.pending.clear();
        self.flushed = 0;
        err
    }

    fn unusable(&mut self) -> io::Error {
        if let Some(err) = self.error.take() {
            return err;
        }
        let msg = match self.state {
            WriteState::Failed => "box stream writer failed",
            _ => "box stream writer is closed",
        };
        io::Error::new(io::ErrorKind::BrokenPipe, msg)
    }

    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while self.flushed < self.pending.len() {
            let n = ready!(Pin::new(&mut self.inner).poll_write(cx, &self.pending[self.flushed..]))?;
            if n == 0 {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "transport accepted no bytes",
                )));
            }
            self.flushed += n;
        }
        self.pending.clear();
        self.flushed = 0;
        Poll::Ready(Ok(()))
    }

    fn poll_drain_and_flush(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        ready!(self.poll_drain(cx))?;
        Pin::new(&mut self.inner).poll_flush(cx)
    }
}

/// Plaintext carried by the complete frames among the first `written` sealed
/// bytes of a write that accepted `accepted` bytes.
fn delivered_plaintext(written: usize, accepted: usize) -> usize {
    let frames = written / (HEADER_SIZE + MAX_BODY_SIZE);
    (frames * MAX_BODY_SIZE).min(accepted)
}

impl<W: AsyncWrite + Unpin> AsyncWrite for BoxWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.state != WriteState::Open {
            return Poll::Ready(Err(this.unusable()));
        }
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        if this.buffered() >= this.buffer_limit {
            if let Err(err) = ready!(this.poll_drain(cx)) {
                return Poll::Ready(Err(this.fail(err)));
            }
        }

        let room = this.buffer_limit.saturating_sub(this.buffered());
        let accepted = buf.len().min(room.max(MAX_BODY_SIZE));
        let start = this.pending.len();
        if let Err(err) = this.encoder.encode(&buf[..accepted], &mut this.pending) {
            return Poll::Ready(Err(this.fail(err.into())));
        }

        if let Poll::Ready(Err(err)) = this.poll_drain(cx) {
            let delivered = delivered_plaintext(this.flushed.saturating_sub(start), accepted);
            let err = this.fail(err);
            if delivered == 0 {
                return Poll::Ready(Err(err));
            }
            // complete frames reached the peer; the error surfaces on the next call
            this.error = Some(err);
            return Poll::Ready(Ok(delivered));
        }

        Poll::Ready(Ok(accepted))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match this.state {
            WriteState::Open => {}
            WriteState::Closed => return Poll::Ready(Ok(())),
            _ => return Poll::Ready(Err(this.unusable())),
        }

        match ready!(this.poll_drain_and_flush(cx)) {
            Ok(()) => Poll::Ready(Ok(())),
            Err(err) => Poll::Ready(Err(this.fail(err))),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match this.state {
                WriteState::Open => {
                    if let Err(err) = this.encoder.seal_goodbye(&mut this.pending) {
                        this.error = Some(err.into());
                        this.state = WriteState::Closing;
                        continue;
                    }
                    this.state = WriteState::Goodbye;
                }
                WriteState::Goodbye => {
                    if let Err(err) = ready!(this.poll_drain_and_flush(cx)) {
                        tracing::debug!("failed to send goodbye: {}", err);
                        this.error = Some(err);
                    }
                    this.state = WriteState::Closing;
                }
                WriteState::Failed => {
                    this.state = WriteState::Closing;
                }
                WriteState::Closing => {
                    let result = ready!(Pin::new(&mut this.inner).poll_shutdown(cx));
                    this.state = WriteState::Closed;
                    this.pending.clear();
                    this.flushed = 0;
                    return Poll::Ready(match this.error.take() {
                        Some(err) => Err(err),
                        None => result,
                    });
                }
                WriteState::Closed => return Poll::Ready(Ok(())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxstream::tests::direction;
    use crate::boxstream::BoxDecoder;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Transport that takes `budget` bytes, then resets.
    struct Flaky {
        written: Vec<u8>,
        budget: usize,
    }

    impl Flaky {
        fn new(budget: usize) -> Self {
            Self {
                written: Vec::new(),
                budget,
            }
        }
    }

    impl AsyncWrite for Flaky {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            if this.budget == 0 {
                return Poll::Ready(Err(io::ErrorKind::ConnectionReset.into()));
            }
            let n = buf.len().min(this.budget);
            this.budget -= n;
            this.written.extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_write_then_shutdown_emits_goodbye() {
        let (send, recv) = direction(1);
        let mut writer = BoxWriter::new(Vec::new(), send);

        writer.write_all(b"hello world").await.unwrap();
        writer.shutdown().await.unwrap();
        assert!(writer.is_closed());

        let wire = writer.into_inner();
        assert_eq!(wire.len(), 2 * HEADER_SIZE + 11);

        let decoded = BoxDecoder::new(recv).decode_all(&wire).unwrap();
        assert_eq!(decoded.plaintext, b"hello world");
        assert!(decoded.terminated);
    }

    #[tokio::test]
    async fn test_large_write_is_chunked() {
        let (send, recv) = direction(2);
        let mut writer = BoxWriter::with_buffer_limit(Vec::new(), send, 1024);
        let data = vec![0x5Cu8; 3 * MAX_BODY_SIZE + 17];

        writer.write_all(&data).await.unwrap();
        writer.flush().await.unwrap();
        assert_eq!(writer.buffered(), 0);

        let wire = writer.into_inner();
        let decoded = BoxDecoder::new(recv).decode_all(&wire).unwrap();
        assert_eq!(decoded.plaintext, data);
        assert!(!decoded.terminated);
    }

    #[tokio::test]
    async fn test_backpressure_over_small_pipe() {
        let (send, recv) = direction(3);
        let (client, mut server) = tokio::io::duplex(256);
        let mut writer = BoxWriter::with_buffer_limit(client, send, 512);
        let data: Vec<u8> = (0..50_000u32).map(|i| (i % 253) as u8).collect();

        let expected = data.clone();
        let writer_task = tokio::spawn(async move {
            writer.write_all(&data).await.unwrap();
            writer.shutdown().await.unwrap();
        });

        let mut wire = Vec::new();
        server.read_to_end(&mut wire).await.unwrap();
        writer_task.await.unwrap();

        let decoded = BoxDecoder::new(recv).decode_all(&wire).unwrap();
        assert_eq!(decoded.plaintext, expected);
        assert!(decoded.terminated);
    }

    #[tokio::test]
    async fn test_write_after_shutdown_fails() {
        let (send, _) = direction(4);
        let mut writer = BoxWriter::new(Vec::new(), send);
        writer.shutdown().await.unwrap();

        let err = writer.write_all(b"late").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        // shutting down twice is harmless
        writer.shutdown().await.unwrap();
        assert_eq!(writer.into_inner().len(), HEADER_SIZE);
    }

    #[tokio::test]
    async fn test_shutdown_reports_transport_failure() {
        let (send, _) = direction(5);
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let mut writer = BoxWriter::new(client, send);

        assert!(writer.shutdown().await.is_err());
        assert!(writer.write_all(b"x").await.is_err());
    }

    #[tokio::test]
    async fn test_write_reports_error_when_nothing_reached_transport() {
        let (send, _) = direction(6);
        let mut writer = BoxWriter::new(Flaky::new(HEADER_SIZE + 10), send);

        let err = writer.write(&[0xA5u8; 100]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);

        let err = writer.write(b"again").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_write_counts_only_frames_that_reached_transport() {
        let (send, recv) = direction(7);
        let budget = HEADER_SIZE + MAX_BODY_SIZE + 10;
        let mut writer = BoxWriter::new(Flaky::new(budget), send);
        let data = vec![0x3Cu8; 3 * MAX_BODY_SIZE];

        let n = writer.write(&data).await.unwrap();
        assert_eq!(n, MAX_BODY_SIZE);

        // the deferred transport error, then the writer stays failed
        let err = writer.write(&data[n..]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        let err = writer.write(&data[n..]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        // the counted bytes are exactly what the peer can open
        let wire = writer.into_inner().written;
        let complete = &wire[..HEADER_SIZE + MAX_BODY_SIZE];
        let decoded = BoxDecoder::new(recv).decode_all(complete).unwrap();
        assert_eq!(decoded.plaintext, &data[..n]);
    }
}
