//! Opening half of a box stream.

use super::{BoxDecoder, FrameHeader, HEADER_SIZE, MAX_BODY_SIZE};
use crate::handshake::DirectionKeys;
use secretstream_crypto::aead::Tag;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, ReadBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    Header,
    Body { len: usize, tag: Tag },
    Finished,
    /// Closed locally, the transport is no longer read
    Closed,
    Failed,
}

/// Reads sealed box stream frames from `R` and yields their plaintext.
///
/// Reads return at most the rest of the current frame's body. After the
/// goodbye frame every read reports end of stream without touching the
/// transport. A transport that ends without a goodbye is an
/// `UnexpectedEof` error, never a clean end of stream.
///
/// Any error is fatal: later reads fail with `BrokenPipe`.
#[derive(Debug)]
pub struct BoxReader<R> {
    inner: R,
    decoder: BoxDecoder,
    header: [u8; HEADER_SIZE],
    filled: usize,
    /// Holds the sealed body while it arrives, then its plaintext
    body: Vec<u8>,
    consumed: usize,
    state: ReadState,
    goodbye: bool,
}

impl<R: AsyncRead + Unpin> BoxReader<R> {
    /// Wrap `inner`, opening with the receive half of the session keys.
    pub fn new(inner: R, keys: DirectionKeys) -> Self {
        Self {
            inner,
            decoder: BoxDecoder::new(keys),
            header: [0u8; HEADER_SIZE],
            filled: 0,
            body: Vec::with_capacity(MAX_BODY_SIZE),
            consumed: 0,
            state: ReadState::Header,
            goodbye: false,
        }
    }

    /// Whether the peer's goodbye frame has been received
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.goodbye
    }

    /// Stop reading: buffered plaintext is dropped and every later read
    /// fails with `NotConnected` without touching the transport.
    pub(crate) fn close(&mut self) {
        self.state = ReadState::Closed;
        self.body.clear();
        self.consumed = 0;
    }

    /// Underlying transport
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Unwrap the transport, discarding any buffered plaintext.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fail(&mut self, err: io::Error) -> io::Error {
        tracing::debug!("box stream reader failed: {}", err);
        self.state = ReadState::Failed;
        self.body.clear();
        self.consumed = 0;
        err
    }
}

fn poll_fill<R: AsyncRead + Unpin>(
    inner: &mut R,
    cx: &mut Context<'_>,
    dst: &mut [u8],
    filled: &mut usize,
) -> Poll<io::Result<()>> {
    while *filled < dst.len() {
        let mut buf = ReadBuf::new(&mut dst[*filled..]);
        ready!(Pin::new(&mut *inner).poll_read(cx, &mut buf))?;
        let n = buf.filled().len();
        if n == 0 {
            let msg = if *filled == 0 {
                "transport closed without goodbye"
            } else {
                "transport closed inside a frame"
            };
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::UnexpectedEof, msg)));
        }
        *filled += n;
    }
    Poll::Ready(Ok(()))
}

impl<R: AsyncRead + Unpin> AsyncRead for BoxReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        loop {
            match this.state {
                ReadState::Header if this.consumed < this.body.len() => {
                    let available = &this.body[this.consumed..];
                    let n = available.len().min(buf.remaining());
                    buf.put_slice(&available[..n]);
                    this.consumed += n;
                    return Poll::Ready(Ok(()));
                }
                ReadState::Header => {
                    if let Err(err) =
                        ready!(poll_fill(&mut this.inner, cx, &mut this.header, &mut this.filled))
                    {
                        return Poll::Ready(Err(this.fail(err)));
                    }
                    this.filled = 0;

                    match this.decoder.open_header(&this.header) {
                        Ok(FrameHeader::Goodbye) => {
                            tracing::trace!("received goodbye");
                            this.state = ReadState::Finished;
                            this.goodbye = true;
                        }
                        Ok(FrameHeader::Body { len, tag }) => {
                            this.body.clear();
                            this.body.resize(len, 0);
                            this.consumed = 0;
                            this.state = ReadState::Body { len, tag };
                        }
                        Err(err) => return Poll::Ready(Err(this.fail(err.into()))),
                    }
                }
                ReadState::Body { len, tag } => {
                    if let Err(err) =
                        ready!(poll_fill(&mut this.inner, cx, &mut this.body[..len], &mut this.filled))
                    {
                        return Poll::Ready(Err(this.fail(err)));
                    }
                    this.filled = 0;

                    if let Err(err) = this.decoder.open_body(&mut this.body, &tag) {
                        return Poll::Ready(Err(this.fail(err.into())));
                    }
                    this.state = ReadState::Header;
                }
                ReadState::Finished => return Poll::Ready(Ok(())),
                ReadState::Closed => {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::NotConnected,
                        "box stream reader is closed",
                    )));
                }
                ReadState::Failed => {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "box stream reader failed",
                    )));
                }
            }
        }
    }
}
