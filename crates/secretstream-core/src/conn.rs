//! Authenticated, encrypted connections.
//!
//! A [`Connection`] is a transport that completed the secret handshake,
//! wrapped in a box stream in each direction. It is itself a tokio byte
//! stream: reads yield the peer's plaintext, writes are sealed before they
//! reach the transport.

use crate::addr::PeerAddr;
use crate::boxstream::{BoxReader, BoxWriter};
use crate::config::DEFAULT_WRITE_BUFFER_SIZE;
use crate::error::{Error, Result};
use crate::handshake::SessionKeys;
use secretstream_crypto::signatures::VerifyingKey;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf, ReadHalf, WriteHalf};

/// Encrypted duplex connection to a verified peer.
///
/// Reading and writing are independent: a task may read while another
/// writes after [`Connection::into_split`]. Reads end once the peer's goodbye
/// arrives. [`Connection::close`] closes both directions; the split halves
/// can be closed one at a time.
#[derive(Debug)]
pub struct Connection<T> {
    reader: BoxReader<ReadHalf<T>>,
    writer: BoxWriter<WriteHalf<T>>,
    local: VerifyingKey,
    remote: VerifyingKey,
}

impl<T: AsyncRead + AsyncWrite> Connection<T> {
    /// Wrap a transport that has just completed a handshake producing `keys`.
    pub fn new(transport: T, keys: SessionKeys) -> Self {
        Self::with_write_buffer(transport, keys, DEFAULT_WRITE_BUFFER_SIZE)
    }

    /// Like [`Connection::new`] with an explicit writer backpressure threshold.
    pub fn with_write_buffer(transport: T, keys: SessionKeys, write_buffer_size: usize) -> Self {
        let SessionKeys {
            send,
            recv,
            local_public,
            remote_public,
        } = keys;
        let (read_half, write_half) = tokio::io::split(transport);

        Self {
            reader: BoxReader::new(read_half, recv),
            writer: BoxWriter::with_buffer_limit(write_half, send, write_buffer_size),
            local: local_public,
            remote: remote_public,
        }
    }

    /// Our long-term public key
    #[must_use]
    pub fn local_public_key(&self) -> &VerifyingKey {
        &self.local
    }

    /// The peer's verified long-term public key
    #[must_use]
    pub fn remote_public_key(&self) -> &VerifyingKey {
        &self.remote
    }

    /// Our address
    #[must_use]
    pub fn local_addr(&self) -> PeerAddr {
        PeerAddr::new(self.local)
    }

    /// The peer's address
    #[must_use]
    pub fn remote_addr(&self) -> PeerAddr {
        PeerAddr::new(self.remote)
    }

    /// Whether the peer has closed its sending direction
    #[must_use]
    pub fn is_remote_closed(&self) -> bool {
        self.reader.is_terminated()
    }

    /// Send the goodbye frame, shut the transport down and stop reading.
    ///
    /// Pending writes are flushed first. The transport is shut down even if
    /// the goodbye cannot be delivered; that failure is still returned.
    /// Afterwards writes fail with `BrokenPipe` and reads with `NotConnected`.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] if flushing or shutting down fails.
    pub async fn close(&mut self) -> Result<()> {
        tracing::debug!(peer = %self.remote_addr(), "closing connection");
        let result = self.writer.shutdown().await;
        self.reader.close();
        result.map_err(Error::from_io)
    }

    /// Split into independently owned read and write halves.
    pub fn into_split(self) -> (BoxReader<ReadHalf<T>>, BoxWriter<WriteHalf<T>>) {
        (self.reader, self.writer)
    }
}

impl<T: AsyncRead + AsyncWrite> AsyncRead for Connection<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().reader).poll_read(cx, buf)
    }
}

impl<T: AsyncRead + AsyncWrite> AsyncWrite for Connection<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().writer).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().writer).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().writer).poll_shutdown(cx)
    }
}
