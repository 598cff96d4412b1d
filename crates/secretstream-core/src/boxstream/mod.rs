//! Box stream framing.
//!
//! After the handshake each direction is an independent sequence of sealed
//! frames keyed by that direction's [`DirectionKeys`]:
//!
//! ```text
//! +--------------------------------------+----------------------+
//! | sealed header (34 bytes)             | sealed body (len)    |
//! |  Box_n( len: u16 BE || body tag 16 ) |  Box_n+1( payload )  |
//! +--------------------------------------+----------------------+
//! ```
//!
//! The header's 18-byte plaintext carries the body length and the body's
//! detached tag; its own tag is appended. A header whose plaintext is all
//! zeros is the goodbye frame and ends the direction; it consumes a single
//! nonce. Bodies are 1..=4096 bytes, so writes larger than that are split.
//!
//! [`BoxEncoder`] and [`BoxDecoder`] are the synchronous codec; [`BoxWriter`]
//! and [`BoxReader`] run it over tokio byte streams.

mod reader;
mod writer;

pub use reader::BoxReader;
pub use writer::BoxWriter;

use crate::error::{Error, Result};
use crate::handshake::DirectionKeys;
use crate::nonce::NonceSequence;
use secretstream_crypto::aead::{AeadKey, TAG_SIZE, Tag};
use secretstream_crypto::constant_time::is_all_zero;

/// Maximum body size of one frame
pub const MAX_BODY_SIZE: usize = 4096;

/// Plaintext header size (length + body tag)
pub const HEADER_PLAINTEXT_SIZE: usize = 2 + TAG_SIZE;

/// Sealed header size on the wire
pub const HEADER_SIZE: usize = HEADER_PLAINTEXT_SIZE + TAG_SIZE;

/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameHeader {
    /// A body of `len` bytes follows, authenticated by `tag`
    Body {
        /// Body length, 1..=[`MAX_BODY_SIZE`]
        len: usize,
        /// Detached body tag
        tag: Tag,
    },
    /// The peer closed this direction
    Goodbye,
}

/// Seals outgoing frames for one direction.
#[derive(Debug)]
pub struct BoxEncoder {
    key: AeadKey,
    nonces: NonceSequence,
}

impl BoxEncoder {
    /// Create an encoder from the send half of the session keys.
    #[must_use]
    pub fn new(keys: DirectionKeys) -> Self {
        Self {
            key: keys.key,
            nonces: NonceSequence::new(keys.nonce),
        }
    }

    /// Append one sealed frame carrying `body` to `out`.
    ///
    /// # Errors
    ///
    /// [`Error::ProtocolViolation`] if `body` is empty or longer than
    /// [`MAX_BODY_SIZE`].
    pub fn seal_frame(&mut self, body: &[u8], out: &mut Vec<u8>) -> Result<()> {
        if body.is_empty() || body.len() > MAX_BODY_SIZE {
            return Err(Error::ProtocolViolation(
                format!("frame body must be 1..={MAX_BODY_SIZE} bytes, got {}", body.len()).into(),
            ));
        }

        let header_nonce = self.nonces.advance();
        let body_nonce = self.nonces.advance();

        let start = out.len();
        out.resize(start + HEADER_SIZE, 0);
        out.extend_from_slice(body);

        let (header, sealed_body) = out[start..].split_at_mut(HEADER_SIZE);
        let body_tag = self.key.encrypt_in_place(&body_nonce, sealed_body, b"")?;

        #[allow(clippy::cast_possible_truncation)] // bounded by MAX_BODY_SIZE
        let len = body.len() as u16;
        header[..2].copy_from_slice(&len.to_be_bytes());
        header[2..HEADER_PLAINTEXT_SIZE].copy_from_slice(body_tag.as_bytes());

        let header_tag =
            self.key
                .encrypt_in_place(&header_nonce, &mut header[..HEADER_PLAINTEXT_SIZE], b"")?;
        header[HEADER_PLAINTEXT_SIZE..].copy_from_slice(header_tag.as_bytes());
        Ok(())
    }

    /// Append the sealed goodbye frame to `out`.
    ///
    /// # Errors
    ///
    /// [`Error::Crypto`] if sealing fails.
    pub fn seal_goodbye(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let nonce = self.nonces.advance();
        let start = out.len();
        out.resize(start + HEADER_SIZE, 0);

        let header = &mut out[start..];
        let tag = self
            .key
            .encrypt_in_place(&nonce, &mut header[..HEADER_PLAINTEXT_SIZE], b"")?;
        header[HEADER_PLAINTEXT_SIZE..].copy_from_slice(tag.as_bytes());
        Ok(())
    }

    /// Seal `data` as a run of frames of at most [`MAX_BODY_SIZE`] bytes.
    ///
    /// Empty input produces no frames.
    ///
    /// # Errors
    ///
    /// [`Error::Crypto`] if sealing fails.
    pub fn encode(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<()> {
        for chunk in data.chunks(MAX_BODY_SIZE) {
            self.seal_frame(chunk, out)?;
        }
        Ok(())
    }
}

/// Opens incoming frames for one direction.
#[derive(Debug)]
pub struct BoxDecoder {
    key: AeadKey,
    nonces: NonceSequence,
}

/// Everything recovered from a complete wire image by [`BoxDecoder::decode_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Concatenated bodies
    pub plaintext: Vec<u8>,
    /// Whether a goodbye frame was seen
    pub terminated: bool,
}

impl BoxDecoder {
    /// Create a decoder from the receive half of the session keys.
    #[must_use]
    pub fn new(keys: DirectionKeys) -> Self {
        Self {
            key: keys.key,
            nonces: NonceSequence::new(keys.nonce),
        }
    }

    /// Open a sealed header.
    ///
    /// # Errors
    ///
    /// [`Error::FrameIntegrity`] if the header does not authenticate, or
    /// [`Error::ProtocolViolation`] for a length of zero with a non-zero tag
    /// or a length above [`MAX_BODY_SIZE`].
    pub fn open_header(&mut self, sealed: &[u8; HEADER_SIZE]) -> Result<FrameHeader> {
        let nonce = self.nonces.advance();

        let mut plain = [0u8; HEADER_PLAINTEXT_SIZE];
        plain.copy_from_slice(&sealed[..HEADER_PLAINTEXT_SIZE]);
        let tag = Tag::from_slice(&sealed[HEADER_PLAINTEXT_SIZE..]).ok_or(Error::FrameIntegrity)?;
        self.key
            .decrypt_in_place(&nonce, &mut plain, &tag, b"")
            .map_err(|_| Error::FrameIntegrity)?;

        if is_all_zero(&plain) {
            return Ok(FrameHeader::Goodbye);
        }

        let len = usize::from(u16::from_be_bytes([plain[0], plain[1]]));
        if len == 0 {
            return Err(Error::ProtocolViolation(
                "zero-length frame with non-zero tag".into(),
            ));
        }
        if len > MAX_BODY_SIZE {
            return Err(Error::ProtocolViolation(
                format!("frame length {len} exceeds {MAX_BODY_SIZE}").into(),
            ));
        }

        let tag = Tag::from_slice(&plain[2..]).ok_or(Error::FrameIntegrity)?;
        Ok(FrameHeader::Body { len, tag })
    }

    /// Open a body in place using the tag from its header.
    ///
    /// # Errors
    ///
    /// [`Error::FrameIntegrity`] if the body does not authenticate.
    pub fn open_body(&mut self, body: &mut [u8], tag: &Tag) -> Result<()> {
        let nonce = self.nonces.advance();
        self.key
            .decrypt_in_place(&nonce, body, tag, b"")
            .map_err(|_| Error::FrameIntegrity)
    }

    /// Decode a complete wire image.
    ///
    /// Stops at the goodbye frame; anything after it is ignored.
    ///
    /// # Errors
    ///
    /// [`Error::FrameIntegrity`] on tampering and
    /// [`Error::ProtocolViolation`] if the image ends inside a frame.
    pub fn decode_all(&mut self, mut wire: &[u8]) -> Result<Decoded> {
        let mut plaintext = Vec::with_capacity(wire.len());

        while !wire.is_empty() {
            let (header, rest) = wire
                .split_first_chunk::<HEADER_SIZE>()
                .ok_or_else(|| truncated("header"))?;

            match self.open_header(header)? {
                FrameHeader::Goodbye => {
                    return Ok(Decoded {
                        plaintext,
                        terminated: true,
                    });
                }
                FrameHeader::Body { len, tag } => {
                    if rest.len() < len {
                        return Err(truncated("body"));
                    }
                    let start = plaintext.len();
                    plaintext.extend_from_slice(&rest[..len]);
                    self.open_body(&mut plaintext[start..], &tag)?;
                    wire = &rest[len..];
                }
            }
        }

        Ok(Decoded {
            plaintext,
            terminated: false,
        })
    }
}

fn truncated(part: &str) -> Error {
    Error::ProtocolViolation(format!("stream ended inside a frame {part}").into())
}
