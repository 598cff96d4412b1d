//! Error types for the handshake, the box stream and connections.
//!
//! Every variant is fatal for the attempt or stream that produced it. Nothing
//! in this crate retries; recovering means a new transport and a new
//! handshake with fresh ephemeral keys.
//!
//! # Error Categories
//!
//! - **NetworkIsolation**: the peer's Hello was not authenticated with our app key
//! - **Authentication**: identity proof (Authenticate/Accept) did not verify
//! - **Transport**: I/O failure of the underlying byte stream
//! - **FrameIntegrity**: a box stream header or body failed authentication
//! - **ProtocolViolation**: malformed length, bad termination frame, truncated
//!   frame or an out-of-order handshake step

use secretstream_crypto::CryptoError;
use std::borrow::Cow;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by secretstream operations
#[derive(Debug, Error)]
pub enum Error {
    /// Hello authenticator did not verify under the local app key
    #[error("network isolation failure: peer does not share the app key")]
    NetworkIsolation,

    /// Signature or decryption failure in the Authenticate or Accept step
    #[error("authentication failure: {0}")]
    Authentication(Cow<'static, str>),

    /// Underlying transport failed
    #[error("transport failure: {0}")]
    Transport(#[from] io::Error),

    /// Box stream header or body failed authentication
    #[error("frame integrity failure")]
    FrameIntegrity,

    /// Malformed frame or unexpected handshake step
    #[error("protocol violation: {0}")]
    ProtocolViolation(Cow<'static, str>),

    /// Handshake did not complete within the configured deadline
    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),

    /// Key material could not be parsed
    #[error("invalid key: {0}")]
    InvalidKey(Cow<'static, str>),

    /// Cryptographic primitive failed
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Result type alias for secretstream operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Recover an [`Error`] that was surfaced through an `std::io::Error`
    /// by the `AsyncRead`/`AsyncWrite` implementations.
    ///
    /// Plain I/O errors become [`Error::Transport`].
    #[must_use]
    pub fn from_io(err: io::Error) -> Self {
        let wraps_ours = err.get_ref().is_some_and(|inner| inner.is::<Error>());
        if !wraps_ours {
            return Error::Transport(err);
        }

        match err.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(inner)) => *inner,
            _ => Error::ProtocolViolation("unrecognized wrapped error".into()),
        }
    }

    /// Whether this error came from peer authentication rather than I/O or framing.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::NetworkIsolation | Error::Authentication(_))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match err {
            Error::Transport(inner) => return inner,
            Error::NetworkIsolation | Error::Authentication(_) => io::ErrorKind::PermissionDenied,
            Error::Timeout(_) => io::ErrorKind::TimedOut,
            Error::InvalidKey(_) => io::ErrorKind::InvalidInput,
            Error::FrameIntegrity | Error::ProtocolViolation(_) | Error::Crypto(_) => {
                io::ErrorKind::InvalidData
            }
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_roundtrip_preserves_variant() {
        let io_err: io::Error = Error::FrameIntegrity.into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
        assert!(matches!(Error::from_io(io_err), Error::FrameIntegrity));

        let io_err: io::Error = Error::NetworkIsolation.into();
        assert_eq!(io_err.kind(), io::ErrorKind::PermissionDenied);
        assert!(matches!(Error::from_io(io_err), Error::NetworkIsolation));
    }

    #[test]
    fn test_transport_error_unwraps() {
        let original = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let io_err: io::Error = Error::Transport(original).into();

        assert_eq!(io_err.kind(), io::ErrorKind::ConnectionReset);
        assert!(matches!(Error::from_io(io_err), Error::Transport(_)));
    }

    #[test]
    fn test_is_authentication() {
        assert!(Error::NetworkIsolation.is_authentication());
        assert!(Error::Authentication("bad signature".into()).is_authentication());
        assert!(!Error::FrameIntegrity.is_authentication());
    }
}
