//! Printable peer addresses.
//!
//! A verified peer is named by its Ed25519 public key, rendered as
//! `@<standard base64>.ed25519`.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secretstream_crypto::signatures::VerifyingKey;
use std::fmt;
use std::str::FromStr;

/// Network name of secret-handshake box streams
pub const NETWORK: &str = "shs-bs";

const PREFIX: &str = "@";
const SUFFIX: &str = ".ed25519";

/// Public-key address of a connection endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerAddr {
    public_key: VerifyingKey,
}

impl PeerAddr {
    /// Address for the given public key.
    #[must_use]
    pub fn new(public_key: VerifyingKey) -> Self {
        Self { public_key }
    }

    /// Public key named by this address.
    #[must_use]
    pub fn public_key(&self) -> &VerifyingKey {
        &self.public_key
    }

    /// Network identifier, always [`NETWORK`].
    #[must_use]
    pub fn network(&self) -> &'static str {
        NETWORK
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PREFIX}{}{SUFFIX}",
            STANDARD.encode(self.public_key.as_bytes())
        )
    }
}

impl FromStr for PeerAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let encoded = s
            .strip_prefix(PREFIX)
            .and_then(|rest| rest.strip_suffix(SUFFIX))
            .ok_or_else(|| Error::InvalidKey(format!("malformed peer address: {s}").into()))?;

        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| Error::InvalidKey(format!("peer address is not base64: {e}").into()))?;

        Ok(Self::new(VerifyingKey::from_slice(&bytes)?))
    }
}

impl From<VerifyingKey> for PeerAddr {
    fn from(public_key: VerifyingKey) -> Self {
        Self::new(public_key)
    }
}
