//! Long-term identities and the network app key.
//!
//! # Key Types
//!
//! - **Identity**: an Ed25519 keypair naming a party. Its public half is the
//!   peer identifier exchanged (encrypted) during the handshake.
//! - **AppKey**: a 32-byte secret shared out-of-band by every member of one
//!   network. Peers with different app keys cannot complete a handshake and
//!   learn nothing about each other's identity.
//!
//! # Example
//!
//! ```
//! use secretstream_core::identity::{AppKey, Identity};
//!
//! let identity = Identity::generate();
//! let app_key: AppKey = "UjFLJ+aDSwKlaxxLBA3aWfL0pJDbrERwF1MWzQbeD0A=".parse().unwrap();
//! assert_eq!(identity.public_key().to_bytes().len(), 32);
//! assert_eq!(app_key.as_bytes().len(), 32);
//! ```

use crate::addr::PeerAddr;
use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand_core::{CryptoRng, OsRng, RngCore};
use secretstream_crypto::constant_time::ct_eq;
use secretstream_crypto::signatures::{Signature, SigningKey, VerifyingKey};
use secretstream_crypto::x25519;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// App key size in bytes
pub const APP_KEY_SIZE: usize = 32;

/// Network-scoping pre-shared secret.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AppKey([u8; APP_KEY_SIZE]);

impl AppKey {
    /// Wrap raw key bytes.
    #[must_use]
    pub fn new(bytes: [u8; APP_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] if the slice is not 32 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; APP_KEY_SIZE] = slice.try_into().map_err(|_| {
            Error::InvalidKey(
                format!("app key must be {APP_KEY_SIZE} bytes, got {}", slice.len()).into(),
            )
        })?;
        Ok(Self(bytes))
    }

    /// Decode a standard base64 app key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] for invalid base64 or a wrong length.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let mut decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::InvalidKey(format!("app key is not base64: {e}").into()))?;
        let key = Self::from_slice(&decoded);
        decoded.zeroize();
        key
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; APP_KEY_SIZE] {
        &self.0
    }
}

impl FromStr for AppKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base64(s)
    }
}

impl PartialEq for AppKey {
    fn eq(&self, other: &Self) -> bool {
        ct_eq(&self.0, &other.0)
    }
}

impl Eq for AppKey {}

impl std::fmt::Debug for AppKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AppKey(..)")
    }
}

/// Long-term signing identity of one party.
#[derive(Clone, Debug)]
pub struct Identity {
    signing: SigningKey,
}

impl Identity {
    /// Generate a random identity from the OS CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_with(&mut OsRng)
    }

    /// Generate a random identity from the given RNG.
    pub fn generate_with<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self {
            signing: SigningKey::generate(rng),
        }
    }

    /// Restore an identity from its 32-byte Ed25519 seed.
    #[must_use]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed),
        }
    }

    /// Public half, the externally visible identifier.
    #[must_use]
    pub fn public_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// Printable address of this identity.
    #[must_use]
    pub fn addr(&self) -> PeerAddr {
        PeerAddr::new(self.public_key())
    }

    pub(crate) fn sign(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }

    pub(crate) fn to_x25519(&self) -> x25519::PrivateKey {
        self.signing.to_x25519()
    }
}

impl From<SigningKey> for Identity {
    fn from(signing: SigningKey) -> Self {
        Self { signing }
    }
}
