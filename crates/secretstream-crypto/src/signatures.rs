//! Ed25519 long-term identities.
//!
//! A party's identity is an Ed25519 keypair. Besides signing, the handshake
//! performs Diffie-Hellman against identity keys, so both halves can be
//! converted to their X25519 (Montgomery) form:
//!
//! - [`SigningKey::to_x25519`] uses the clamped scalar from the expanded
//!   secret key
//! - [`VerifyingKey::to_x25519`] maps the Edwards point to its Montgomery
//!   u-coordinate
//!
//! `sk.to_x25519().public_key() == sk.verifying_key().to_x25519()` always holds.
//!
//! ## Usage
//!
//! ```ignore
//! use secretstream_crypto::signatures::SigningKey;
//! use rand_core::OsRng;
//!
//! let signing_key = SigningKey::generate(&mut OsRng);
//! let signature = signing_key.sign(b"transcript");
//! assert!(signing_key.verifying_key().verify(b"transcript", &signature).is_ok());
//! ```

use crate::CryptoError;
use crate::x25519;
use ed25519_dalek::Signer;
use rand_core::{CryptoRng, RngCore};
use zeroize::{ZeroizeOnDrop, Zeroizing};

/// Ed25519 signature (64 bytes)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Signature {
    /// Create a signature from raw bytes
    #[must_use]
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Create a signature from a slice
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidSignature`] if the slice is not exactly 64 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 64] = slice
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature)?;
        Ok(Self(bytes))
    }

    /// Get the raw signature bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    fn to_dalek(self) -> ed25519_dalek::Signature {
        ed25519_dalek::Signature::from_bytes(&self.0)
    }
}

/// Ed25519 signing key (private key)
///
/// Zeroized on drop.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SigningKey {
    inner: ed25519_dalek::SigningKey,
}

impl SigningKey {
    /// Generate a new random signing key
    #[must_use]
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self {
            inner: ed25519_dalek::SigningKey::generate(rng),
        }
    }

    /// Create from raw 32-byte seed
    #[must_use]
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            inner: ed25519_dalek::SigningKey::from_bytes(bytes),
        }
    }

    /// Sign a message. Signing is deterministic.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.inner.sign(message);
        Signature(sig.to_bytes())
    }

    /// Get the corresponding verifying key (public key)
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey {
            inner: self.inner.verifying_key(),
        }
    }

    /// Export the 32-byte seed.
    ///
    /// # Security
    ///
    /// This exposes the raw secret key bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes()
    }

    /// Convert to the X25519 private key sharing this key's scalar.
    #[must_use]
    pub fn to_x25519(&self) -> x25519::PrivateKey {
        let scalar = Zeroizing::new(self.inner.to_scalar_bytes());
        x25519::PrivateKey::from_bytes(*scalar)
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("verifying_key", &self.verifying_key())
            .finish_non_exhaustive()
    }
}

/// Ed25519 verifying key (public key)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VerifyingKey {
    inner: ed25519_dalek::VerifyingKey,
}

impl VerifyingKey {
    /// Create from raw 32-byte public key
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidPublicKey`] if the bytes do not
    /// represent a valid Ed25519 point, or the point has small order.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let inner = ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        if inner.is_weak() {
            return Err(CryptoError::InvalidPublicKey);
        }
        Ok(Self { inner })
    }

    /// Create from a slice
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] for slices other than 32
    /// bytes, otherwise as [`VerifyingKey::from_bytes`].
    pub fn from_slice(slice: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: 32,
            actual: slice.len(),
        })?;
        Self::from_bytes(&bytes)
    }

    /// Get the raw public key bytes
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes()
    }

    /// Borrow the raw public key bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.inner.as_bytes()
    }

    /// Convert to the birationally equivalent X25519 public key.
    #[must_use]
    pub fn to_x25519(&self) -> x25519::PublicKey {
        x25519::PublicKey::from_bytes(self.inner.to_montgomery().to_bytes())
    }

    /// Verify a signature on a message (strict verification).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidSignature`] if the signature is invalid,
    /// malformed, or does not authenticate the message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        self.inner
            .verify_strict(message, &signature.to_dalek())
            .map_err(|_| CryptoError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    #[test]
    fn test_sign_verify_roundtrip() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();

        let message = b"authenticate this message";
        let signature = signing_key.sign(message);

        assert!(verifying_key.verify(message, &signature).is_ok());
    }

    #[test]
    fn test_wrong_message_fails_verification() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();

        let signature = signing_key.sign(b"original message");

        assert_eq!(
            verifying_key.verify(b"tampered message", &signature),
            Err(CryptoError::InvalidSignature)
        );
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let signing_key1 = SigningKey::generate(&mut OsRng);
        let verifying_key2 = SigningKey::generate(&mut OsRng).verifying_key();

        let signature = signing_key1.sign(b"test");

        assert!(verifying_key2.verify(b"test", &signature).is_err());
    }

    #[test]
    fn test_tampered_signature_fails() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();

        let message = b"test message";
        let signature = signing_key.sign(message);

        let mut tampered_bytes = *signature.as_bytes();
        tampered_bytes[0] ^= 0xFF;
        let tampered_sig = Signature::from_bytes(tampered_bytes);

        assert!(verifying_key.verify(message, &tampered_sig).is_err());
    }

    #[test]
    fn test_signature_from_slice_wrong_size() {
        assert!(Signature::from_slice(&[0u8; 32]).is_err());
        assert!(Signature::from_slice(&[0u8; 128]).is_err());
    }

    #[test]
    fn test_verifying_key_from_slice() {
        let verifying_key = SigningKey::generate(&mut OsRng).verifying_key();

        let recovered = VerifyingKey::from_slice(verifying_key.as_bytes()).unwrap();
        assert_eq!(verifying_key, recovered);

        assert_eq!(
            VerifyingKey::from_slice(&[1u8; 31]),
            Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 31
            })
        );
    }

    #[test]
    fn test_weak_verifying_key_rejected() {
        // The identity point encodes as y = 1
        let mut identity = [0u8; 32];
        identity[0] = 1;
        assert_eq!(
            VerifyingKey::from_bytes(&identity),
            Err(CryptoError::InvalidPublicKey)
        );
    }

    #[test]
    fn test_signing_key_from_bytes_roundtrip() {
        let original = SigningKey::generate(&mut OsRng);
        let recovered = SigningKey::from_bytes(&original.to_bytes());

        assert_eq!(original.sign(b"test message"), recovered.sign(b"test message"));
    }

    #[test]
    fn test_x25519_conversion_matches() {
        let signing_key = SigningKey::generate(&mut OsRng);

        let from_secret = signing_key.to_x25519().public_key();
        let from_public = signing_key.verifying_key().to_x25519();

        assert_eq!(from_secret, from_public);
    }

    #[test]
    fn test_x25519_conversion_agrees_on_shared_secret() {
        let alice = SigningKey::generate(&mut OsRng);
        let bob = SigningKey::generate(&mut OsRng);

        let ab = alice
            .to_x25519()
            .exchange(&bob.verifying_key().to_x25519())
            .unwrap();
        let ba = bob
            .to_x25519()
            .exchange(&alice.verifying_key().to_x25519())
            .unwrap();

        assert_eq!(ab.as_bytes(), ba.as_bytes());
    }

    #[test]
    fn test_debug_does_not_leak_seed() {
        let signing_key = SigningKey::from_bytes(&[0x11; 32]);
        let rendered = format!("{signing_key:?}");

        assert!(!rendered.contains("17, 17, 17"));
        assert!(rendered.contains("verifying_key"));
    }
}
