//! `XChaCha20-Poly1305` AEAD encryption.
//!
//! Provides authenticated encryption using `XChaCha20-Poly1305`:
//! - 256-bit keys
//! - 192-bit nonces
//! - 128-bit authentication tags
//! - Combined (`ciphertext || tag`) and detached in-place modes
//!
//! The handshake uses the combined mode with single-use keys and the zero
//! nonce. The box stream uses the detached mode so the body tag can travel
//! inside the encrypted frame header.
//!
//! ## Usage
//!
//! ```ignore
//! use secretstream_crypto::aead::{AeadKey, Nonce};
//!
//! let key = AeadKey::new([7u8; 32]);
//! let nonce = Nonce::default();
//!
//! let ciphertext = key.encrypt(&nonce, b"secret", b"")?;
//! let plaintext = key.decrypt(&nonce, &ciphertext, b"")?;
//! ```

use crate::CryptoError;
use chacha20poly1305::{
    XChaCha20Poly1305,
    aead::{Aead, AeadInPlace, KeyInit},
};
use zeroize::ZeroizeOnDrop;

/// Authentication tag size (16 bytes / 128 bits).
pub const TAG_SIZE: usize = 16;

/// XChaCha20-Poly1305 nonce size (24 bytes / 192 bits).
pub const NONCE_SIZE: usize = 24;

/// AEAD key size (32 bytes / 256 bits).
pub const KEY_SIZE: usize = 32;

/// XChaCha20-Poly1305 nonce (24 bytes).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Create a nonce from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create a nonce from the leading [`NONCE_SIZE`] bytes of `slice`.
    ///
    /// Returns `None` if the slice is shorter than a nonce.
    #[must_use]
    pub fn from_prefix(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; NONCE_SIZE] = slice.get(..NONCE_SIZE)?.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Get raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    /// Get mutable raw bytes.
    pub fn as_bytes_mut(&mut self) -> &mut [u8; NONCE_SIZE] {
        &mut self.0
    }

    fn as_generic(&self) -> &chacha20poly1305::XNonce {
        chacha20poly1305::XNonce::from_slice(&self.0)
    }
}

/// Authentication tag (16 bytes).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tag([u8; TAG_SIZE]);

impl Tag {
    /// Create a tag from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; TAG_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from slice.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; TAG_SIZE] = slice.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Get raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; TAG_SIZE] {
        &self.0
    }
}

/// AEAD encryption key (32 bytes).
///
/// Key is zeroized on drop.
#[derive(Clone, ZeroizeOnDrop)]
pub struct AeadKey([u8; KEY_SIZE]);

impl AeadKey {
    /// Create a key from raw bytes.
    #[must_use]
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get raw key bytes.
    ///
    /// # Security
    ///
    /// Exposes the raw key material.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new((&self.0).into())
    }

    /// Encrypt plaintext with associated data.
    ///
    /// Returns ciphertext with appended authentication tag (`plaintext.len()` + 16 bytes).
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::EncryptionFailed` if AEAD encryption fails.
    pub fn encrypt(
        &self,
        nonce: &Nonce,
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        self.cipher()
            .encrypt(
                nonce.as_generic(),
                chacha20poly1305::aead::Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::EncryptionFailed)
    }

    /// Decrypt ciphertext with associated data.
    ///
    /// Input must include the authentication tag at the end.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::DecryptionFailed` on authentication failure.
    pub fn decrypt(
        &self,
        nonce: &Nonce,
        ciphertext_and_tag: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if ciphertext_and_tag.len() < TAG_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }

        self.cipher()
            .decrypt(
                nonce.as_generic(),
                chacha20poly1305::aead::Payload {
                    msg: ciphertext_and_tag,
                    aad,
                },
            )
            .map_err(|_| CryptoError::DecryptionFailed)
    }

    /// Encrypt in-place, returning the detached authentication tag.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::EncryptionFailed` if AEAD encryption fails.
    pub fn encrypt_in_place(
        &self,
        nonce: &Nonce,
        buffer: &mut [u8],
        aad: &[u8],
    ) -> Result<Tag, CryptoError> {
        let tag = self
            .cipher()
            .encrypt_in_place_detached(nonce.as_generic(), aad, buffer)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut tag_bytes = [0u8; TAG_SIZE];
        tag_bytes.copy_from_slice(&tag);
        Ok(Tag(tag_bytes))
    }

    /// Decrypt in-place, verifying the detached authentication tag.
    ///
    /// On failure the buffer is left as ciphertext.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::DecryptionFailed` on authentication failure.
    pub fn decrypt_in_place(
        &self,
        nonce: &Nonce,
        buffer: &mut [u8],
        tag: &Tag,
        aad: &[u8],
    ) -> Result<(), CryptoError> {
        self.cipher()
            .decrypt_in_place_detached(
                nonce.as_generic(),
                aad,
                buffer,
                chacha20poly1305::Tag::from_slice(&tag.0),
            )
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

impl std::fmt::Debug for AeadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AeadKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> AeadKey {
        AeadKey::new([0x42; KEY_SIZE])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();
        let nonce = Nonce::from_bytes([7u8; NONCE_SIZE]);

        let ciphertext = key.encrypt(&nonce, b"hello box", b"aad").unwrap();
        assert_eq!(ciphertext.len(), b"hello box".len() + TAG_SIZE);

        let plaintext = key.decrypt(&nonce, &ciphertext, b"aad").unwrap();
        assert_eq!(plaintext, b"hello box");
    }

    #[test]
    fn test_wrong_nonce_fails() {
        let key = test_key();
        let ciphertext = key.encrypt(&Nonce::default(), b"data", b"").unwrap();

        let other = Nonce::from_bytes([1u8; NONCE_SIZE]);
        assert_eq!(
            key.decrypt(&other, &ciphertext, b""),
            Err(CryptoError::DecryptionFailed)
        );
    }

    #[test]
    fn test_short_ciphertext_fails() {
        let key = test_key();
        assert!(key.decrypt(&Nonce::default(), &[0u8; TAG_SIZE - 1], b"").is_err());
    }

    #[test]
    fn test_detached_roundtrip() {
        let key = test_key();
        let nonce = Nonce::from_bytes([9u8; NONCE_SIZE]);

        let mut buffer = b"detached body".to_vec();
        let tag = key.encrypt_in_place(&nonce, &mut buffer, b"").unwrap();
        assert_ne!(&buffer[..], b"detached body");

        key.decrypt_in_place(&nonce, &mut buffer, &tag, b"").unwrap();
        assert_eq!(&buffer[..], b"detached body");
    }

    #[test]
    fn test_detached_matches_combined() {
        let key = test_key();
        let nonce = Nonce::from_bytes([3u8; NONCE_SIZE]);

        let combined = key.encrypt(&nonce, b"same bytes", b"").unwrap();

        let mut buffer = b"same bytes".to_vec();
        let tag = key.encrypt_in_place(&nonce, &mut buffer, b"").unwrap();

        assert_eq!(&combined[..buffer.len()], &buffer[..]);
        assert_eq!(&combined[buffer.len()..], tag.as_bytes());
    }

    #[test]
    fn test_detached_tampered_tag_fails() {
        let key = test_key();
        let nonce = Nonce::default();

        let mut buffer = b"body".to_vec();
        let tag = key.encrypt_in_place(&nonce, &mut buffer, b"").unwrap();

        let mut bad = *tag.as_bytes();
        bad[15] ^= 0x01;
        assert!(
            key.decrypt_in_place(&nonce, &mut buffer, &Tag::from_bytes(bad), b"")
                .is_err()
        );
    }

    #[test]
    fn test_nonce_from_prefix() {
        let bytes = [5u8; 32];
        assert_eq!(
            Nonce::from_prefix(&bytes),
            Some(Nonce::from_bytes([5u8; NONCE_SIZE]))
        );
        assert_eq!(Nonce::from_prefix(&bytes[..10]), None);
    }

    #[test]
    fn test_key_debug_is_redacted() {
        assert_eq!(format!("{:?}", test_key()), "AeadKey(..)");
    }
}
