//! BLAKE3 hashing and keyed MACs.
//!
//! The handshake hashes concatenations of transcript values; [`hash_parts`]
//! feeds them to one hasher so callers never build the concatenated buffer.

use crate::constant_time::verify_32;

/// BLAKE3 hash output (32 bytes).
pub type HashOutput = [u8; 32];

/// Compute BLAKE3 hash of input data.
#[must_use]
pub fn hash(data: &[u8]) -> HashOutput {
    *blake3::hash(data).as_bytes()
}

/// Hash the concatenation of `parts`.
#[must_use]
pub fn hash_parts(parts: &[&[u8]]) -> HashOutput {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Keyed BLAKE3 MAC over `data`.
#[must_use]
pub fn mac(key: &[u8; 32], data: &[u8]) -> HashOutput {
    *blake3::keyed_hash(key, data).as_bytes()
}

/// Verify a keyed BLAKE3 MAC in constant time.
#[must_use]
pub fn verify_mac(key: &[u8; 32], data: &[u8], tag: &[u8; 32]) -> bool {
    verify_32(&mac(key, data), tag)
}
