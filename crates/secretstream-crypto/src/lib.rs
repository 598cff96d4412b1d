//! # secretstream crypto
//!
//! Cryptographic primitives for the secret handshake and the box stream.
//!
//! This crate provides:
//! - X25519 Diffie-Hellman for ephemeral and long-term key agreement
//! - Ed25519 identities, including conversion to X25519 for key agreement
//! - `XChaCha20-Poly1305` AEAD with detached tags for framing
//! - BLAKE3 hashing and keyed MACs
//! - Constant-time comparison helpers
//!
//! ## Cryptographic Suite
//!
//! | Function | Algorithm | Size |
//! |----------|-----------|------|
//! | Key Exchange | X25519 | 32-byte keys |
//! | Identity | Ed25519 | 32-byte keys, 64-byte signatures |
//! | AEAD | XChaCha20-Poly1305 | 32-byte key, 24-byte nonce, 16-byte tag |
//! | Hash | BLAKE3 | 32 bytes |
//! | MAC | keyed BLAKE3 | 32 bytes |

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod aead;
pub mod constant_time;
pub mod error;
pub mod hash;
pub mod signatures;
pub mod x25519;

pub use error::CryptoError;

/// X25519 public key size
pub const X25519_PUBLIC_KEY_SIZE: usize = 32;

/// XChaCha20-Poly1305 key size
pub const XCHACHA_KEY_SIZE: usize = 32;

/// XChaCha20-Poly1305 nonce size
pub const XCHACHA_NONCE_SIZE: usize = 24;

/// BLAKE3 output size
pub const BLAKE3_OUTPUT_SIZE: usize = 32;

/// Ed25519 public key size
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 secret key size
pub const ED25519_SECRET_KEY_SIZE: usize = 32;

/// Ed25519 signature size
pub const ED25519_SIGNATURE_SIZE: usize = 64;
