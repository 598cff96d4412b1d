//! # secretstream core
//!
//! Authenticated, encrypted connections between two peers that know each
//! other's long-term public keys and share a network app key.
//!
//! This crate provides:
//! - The secret handshake (mutual authentication, network isolation)
//! - Box stream framing (sealed, length-bounded frames with a goodbye)
//! - Connections, clients and servers over tokio byte streams and TCP
//! - Error types and handling
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Client / Server / Listener                    │
//! │   (dial or accept a transport, enforce the handshake deadline)  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                          Connection                              │
//! │   (verified peer key, independent read and write directions)    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │            Handshake            │           Box stream           │
//! │  (four messages, session keys)  │  (sealed frames per direction) │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod addr;
pub mod boxstream;
pub mod config;
pub mod conn;
pub mod error;
pub mod handshake;
pub mod identity;
pub mod net;
pub mod nonce;

pub use addr::PeerAddr;
pub use boxstream::{BoxDecoder, BoxEncoder, BoxReader, BoxWriter, FrameHeader};
pub use config::Config;
pub use conn::Connection;
pub use error::{Error, Result};
pub use handshake::{
    DirectionKeys, Handshake, HandshakeState, Role, SessionKeys, client_handshake,
    server_handshake,
};
pub use identity::{AppKey, Identity};
pub use net::{Client, Listener, Server};
pub use secretstream_crypto::signatures::VerifyingKey;

/// Hello message size in bytes
pub const HELLO_SIZE: usize = handshake::HELLO_SIZE;

/// Client authenticate message size in bytes
pub const AUTH_SIZE: usize = handshake::AUTH_SIZE;

/// Server accept message size in bytes
pub const ACCEPT_SIZE: usize = handshake::ACCEPT_SIZE;

/// Sealed box stream header size in bytes
pub const BOX_HEADER_SIZE: usize = boxstream::HEADER_SIZE;

/// Largest box stream body in bytes
pub const MAX_BODY_SIZE: usize = boxstream::MAX_BODY_SIZE;
