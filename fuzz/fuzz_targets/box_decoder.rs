//! Fuzz target for box stream decoding
//!
//! Arbitrary wire images under arbitrary keys must be rejected cleanly, never panic.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use secretstream_core::{BoxDecoder, DirectionKeys};
use secretstream_crypto::aead::{AeadKey, Nonce};

#[derive(Debug, Arbitrary)]
struct Input {
    key: [u8; 32],
    nonce: [u8; 24],
    wire: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let keys = DirectionKeys {
        key: AeadKey::new(input.key),
        nonce: Nonce::from_bytes(input.nonce),
    };
    let _ = BoxDecoder::new(keys).decode_all(&input.wire);
});
