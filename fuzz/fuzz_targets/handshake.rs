//! Fuzz target for handshake message processing
//!
//! Feeds arbitrary hello and auth messages to a server and arbitrary
//! hello and accept messages to a client.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rand_core::OsRng;
use secretstream_core::{ACCEPT_SIZE, AUTH_SIZE, AppKey, HELLO_SIZE, Handshake, Identity};

#[derive(Debug, Arbitrary)]
struct Input {
    app_key: [u8; 32],
    hello: [u8; HELLO_SIZE],
    auth: Vec<u8>,
    accept: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let app_key = AppKey::new(input.app_key);
    let server = Identity::from_seed(&[1u8; 32]);
    let client = Identity::from_seed(&[2u8; 32]);

    let mut responder = Handshake::new_server(&server, &app_key, &mut OsRng);
    if responder.read_hello(&input.hello).is_ok() && responder.create_hello().is_ok() {
        if let Ok(auth) = <[u8; AUTH_SIZE]>::try_from(input.auth.as_slice()) {
            let _ = responder.read_auth(&auth);
        }
    }

    let mut initiator = Handshake::new_client(&client, &app_key, server.public_key(), &mut OsRng);
    let _ = initiator.create_hello();
    if initiator.read_hello(&input.hello).is_ok() && initiator.create_auth().is_ok() {
        if let Ok(accept) = <[u8; ACCEPT_SIZE]>::try_from(input.accept.as_slice()) {
            let _ = initiator.read_accept(&accept);
        }
    }
});
