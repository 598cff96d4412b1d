//! Property-based tests for secretstream
//!
//! Uses proptest to verify invariants across large input spaces.

use proptest::prelude::*;

// ============================================================================
// Box Stream Properties
// ============================================================================

mod boxstream_properties {
    use super::*;
    use secretstream_core::{
        BOX_HEADER_SIZE, BoxDecoder, BoxEncoder, DirectionKeys, Error, MAX_BODY_SIZE,
    };
    use secretstream_crypto::aead::{AeadKey, Nonce};

    fn keys(key: [u8; 32], nonce: [u8; 24]) -> (DirectionKeys, DirectionKeys) {
        let make = || DirectionKeys {
            key: AeadKey::new(key),
            nonce: Nonce::from_bytes(nonce),
        };
        (make(), make())
    }

    proptest! {
        /// However the writes are split, the reader sees the same bytes
        #[test]
        fn chunking_preserves_bytes(
            writes in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..6000), 0..8),
            key in any::<[u8; 32]>(),
            nonce in any::<[u8; 24]>(),
        ) {
            let (send, recv) = keys(key, nonce);
            let mut encoder = BoxEncoder::new(send);
            let mut wire = Vec::new();
            for write in &writes {
                encoder.encode(write, &mut wire).unwrap();
            }
            encoder.seal_goodbye(&mut wire).unwrap();

            let decoded = BoxDecoder::new(recv).decode_all(&wire).unwrap();
            prop_assert_eq!(decoded.plaintext, writes.concat());
            prop_assert!(decoded.terminated);
        }

        /// Wire size is determined by the plaintext length alone
        #[test]
        fn wire_size_matches_frame_count(len in 0usize..20_000) {
            let (send, _) = keys([1; 32], [2; 24]);
            let mut encoder = BoxEncoder::new(send);
            let mut wire = Vec::new();
            encoder.encode(&vec![0u8; len], &mut wire).unwrap();

            let frames = len.div_ceil(MAX_BODY_SIZE);
            prop_assert_eq!(wire.len(), len + frames * BOX_HEADER_SIZE);
        }

        /// Flipping any single bit of the wire image is detected
        #[test]
        fn any_bit_flip_is_rejected(
            payload in prop::collection::vec(any::<u8>(), 1..2000),
            position in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let (send, recv) = keys([9; 32], [3; 24]);
            let mut encoder = BoxEncoder::new(send);
            let mut wire = Vec::new();
            encoder.encode(&payload, &mut wire).unwrap();
            encoder.seal_goodbye(&mut wire).unwrap();

            let index = position.index(wire.len());
            wire[index] ^= 1 << bit;

            let result = BoxDecoder::new(recv).decode_all(&wire);
            prop_assert!(matches!(result, Err(Error::FrameIntegrity)));
        }

        /// Different keys never open each other's frames
        #[test]
        fn wrong_key_never_opens(
            key_a in any::<[u8; 32]>(),
            key_b in any::<[u8; 32]>(),
            payload in prop::collection::vec(any::<u8>(), 1..512),
        ) {
            prop_assume!(key_a != key_b);
            let (send, _) = keys(key_a, [0; 24]);
            let (_, recv) = keys(key_b, [0; 24]);

            let mut wire = Vec::new();
            BoxEncoder::new(send).encode(&payload, &mut wire).unwrap();
            prop_assert!(BoxDecoder::new(recv).decode_all(&wire).is_err());
        }
    }
}

// ============================================================================
// Handshake Properties
// ============================================================================

mod handshake_properties {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use secretstream_core::{AppKey, Error, Handshake, Identity};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Peers sharing an app key always agree on mirrored session keys
        #[test]
        fn matching_app_keys_agree(
            app_key in any::<[u8; 32]>(),
            client_seed in any::<[u8; 32]>(),
            server_seed in any::<[u8; 32]>(),
            rng_seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(rng_seed);
            let app_key = AppKey::new(app_key);
            let client = Identity::from_seed(&client_seed);
            let server = Identity::from_seed(&server_seed);

            let mut c = Handshake::new_client(&client, &app_key, server.public_key(), &mut rng);
            let mut s = Handshake::new_server(&server, &app_key, &mut rng);
            s.read_hello(&c.create_hello().unwrap()).unwrap();
            c.read_hello(&s.create_hello().unwrap()).unwrap();
            s.read_auth(&c.create_auth().unwrap()).unwrap();
            c.read_accept(&s.create_accept().unwrap()).unwrap();

            let ck = c.into_session_keys().unwrap();
            let sk = s.into_session_keys().unwrap();
            prop_assert_eq!(ck.send.key.as_bytes(), sk.recv.key.as_bytes());
            prop_assert_eq!(ck.recv.key.as_bytes(), sk.send.key.as_bytes());
            prop_assert_eq!(ck.send.nonce, sk.recv.nonce);
            prop_assert_eq!(ck.recv.nonce, sk.send.nonce);
        }

        /// Different app keys always fail at the first hello
        #[test]
        fn differing_app_keys_isolate(
            key_a in any::<[u8; 32]>(),
            key_b in any::<[u8; 32]>(),
            rng_seed in any::<u64>(),
        ) {
            prop_assume!(key_a != key_b);
            let mut rng = StdRng::seed_from_u64(rng_seed);
            let (key_a, key_b) = (AppKey::new(key_a), AppKey::new(key_b));
            let client = Identity::generate_with(&mut rng);
            let server = Identity::generate_with(&mut rng);

            let mut c = Handshake::new_client(&client, &key_a, server.public_key(), &mut rng);
            let mut s = Handshake::new_server(&server, &key_b, &mut rng);

            let result = s.read_hello(&c.create_hello().unwrap());
            prop_assert!(matches!(result, Err(Error::NetworkIsolation)));
        }
    }
}
