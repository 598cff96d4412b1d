//! Fuzz target for peer address and app key parsing

#![no_main]

use libfuzzer_sys::fuzz_target;
use secretstream_core::{AppKey, PeerAddr};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(addr) = s.parse::<PeerAddr>() {
            // a parsed address renders back to itself
            assert_eq!(addr.to_string().parse::<PeerAddr>().ok(), Some(addr));
        }
        let _ = s.parse::<AppKey>();
    }
});
