//! Fuzz target for request line handling
//!
//! Arbitrary text through the JSON request parser and dispatcher. Every line
//! must produce exactly one serializable response and NEVER panic.

#![no_main]

use keyhold_broker::{KeyBroker, SystemEntropy, request::handle_line};
use keyhold_crypto::RootSecret;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(root) = RootSecret::from_bytes(b"fuzz_root_secret_fuzz_root_secre".to_vec()) else {
        return;
    };
    let broker = KeyBroker::new(root, SystemEntropy::new());

    let response = handle_line(&broker, line);
    let _ = format!("{response:?}");
});
