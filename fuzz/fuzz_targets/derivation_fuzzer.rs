//! Fuzz target for key derivation
//!
//! Derive keys from arbitrary root secrets and tokens.
//!
//! # Invariants
//!
//! - Derivation is deterministic
//! - A derived public key always re-parses from its compressed encoding
//! - Root secrets outside the accepted length range are rejected, never
//!   truncated
//! - NEVER panic

#![no_main]

use arbitrary::Arbitrary;
use keyhold_crypto::{
    CompressedPublicKey, DerivationToken, MAX_ROOT_SECRET_LEN, MIN_ROOT_SECRET_LEN, RootSecret,
    derive_key_pair, derive_public_key,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct DerivationInput {
    root: Vec<u8>,
    token: [u8; 32],
}

fuzz_target!(|input: DerivationInput| {
    let len = input.root.len();
    let Ok(root) = RootSecret::from_bytes(input.root) else {
        assert!(!(MIN_ROOT_SECRET_LEN..=MAX_ROOT_SECRET_LEN).contains(&len));
        return;
    };
    assert!((MIN_ROOT_SECRET_LEN..=MAX_ROOT_SECRET_LEN).contains(&len));

    let token = DerivationToken::new(input.token);
    let first = derive_public_key(&root, &token);
    let second = derive_key_pair(&root, &token).map(|key| key.compressed_public_key());
    assert_eq!(first, second);

    if let Ok(public_key) = first {
        let reparsed = CompressedPublicKey::from_slice(public_key.as_bytes());
        assert_eq!(reparsed, Ok(public_key));
    }
});
