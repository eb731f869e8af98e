//! Fuzz target for tampered ECIES ciphertexts
//!
//! Harden decryption against modified ciphertexts (HIGH priority)
//!
//! # Strategy
//!
//! - Bit flips: Single bits flipped anywhere in the ciphertext
//! - Truncation: Ciphertext cut short, including inside the header
//! - Extension: Trailing bytes appended after the tag
//! - Header swap: Ephemeral key replaced with arbitrary bytes
//!
//! # Invariants
//!
//! - Untouched ciphertext ALWAYS decrypts to the original plaintext
//! - Any modification MUST be rejected
//! - NEVER panic on malformed ciphertext

#![no_main]

use arbitrary::Arbitrary;
use keyhold_crypto::{
    EPHEMERAL_KEY_SIZE, DerivationToken, RootSecret, decrypt, derive_key_pair, encrypt,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct TamperScenario {
    token: [u8; 32],
    ephemeral_seed: [u8; 32],
    plaintext: Vec<u8>,
    attack: Attack,
}

#[derive(Debug, Clone, Arbitrary)]
enum Attack {
    None,
    BitFlip { position: u16, bit: u8 },
    Truncate { keep: u16 },
    Extend { extra: Vec<u8> },
    HeaderSwap { header: [u8; EPHEMERAL_KEY_SIZE] },
}

fuzz_target!(|scenario: TamperScenario| {
    let Ok(root) = RootSecret::from_bytes(b"fuzz_root_secret_fuzz_root_secre".to_vec()) else {
        return;
    };
    let token = DerivationToken::new(scenario.token);
    let Ok(key) = derive_key_pair(&root, &token) else {
        return;
    };
    let Ok(mut ciphertext) =
        encrypt(&key.compressed_public_key(), &scenario.plaintext, scenario.ephemeral_seed)
    else {
        // Seed was not a valid scalar
        return;
    };
    let original = ciphertext.clone();

    match scenario.attack {
        Attack::None => {
            assert_eq!(decrypt(&key, &ciphertext).ok(), Some(scenario.plaintext));
            return;
        },
        Attack::BitFlip { position, bit } => {
            let index = usize::from(position) % ciphertext.len();
            ciphertext[index] ^= 1 << (bit % 8);
        },
        Attack::Truncate { keep } => {
            let keep = usize::from(keep) % ciphertext.len();
            ciphertext.truncate(keep);
        },
        Attack::Extend { extra } => {
            if extra.is_empty() {
                return;
            }
            ciphertext.extend_from_slice(&extra);
        },
        Attack::HeaderSwap { header } => {
            ciphertext[..EPHEMERAL_KEY_SIZE].copy_from_slice(&header);
        },
    }

    if ciphertext != original {
        assert!(decrypt(&key, &ciphertext).is_err(), "tampered ciphertext accepted");
    }
});
