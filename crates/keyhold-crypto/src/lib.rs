//! Keyhold Cryptographic Primitives
//!
//! Cryptographic building blocks for Keyhold. Pure functions with
//! deterministic outputs. Callers provide random bytes (ephemeral key seeds)
//! for deterministic testing.
//!
//! # Key Hierarchy
//!
//! A single long-lived root secret is combined with a caller-supplied 32-byte
//! derivation token to produce a secp256k1 keypair. Only the compressed public
//! key is ever retained; the private scalar is recomputed on demand from the
//! same (root secret, token) pair.
//!
//! ```text
//! Root Secret || Derivation Token
//!        │
//!        ▼
//! HMAC-SHA512("Bitcoin seed") → IL (scalar) || IR (chain code)
//!        │
//!        ▼
//! secp256k1 keypair → Compressed Public Key (33 bytes)
//!        │
//!        ▼
//! ECIES: ephemeral ECDH → HKDF-SHA256 → XChaCha20-Poly1305
//! ```
//!
//! # Security
//!
//! Determinism:
//! - Same (root secret, token) always yields the same keypair
//! - Different tokens yield unrelated keypairs without knowledge of the root
//!
//! Fail Closed:
//! - A derived scalar of zero or at/above the curve order is rejected, never
//!   reduced
//!
//! Authenticity:
//! - XChaCha20-Poly1305 AEAD provides tamper-proof encryption
//! - The ephemeral and recipient public keys are bound into the KDF salt
//! - Every decryption failure surfaces as the same opaque error
//!
//! Hygiene:
//! - Root secret, tokens, scalars and chain codes are zeroized on drop
//! - `Debug` output never includes secret material

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod derivation;
pub mod ecies;
pub mod error;
pub mod secret;

pub use derivation::{CompressedPublicKey, DerivedKey, derive_key_pair, derive_public_key};
pub use ecies::{CIPHERTEXT_OVERHEAD, EPHEMERAL_KEY_SIZE, EPHEMERAL_SEED_SIZE, TAG_SIZE, decrypt, encrypt};
pub use error::{CipherError, DerivationError, KeyMaterialError};
pub use secret::{
    DerivationToken, MAX_ROOT_SECRET_LEN, MIN_ROOT_SECRET_LEN, RootSecret, TOKEN_SIZE,
};
