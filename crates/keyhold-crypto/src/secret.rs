//! Root secret and derivation token containers.
//!
//! Both types own their bytes in zeroizing storage and redact themselves in
//! `Debug` output. Neither implements serialization.

use std::fmt;

use zeroize::Zeroizing;

use crate::error::KeyMaterialError;

/// Minimum root secret length (128 bits).
pub const MIN_ROOT_SECRET_LEN: usize = 16;

/// Maximum root secret length (512 bits).
pub const MAX_ROOT_SECRET_LEN: usize = 64;

/// Size of a derivation token in bytes.
pub const TOKEN_SIZE: usize = 32;

/// Process-wide master entropy from which every service key descends.
///
/// Fixed at startup and immutable afterwards. Share it behind an `Arc`; it
/// is intentionally not `Clone`.
pub struct RootSecret {
    bytes: Zeroizing<Vec<u8>>,
}

impl RootSecret {
    /// Wrap raw root secret bytes.
    ///
    /// The input is moved into zeroizing storage before validation, so a
    /// rejected secret is wiped as well.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, KeyMaterialError> {
        let bytes = Zeroizing::new(bytes);
        if !(MIN_ROOT_SECRET_LEN..=MAX_ROOT_SECRET_LEN).contains(&bytes.len()) {
            return Err(KeyMaterialError::RootSecretLength {
                min: MIN_ROOT_SECRET_LEN,
                max: MAX_ROOT_SECRET_LEN,
                actual: bytes.len(),
            });
        }

        Ok(Self { bytes })
    }

    /// Length of the secret in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; an empty root secret is rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for RootSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RootSecret([REDACTED; {} bytes])", self.bytes.len())
    }
}

/// Caller-supplied 32-byte value combined with the root secret.
///
/// The token is the decryption capability: anyone presenting it can
/// recompute the matching private key. It is never stored.
#[derive(Clone)]
pub struct DerivationToken {
    bytes: Zeroizing<[u8; TOKEN_SIZE]>,
}

impl DerivationToken {
    /// Create a token from its raw bytes.
    pub fn new(bytes: [u8; TOKEN_SIZE]) -> Self {
        Self { bytes: Zeroizing::new(bytes) }
    }

    /// Raw token bytes.
    pub fn as_bytes(&self) -> &[u8; TOKEN_SIZE] {
        &self.bytes
    }
}

impl From<[u8; TOKEN_SIZE]> for DerivationToken {
    fn from(bytes: [u8; TOKEN_SIZE]) -> Self {
        Self::new(bytes)
    }
}

impl TryFrom<&[u8]> for DerivationToken {
    type Error = KeyMaterialError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let Ok(array) = <[u8; TOKEN_SIZE]>::try_from(bytes) else {
            return Err(KeyMaterialError::TokenLength { expected: TOKEN_SIZE, actual: bytes.len() });
        };

        Ok(Self::new(array))
    }
}

impl PartialEq for DerivationToken {
    fn eq(&self, other: &Self) -> bool {
        self.bytes[..] == other.bytes[..]
    }
}

impl Eq for DerivationToken {}

impl fmt::Debug for DerivationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivationToken([REDACTED])")
    }
}
