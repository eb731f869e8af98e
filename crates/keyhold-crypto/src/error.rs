//! Error types for key derivation and hybrid encryption

use thiserror::Error;

/// Errors from deriving a keypair out of the root secret and a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DerivationError {
    /// The HMAC output is not a valid secp256k1 scalar (zero, or not below
    /// the group order). The (root secret, token) pair cannot be used.
    #[error("derived scalar is zero or not below the curve order")]
    InvalidScalar,
}

/// Errors from constructing key material out of raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KeyMaterialError {
    /// Root secret outside the accepted length range
    #[error("invalid root secret length: expected {min}..={max} bytes, got {actual}")]
    RootSecretLength {
        /// Minimum accepted length
        min: usize,
        /// Maximum accepted length
        max: usize,
        /// Actual length
        actual: usize,
    },

    /// Derivation token of the wrong length
    #[error("invalid token length: expected {expected} bytes, got {actual}")]
    TokenLength {
        /// Expected token length
        expected: usize,
        /// Actual token length
        actual: usize,
    },
}

/// Errors from the ECIES hybrid cipher.
///
/// Decryption deliberately collapses every failure (truncated input, bad
/// ephemeral point, tag mismatch) into [`CipherError::DecryptionFailed`] so
/// callers cannot learn which stage rejected the ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CipherError {
    /// Bytes are not a valid SEC1 compressed secp256k1 point
    #[error("invalid public key encoding")]
    InvalidPublicKey,

    /// Ephemeral seed is zero or not below the curve order
    #[error("ephemeral seed is not a valid scalar")]
    InvalidEphemeralSeed,

    /// AEAD refused to seal the plaintext
    #[error("encryption failed")]
    EncryptionFailed,

    /// Ciphertext could not be opened
    #[error("decryption failed")]
    DecryptionFailed,
}

impl CipherError {
    /// Returns true if retrying with fresh randomness may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InvalidEphemeralSeed)
    }
}
