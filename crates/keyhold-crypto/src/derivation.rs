//! Deterministic keypair derivation from the root secret.
//!
//! Uses the BIP32 master-key step: `HMAC-SHA512(key = "Bitcoin seed", data =
//! root_secret || token)`. The left half becomes the secp256k1 private scalar,
//! the right half the chain code.
//!
//! # Security
//!
//! - Deterministic: same (root secret, token) always produces the same key
//! - Token isolation: distinct tokens produce unrelated keys; correlating
//!   them requires the root secret
//! - Fail closed: an invalid left half is rejected, not reduced mod n

use std::fmt;

use hmac::{Hmac, Mac};
use k256::{PublicKey, SecretKey, elliptic_curve::sec1::ToEncodedPoint};
use sha2::Sha512;
use zeroize::{Zeroize, Zeroizing};

use crate::{
    error::{CipherError, DerivationError},
    secret::{DerivationToken, RootSecret},
};

type HmacSha512 = Hmac<Sha512>;

/// HMAC key of the BIP32 master-key step
const MASTER_KEY_LABEL: &[u8] = b"Bitcoin seed";

/// Scalar and chain code size
const HALF_SIZE: usize = 32;

/// SEC1 compressed point size
const COMPRESSED_SIZE: usize = 33;

/// SEC1 tags for compressed points (even and odd y)
const COMPRESSED_TAGS: [u8; 2] = [0x02, 0x03];

/// A 33-byte SEC1 compressed secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressedPublicKey([u8; COMPRESSED_SIZE]);

impl CompressedPublicKey {
    /// Encoded size in bytes (prefix + x-coordinate).
    pub const SIZE: usize = COMPRESSED_SIZE;

    /// Encode a curve point.
    pub fn from_public_key(key: &PublicKey) -> Self {
        let point = key.to_encoded_point(true);
        let mut bytes = [0u8; Self::SIZE];
        bytes.copy_from_slice(point.as_bytes());
        Self(bytes)
    }

    /// Parse and validate an encoded point.
    ///
    /// Only the compressed tags are accepted; other 33-byte SEC1 forms
    /// (such as compact points) are rejected.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CipherError> {
        let array = <[u8; Self::SIZE]>::try_from(bytes).map_err(|_| CipherError::InvalidPublicKey)?;
        if !COMPRESSED_TAGS.contains(&array[0]) {
            return Err(CipherError::InvalidPublicKey);
        }
        let key = Self(array);
        key.to_public_key()?;
        Ok(key)
    }

    /// Decompress into a curve point.
    pub fn to_public_key(&self) -> Result<PublicKey, CipherError> {
        PublicKey::from_sec1_bytes(&self.0).map_err(|_| CipherError::InvalidPublicKey)
    }

    /// Encoded bytes.
    pub fn as_bytes(&self) -> &[u8; Self::SIZE] {
        &self.0
    }

    /// Encoded bytes as an owned vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl AsRef<[u8]> for CompressedPublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for CompressedPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompressedPublicKey(")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        f.write_str(")")
    }
}

/// A keypair recomputed from (root secret, token).
///
/// Holds the private scalar, so it should live only as long as the operation
/// that needed it. The scalar and chain code are zeroized on drop.
pub struct DerivedKey {
    secret: SecretKey,
    chain_code: Zeroizing<[u8; HALF_SIZE]>,
}

impl DerivedKey {
    /// The private scalar.
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    /// The public point.
    pub fn public_key(&self) -> PublicKey {
        self.secret.public_key()
    }

    /// The public point in compressed SEC1 form.
    pub fn compressed_public_key(&self) -> CompressedPublicKey {
        CompressedPublicKey::from_public_key(&self.public_key())
    }

    /// BIP32 chain code (right half of the HMAC output).
    pub fn chain_code(&self) -> &[u8; HALF_SIZE] {
        &self.chain_code
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("public_key", &self.compressed_public_key())
            .finish_non_exhaustive()
    }
}

/// Derive the keypair for a token under the given root secret.
///
/// Pure and side-effect free; safe to call concurrently.
///
/// # Errors
///
/// - `InvalidScalar`: the derived left half is zero or not below the curve
///   order. Probability is below 2^-127 for honest inputs.
pub fn derive_key_pair(
    root: &RootSecret,
    token: &DerivationToken,
) -> Result<DerivedKey, DerivationError> {
    master_key(&[root.expose(), token.as_bytes().as_slice()])
}

/// Derive only the compressed public key for a token.
///
/// The private half is dropped (and zeroized) before returning.
pub fn derive_public_key(
    root: &RootSecret,
    token: &DerivationToken,
) -> Result<CompressedPublicKey, DerivationError> {
    derive_key_pair(root, token).map(|key| key.compressed_public_key())
}

/// BIP32 master key over the concatenation of `seed_parts`.
fn master_key(seed_parts: &[&[u8]]) -> Result<DerivedKey, DerivationError> {
    let Ok(mut mac) = HmacSha512::new_from_slice(MASTER_KEY_LABEL) else {
        unreachable!("HMAC accepts keys of any length");
    };
    for part in seed_parts {
        mac.update(part);
    }

    let mut output = mac.finalize().into_bytes();
    let (left, right) = output.split_at(HALF_SIZE);

    let secret = scalar_from_bytes(left);
    let mut chain_code = Zeroizing::new([0u8; HALF_SIZE]);
    chain_code.copy_from_slice(right);
    output.as_mut_slice().zeroize();

    Ok(DerivedKey { secret: secret?, chain_code })
}

/// Interpret 32 big-endian bytes as a private scalar, rejecting 0 and >= n.
fn scalar_from_bytes(bytes: &[u8]) -> Result<SecretKey, DerivationError> {
    if bytes.len() != HALF_SIZE {
        return Err(DerivationError::InvalidScalar);
    }
    SecretKey::from_slice(bytes).map_err(|_| DerivationError::InvalidScalar)
}
