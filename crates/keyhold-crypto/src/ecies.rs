//! ECIES hybrid encryption over secp256k1 and `XChaCha20-Poly1305`
//!
//! All functions are pure - the ephemeral key seed must be provided by the
//! caller. This enables deterministic testing.
//!
//! # Ciphertext Layout
//!
//! ```text
//! +----------------------------+--------------------------------------+
//! | ephemeral public key (33)  | sealed payload (plaintext_len + 16)  |
//! +----------------------------+--------------------------------------+
//! ```
//!
//! The AEAD key and nonce are both expanded from the ECDH shared secret with
//! HKDF-SHA256, salted with the ephemeral and recipient public keys. A fresh
//! ephemeral key per message makes each (key, nonce) pair single-use.

use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use hkdf::Hkdf;
use k256::{SecretKey, ecdh::diffie_hellman};
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::{
    derivation::{CompressedPublicKey, DerivedKey},
    error::CipherError,
};

/// Size of the ephemeral public key prefix.
pub const EPHEMERAL_KEY_SIZE: usize = CompressedPublicKey::SIZE;

/// Size of the caller-supplied ephemeral key seed.
pub const EPHEMERAL_SEED_SIZE: usize = 32;

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Bytes added to every plaintext; also the minimum ciphertext length.
pub const CIPHERTEXT_OVERHEAD: usize = EPHEMERAL_KEY_SIZE + TAG_SIZE;

/// HKDF info label
const ECIES_LABEL: &[u8] = b"keyholdEciesV1";

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 24;

/// Encrypt `plaintext` to `recipient`.
///
/// `ephemeral_seed` becomes the ephemeral private scalar and is wiped before
/// returning. Caller MUST provide cryptographically secure random bytes in
/// production and MUST NOT reuse a seed.
///
/// # Errors
///
/// - `InvalidPublicKey`: `recipient` is not a valid curve point
/// - `InvalidEphemeralSeed`: seed is zero or not below the curve order;
///   retry with fresh randomness
/// - `EncryptionFailed`: plaintext exceeds the AEAD length limit
pub fn encrypt(
    recipient: &CompressedPublicKey,
    plaintext: &[u8],
    ephemeral_seed: [u8; EPHEMERAL_SEED_SIZE],
) -> Result<Vec<u8>, CipherError> {
    let recipient_point = recipient.to_public_key()?;

    let mut seed = ephemeral_seed;
    let ephemeral = SecretKey::from_slice(&seed).map_err(|_| CipherError::InvalidEphemeralSeed);
    seed.zeroize();
    let ephemeral = ephemeral?;

    let ephemeral_public = CompressedPublicKey::from_public_key(&ephemeral.public_key());
    let shared = diffie_hellman(ephemeral.to_nonzero_scalar(), recipient_point.as_affine());
    let session = SessionKey::derive(shared.raw_secret_bytes(), &ephemeral_public, recipient);

    let sealed = session
        .cipher
        .encrypt(&session.nonce, plaintext)
        .map_err(|_| CipherError::EncryptionFailed)?;

    let mut ciphertext = Vec::with_capacity(EPHEMERAL_KEY_SIZE + sealed.len());
    ciphertext.extend_from_slice(ephemeral_public.as_bytes());
    ciphertext.extend_from_slice(&sealed);
    Ok(ciphertext)
}

/// Decrypt a ciphertext produced by [`encrypt`] with the recipient's key.
///
/// # Errors
///
/// - `DecryptionFailed`: for every failure, whatever the stage
pub fn decrypt(key: &DerivedKey, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
    if ciphertext.len() < CIPHERTEXT_OVERHEAD {
        return Err(CipherError::DecryptionFailed);
    }

    let (ephemeral_bytes, sealed) = ciphertext.split_at(EPHEMERAL_KEY_SIZE);
    let ephemeral_public =
        CompressedPublicKey::from_slice(ephemeral_bytes).map_err(|_| CipherError::DecryptionFailed)?;
    let ephemeral_point =
        ephemeral_public.to_public_key().map_err(|_| CipherError::DecryptionFailed)?;

    let shared = diffie_hellman(key.secret_key().to_nonzero_scalar(), ephemeral_point.as_affine());
    let session =
        SessionKey::derive(shared.raw_secret_bytes(), &ephemeral_public, &key.compressed_public_key());

    session.cipher.decrypt(&session.nonce, sealed).map_err(|_| CipherError::DecryptionFailed)
}

/// Per-message AEAD state expanded from the ECDH shared secret.
struct SessionKey {
    cipher: XChaCha20Poly1305,
    nonce: XNonce,
}

impl SessionKey {
    fn derive(
        shared_secret: &[u8],
        ephemeral: &CompressedPublicKey,
        recipient: &CompressedPublicKey,
    ) -> Self {
        // Salt: ephemeral || recipient. Binding the exact encodings means a
        // flipped prefix byte (same x, negated point) still changes the key.
        let mut salt = [0u8; 2 * CompressedPublicKey::SIZE];
        salt[..CompressedPublicKey::SIZE].copy_from_slice(ephemeral.as_bytes());
        salt[CompressedPublicKey::SIZE..].copy_from_slice(recipient.as_bytes());

        let hkdf = Hkdf::<Sha256>::new(Some(&salt), shared_secret);
        let mut okm = Zeroizing::new([0u8; KEY_SIZE + NONCE_SIZE]);
        let Ok(()) = hkdf.expand(ECIES_LABEL, &mut okm[..]) else {
            unreachable!("56 bytes is a valid HKDF-SHA256 output length");
        };

        let cipher = XChaCha20Poly1305::new(Key::from_slice(&okm[..KEY_SIZE]));
        let nonce = *XNonce::from_slice(&okm[KEY_SIZE..]);

        Self { cipher, nonce }
    }
}
