//! Key broker facade.
//!
//! [`KeyBroker`] owns the registry and an entropy source and exposes the four
//! operations callers use: publish a key, look it up, encrypt to it, and
//! decrypt with a token. Every operation is synchronous CPU-bound work and is
//! safe to call from many threads at once.
//!
//! Logging records service names and outcomes only. Tokens, plaintexts and
//! the root secret never reach a log line.

use std::sync::Arc;

use keyhold_crypto::{
    CipherError, CompressedPublicKey, DerivationToken, EPHEMERAL_SEED_SIZE, RootSecret,
};
use zeroize::Zeroizing;

use crate::{
    entropy::{Entropy, SystemEntropy},
    error::BrokerError,
    registry::ServiceRegistry,
};

/// Attempts at drawing a valid ephemeral scalar before giving up.
///
/// A uniformly random 32-byte seed is invalid with probability below 2^-127,
/// so exhausting this only happens with a broken entropy source.
const MAX_EPHEMERAL_ATTEMPTS: usize = 4;

/// Per-service key derivation and hybrid encryption broker.
pub struct KeyBroker<E = SystemEntropy> {
    registry: ServiceRegistry,
    entropy: E,
}

impl<E: Entropy> KeyBroker<E> {
    /// Create a broker over `root`, drawing ephemeral keys from `entropy`.
    pub fn new(root: RootSecret, entropy: E) -> Self {
        Self { registry: ServiceRegistry::new(Arc::new(root)), entropy }
    }

    /// The underlying service registry.
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Derive a keypair for `token` and publish its public key as `service`.
    pub fn derive_pubkey(
        &self,
        service: &str,
        token: &DerivationToken,
    ) -> Result<CompressedPublicKey, BrokerError> {
        let result = self.registry.derive_and_register(service, token);
        match &result {
            Ok(_) => tracing::info!(service, "registered service public key"),
            Err(e) => tracing::warn!(service, error = %e, "derive_pubkey rejected"),
        }
        result
    }

    /// Published public key for `service`.
    pub fn get_pubkey(&self, service: &str) -> Result<CompressedPublicKey, BrokerError> {
        let result = self.registry.get_public_key(service);
        if let Err(e) = &result {
            tracing::debug!(service, error = %e, "get_pubkey rejected");
        }
        result
    }

    /// Encrypt `plaintext` to the key published for `service`.
    ///
    /// Draws a fresh ephemeral seed for every call and redraws if the seed is
    /// not a valid scalar.
    pub fn encrypt(&self, service: &str, plaintext: &[u8]) -> Result<Vec<u8>, BrokerError> {
        for _ in 0..MAX_EPHEMERAL_ATTEMPTS {
            let mut seed = Zeroizing::new([0u8; EPHEMERAL_SEED_SIZE]);
            self.entropy.random_bytes(&mut seed[..]);

            match self.registry.encrypt_for(service, plaintext, *seed) {
                Err(BrokerError::Encryption(e)) if e.is_retryable() => {
                    tracing::debug!(service, "ephemeral seed rejected, redrawing");
                },
                Ok(ciphertext) => {
                    tracing::debug!(service, len = plaintext.len(), "encrypted payload");
                    return Ok(ciphertext);
                },
                Err(e) => {
                    tracing::warn!(service, error = %e, "encrypt rejected");
                    return Err(e);
                },
            }
        }

        tracing::error!(service, "entropy source produced no valid ephemeral scalar");
        Err(BrokerError::Encryption(CipherError::InvalidEphemeralSeed))
    }

    /// Recover the private key for `token` and decrypt `ciphertext`.
    ///
    /// Works for any token, registered or not.
    pub fn decrypt(
        &self,
        token: &DerivationToken,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, BrokerError> {
        let result = self.registry.decrypt_with(token, ciphertext);
        if let Err(e) = &result {
            tracing::warn!(error = %e, len = ciphertext.len(), "decrypt rejected");
        }
        result
    }
}
