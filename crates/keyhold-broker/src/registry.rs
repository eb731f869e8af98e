//! Service registry mapping service identities to derived public keys.
//!
//! Provides in-memory storage of compressed public keys indexed by service
//! name. An entry is created exactly once, on the first successful
//! derivation, and is immutable for the life of the process. Private keys are
//! never stored: decryption recomputes them from the root secret and token.
//!
//! # Concurrency
//!
//! The map sits behind a single `RwLock`. Lookups take the read lock;
//! registration derives the key with no lock held and then performs the
//! check-and-insert under one write lock acquisition. Of several concurrent
//! registrations for the same name, exactly one inserts and the rest observe
//! [`BrokerError::AlreadyRegistered`].

#![allow(clippy::expect_used, reason = "Lock poisoning should cause a panic")]

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use keyhold_crypto::{
    CompressedPublicKey, DerivationToken, EPHEMERAL_SEED_SIZE, RootSecret, decrypt,
    derive_key_pair, derive_public_key, encrypt,
};

use crate::error::BrokerError;

/// In-memory registry of published service public keys.
///
/// Thread-safe via `Arc<RwLock<_>>`. Clone shares the same underlying map and
/// root secret.
#[derive(Clone)]
pub struct ServiceRegistry {
    /// Root secret every service key is derived from
    root: Arc<RootSecret>,
    /// Published keys indexed by service name
    keys: Arc<RwLock<HashMap<String, CompressedPublicKey>>>,
}

impl ServiceRegistry {
    /// Create an empty registry over the given root secret.
    pub fn new(root: Arc<RootSecret>) -> Self {
        Self { root, keys: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Derive the keypair for `token` and publish its public key as
    /// `service`.
    ///
    /// Rejects (rather than overwrites) a name that is already registered,
    /// without consulting the derivation engine when the name is known up
    /// front. The private half is dropped before returning.
    ///
    /// # Errors
    ///
    /// - `AlreadyRegistered`: `service` already has a key, including when a
    ///   concurrent call won the race
    /// - `Derivation`: (root secret, token) does not yield a valid scalar
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn derive_and_register(
        &self,
        service: &str,
        token: &DerivationToken,
    ) -> Result<CompressedPublicKey, BrokerError> {
        if self.read().contains_key(service) {
            return Err(BrokerError::AlreadyRegistered { service: service.to_owned() });
        }

        let public_key = derive_public_key(&self.root, token)?;

        match self.write().entry(service.to_owned()) {
            Entry::Occupied(_) => Err(BrokerError::AlreadyRegistered { service: service.to_owned() }),
            Entry::Vacant(slot) => {
                slot.insert(public_key);
                Ok(public_key)
            },
        }
    }

    /// Published public key for `service`.
    ///
    /// # Errors
    ///
    /// - `NotRegistered`: no key has been published under this name
    pub fn get_public_key(&self, service: &str) -> Result<CompressedPublicKey, BrokerError> {
        self.read()
            .get(service)
            .copied()
            .ok_or_else(|| BrokerError::NotRegistered { service: service.to_owned() })
    }

    /// Encrypt `plaintext` to the public key published for `service`.
    ///
    /// The lock is released before any curve arithmetic happens.
    ///
    /// # Errors
    ///
    /// - `NotRegistered`: no key has been published under this name
    /// - `Encryption`: the cipher rejected the seed or plaintext
    pub fn encrypt_for(
        &self,
        service: &str,
        plaintext: &[u8],
        ephemeral_seed: [u8; EPHEMERAL_SEED_SIZE],
    ) -> Result<Vec<u8>, BrokerError> {
        let recipient = self.get_public_key(service)?;
        encrypt(&recipient, plaintext, ephemeral_seed).map_err(BrokerError::Encryption)
    }

    /// Recompute the private key for `token` and open `ciphertext` with it.
    ///
    /// Does not consult the map: any holder of a token can decrypt, whether
    /// or not that token was ever used to register a service.
    ///
    /// # Errors
    ///
    /// - `Derivation`: (root secret, token) does not yield a valid scalar
    /// - `Decryption`: the ciphertext could not be opened, for any reason
    pub fn decrypt_with(
        &self,
        token: &DerivationToken,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, BrokerError> {
        let key = derive_key_pair(&self.root, token)?;
        decrypt(&key, ciphertext).map_err(|_| BrokerError::Decryption)
    }

    /// Check if `service` has a published key.
    ///
    /// The answer may be stale as soon as it is returned; use
    /// [`Self::derive_and_register`] for an atomic check-and-insert.
    pub fn contains(&self, service: &str) -> bool {
        self.read().contains_key(service)
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if no service has registered yet.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Snapshot of registered service names, sorted.
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CompressedPublicKey>> {
        self.keys.read().expect("ServiceRegistry lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CompressedPublicKey>> {
        self.keys.write().expect("ServiceRegistry lock poisoned")
    }
}
