//! Keyhold broker.
//!
//! Per-service key derivation and hybrid encryption over a single root
//! secret, served as a line-oriented JSON process on stdin/stdout.
//!
//! # Architecture
//!
//! This crate wraps [`keyhold_crypto`]'s pure functions with shared state,
//! randomness, and I/O. [`ServiceRegistry`] holds the published public keys,
//! [`KeyBroker`] adds ephemeral-key generation and logging, and [`serve`]
//! drives requests through a bounded pool of blocking workers.
//!
//! # Components
//!
//! - [`ServiceRegistry`]: Service name to public key map with atomic
//!   registration
//! - [`KeyBroker`]: Operation facade drawing randomness from an [`Entropy`]
//! - [`BrokerConfig`]: Root secret source and worker limits
//! - [`serve`]: JSON-lines request loop
//! - [`SystemEntropy`]: Production randomness (OS RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod broker;
mod config;
mod entropy;
mod error;
mod registry;
pub mod request;
mod service;

pub use broker::KeyBroker;
pub use config::{
    BrokerConfig, ConfigError, DEFAULT_WORKERS, GENERATED_ROOT_SECRET_LEN, MAX_WORKERS,
    ROOT_SECRET_ENV, RootSecretSource,
};
pub use entropy::{Entropy, SystemEntropy};
pub use error::{BrokerError, ErrorKind};
pub use registry::ServiceRegistry;
pub use service::serve;
