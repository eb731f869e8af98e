//! Broker configuration.
//!
//! Resolves where the root secret comes from and how many requests may run
//! at once. A missing or malformed root secret is fatal: it surfaces as a
//! [`ConfigError`] before the broker is built, never as a per-request error.

use std::{fmt, fs, path::PathBuf};

use keyhold_crypto::{KeyMaterialError, RootSecret};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::entropy::Entropy;

/// Environment variable holding a hex-encoded root secret.
pub const ROOT_SECRET_ENV: &str = "KEYHOLD_ROOT_SECRET";

/// Length of a freshly generated root secret.
pub const GENERATED_ROOT_SECRET_LEN: usize = 32;

/// Default cap on concurrently executing requests.
pub const DEFAULT_WORKERS: usize = 8;

/// Upper bound on `workers`.
pub const MAX_WORKERS: usize = 1024;

/// Errors that prevent the broker from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Root secret file could not be read
    #[error("failed to read root secret from {path}: {source}")]
    Io {
        /// Path that failed
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Root secret is not valid hex
    #[error("root secret is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Root secret has an unacceptable length
    #[error("invalid root secret: {0}")]
    KeyMaterial(#[from] KeyMaterialError),

    /// No root secret was configured and generation was not requested
    #[error("no root secret configured: use --root-secret-file, {env}, or --generate-root-secret")]
    MissingRootSecret {
        /// Environment variable that was checked
        env: &'static str,
    },

    /// Worker count out of range
    #[error("workers must be between 1 and {max}, got {requested}")]
    Workers {
        /// Requested worker count
        requested: usize,
        /// Largest accepted worker count
        max: usize,
    },
}

/// Where the root secret is loaded from.
pub enum RootSecretSource {
    /// Hex-encoded file
    File(PathBuf),
    /// Hex string, typically from [`ROOT_SECRET_ENV`]
    Inline(Zeroizing<String>),
    /// Fresh random secret, only on explicit request; every derived key
    /// dies with the process
    Generate,
}

impl fmt::Debug for RootSecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Inline(_) => f.write_str("Inline([REDACTED])"),
            Self::Generate => f.write_str("Generate"),
        }
    }
}

/// Broker configuration.
#[derive(Debug)]
pub struct BrokerConfig {
    /// Root secret source
    pub root_secret: RootSecretSource,
    /// Maximum concurrently executing requests
    pub workers: usize,
}

impl BrokerConfig {
    /// Build a configuration from command-line and environment inputs.
    ///
    /// A secret file takes priority over an inline secret. With neither, a
    /// secret is generated only when `generate_root_secret` is set;
    /// otherwise startup is refused.
    pub fn resolve(
        root_secret_file: Option<PathBuf>,
        inline_root_secret: Option<String>,
        generate_root_secret: bool,
        workers: usize,
    ) -> Result<Self, ConfigError> {
        if !(1..=MAX_WORKERS).contains(&workers) {
            return Err(ConfigError::Workers { requested: workers, max: MAX_WORKERS });
        }

        let inline_root_secret = inline_root_secret.map(Zeroizing::new);
        let root_secret = match (root_secret_file, inline_root_secret) {
            (Some(path), _) => RootSecretSource::File(path),
            (None, Some(hex)) => RootSecretSource::Inline(hex),
            (None, None) if generate_root_secret => RootSecretSource::Generate,
            (None, None) => return Err(ConfigError::MissingRootSecret { env: ROOT_SECRET_ENV }),
        };

        Ok(Self { root_secret, workers })
    }

    /// Load or generate the root secret.
    pub fn load_root_secret(&self, entropy: &impl Entropy) -> Result<RootSecret, ConfigError> {
        match &self.root_secret {
            RootSecretSource::File(path) => {
                let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                let secret = decode_root_secret(&Zeroizing::new(contents))?;
                tracing::info!(path = %path.display(), len = secret.len(), "loaded root secret");
                Ok(secret)
            },
            RootSecretSource::Inline(hex) => {
                let secret = decode_root_secret(hex)?;
                tracing::info!(len = secret.len(), "loaded root secret from environment");
                Ok(secret)
            },
            RootSecretSource::Generate => {
                let mut bytes = vec![0u8; GENERATED_ROOT_SECRET_LEN];
                entropy.random_bytes(&mut bytes);
                tracing::warn!("No root secret provided - generated a random one");
                tracing::warn!("Derived keys cannot be recovered after restart!");
                Ok(RootSecret::from_bytes(bytes)?)
            },
        }
    }
}

/// Decode hex (optional `0x` prefix, surrounding whitespace ignored).
fn decode_root_secret(text: &str) -> Result<RootSecret, ConfigError> {
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(digits)?;
    Ok(RootSecret::from_bytes(bytes)?)
}
