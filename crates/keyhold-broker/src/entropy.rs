//! Randomness sources for ephemeral keys and generated root secrets.
//!
//! The crypto crate never draws randomness itself; the broker feeds it bytes
//! from an [`Entropy`] implementation. Production uses [`SystemEntropy`],
//! tests substitute deterministic sources.

/// Source of random bytes.
pub trait Entropy: Send + Sync + 'static {
    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);
}

/// Entropy from the operating system via `getrandom`.
///
/// Every ECIES ephemeral seed and every generated root secret comes from
/// here. A seed that repeats across two messages to the same recipient
/// reuses the AEAD key and nonce, so there is no fallback source.
///
/// # Panics
///
/// Panics if the OS refuses to supply randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEntropy;

impl SystemEntropy {
    /// Create a new system entropy source.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Entropy for SystemEntropy {
    #[allow(clippy::expect_used, reason = "No safe ephemeral keys without OS randomness")]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("OS randomness unavailable");
    }
}
