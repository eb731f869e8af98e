//! Broker error types.
//!
//! Every error is local to the call that produced it; none leaves shared
//! state modified. `Display` renders the stable user-visible message, and
//! [`BrokerError::kind`] gives a machine-readable discriminant.

use keyhold_crypto::{CipherError, DerivationError};
use thiserror::Error;

/// Errors that can occur in broker operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// Service identity already has a published public key.
    ///
    /// Caller's mistake; the stored key is untouched. Registration is never
    /// idempotent, even when the same token is presented again.
    #[error("already registered")]
    AlreadyRegistered {
        /// Service that was already registered
        service: String,
    },

    /// No public key has been published for this service identity.
    #[error("service not registered")]
    NotRegistered {
        /// Service that was looked up
        service: String,
    },

    /// Root secret and token do not yield a valid private scalar.
    ///
    /// Fatal for the call, never for the process.
    #[error("could not recover master key")]
    Derivation(#[from] DerivationError),

    /// Hybrid encryption failed.
    #[error("could not encrypt")]
    Encryption(#[source] CipherError),

    /// Ciphertext could not be opened with the recovered key.
    ///
    /// Carries no detail about which stage failed.
    #[error("could not decrypt")]
    Decryption,
}

impl BrokerError {
    /// Machine-readable error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyRegistered { .. } => ErrorKind::AlreadyRegistered,
            Self::NotRegistered { .. } => ErrorKind::NotRegistered,
            Self::Derivation(_) => ErrorKind::Derivation,
            Self::Encryption(_) => ErrorKind::Encryption,
            Self::Decryption => ErrorKind::Decryption,
        }
    }

    /// Returns true if the caller can fix this by changing the request.
    ///
    /// Registry conflicts and unknown services are caller errors. Crypto
    /// failures are not: the request was well-formed but the operation could
    /// not complete.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::AlreadyRegistered { .. } | Self::NotRegistered { .. })
    }
}

/// Stable discriminant for rejected operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`BrokerError::AlreadyRegistered`]
    AlreadyRegistered,
    /// See [`BrokerError::NotRegistered`]
    NotRegistered,
    /// See [`BrokerError::Derivation`]
    Derivation,
    /// See [`BrokerError::Encryption`]
    Encryption,
    /// See [`BrokerError::Decryption`]
    Decryption,
    /// Request could not be parsed or has malformed fields
    BadRequest,
}

impl ErrorKind {
    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyRegistered => "already_registered",
            Self::NotRegistered => "not_registered",
            Self::Derivation => "derivation",
            Self::Encryption => "encryption",
            Self::Decryption => "decryption",
            Self::BadRequest => "bad_request",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_visible_messages_are_stable() {
        let cases = [
            (BrokerError::AlreadyRegistered { service: "svc".into() }, "already registered"),
            (BrokerError::NotRegistered { service: "svc".into() }, "service not registered"),
            (BrokerError::Derivation(DerivationError::InvalidScalar), "could not recover master key"),
            (BrokerError::Encryption(CipherError::EncryptionFailed), "could not encrypt"),
            (BrokerError::Decryption, "could not decrypt"),
        ];

        for (err, message) in cases {
            assert_eq!(err.to_string(), message);
        }
    }

    #[test]
    fn service_name_is_not_part_of_message() {
        let err = BrokerError::NotRegistered { service: "tenant-secret-name".into() };
        assert!(!err.to_string().contains("tenant-secret-name"));
    }

    #[test]
    fn registry_conflicts_are_caller_errors() {
        assert!(BrokerError::AlreadyRegistered { service: "a".into() }.is_caller_error());
        assert!(BrokerError::NotRegistered { service: "a".into() }.is_caller_error());
        assert!(!BrokerError::Decryption.is_caller_error());
        assert!(!BrokerError::Derivation(DerivationError::InvalidScalar).is_caller_error());
    }

    #[test]
    fn kinds_have_distinct_wire_names() {
        let kinds = [
            ErrorKind::AlreadyRegistered,
            ErrorKind::NotRegistered,
            ErrorKind::Derivation,
            ErrorKind::Encryption,
            ErrorKind::Decryption,
            ErrorKind::BadRequest,
        ];
        let names: std::collections::HashSet<_> = kinds.iter().map(|k| k.as_str()).collect();
        assert_eq!(names.len(), kinds.len());
    }

    #[test]
    fn encryption_error_exposes_source() {
        use std::error::Error as _;

        let err = BrokerError::Encryption(CipherError::InvalidPublicKey);
        assert!(err.source().is_some());
        assert_eq!(err.kind(), ErrorKind::Encryption);
    }
}
