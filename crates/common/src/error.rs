//! Common error types shared across crates.

use thiserror::Error;

/// Failure reported by an object store or record store collaborator.
///
/// The variant decides whether the request governor may retry the call:
/// only [`StoreError::Transient`] is retryable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Network hiccup, throttling, or 5xx from the backing store.
    #[error("transient store failure: {0}")]
    Transient(String),

    /// The requested object or record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any failure that repeating the call cannot fix.
    #[error("store failure: {0}")]
    Permanent(String),
}

impl StoreError {
    /// Returns `true` if the call may succeed when repeated.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Top-level error type of the protection core.
///
/// Decrypt paths return either plaintext or exactly one of these kinds.
/// [`ProtectionError::WrongPassword`] and [`ProtectionError::DataCorruption`]
/// are deliberately distinct and must never be reported to a user as the same thing.
#[derive(Debug, Error)]
pub enum ProtectionError {
    /// The password did not reproduce the stored verification tag.
    #[error("wrong password")]
    WrongPassword,

    /// The payload failed authentication: corrupted bytes or wrong key.
    #[error("data corruption: authentication tag did not verify")]
    DataCorruption,

    /// Face descriptors cannot be compared (length mismatch, empty, non-finite).
    #[error("invalid face descriptor: {0}")]
    InvalidDescriptor(String),

    /// A confirmed capture was evaluated and did not match the enrolled face.
    #[error("face did not match")]
    BiometricMismatch,

    /// The file cannot be unlocked without the named credential.
    #[error("a {0} is required to unlock this file")]
    CredentialRequired(&'static str),

    /// Biometric unlock was requested for a file without an enrolled face.
    #[error("biometric unlock is not configured for this file")]
    BiometricNotConfigured,

    /// A single network-bound attempt failed in a way that may be retried.
    #[error("transient network failure: {0}")]
    TransientNetworkFailure(String),

    /// The retry schedule ran out; `source` is the last underlying failure, verbatim.
    #[error("request failed after {attempts} attempts: {source}")]
    ExhaustedRetries {
        /// Total attempts made, including the first one.
        attempts: u32,
        /// Failure returned by the final attempt.
        #[source]
        source: StoreError,
    },

    /// An exported key token could not be imported.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A persisted file record is internally inconsistent.
    #[error("invalid file record: {0}")]
    InvalidRecord(String),

    /// The operation does not apply to the file's protection mode.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The object or record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A permanent storage failure.
    #[error("storage failure: {0}")]
    Storage(String),

    /// The AEAD primitive failed while encrypting (unreachable with a valid key).
    #[error("encryption failure: {0}")]
    Crypto(String),
}

impl ProtectionError {
    /// Returns `true` if the user presented a wrong credential and may try again.
    pub fn is_retryable_credential(&self) -> bool {
        matches!(
            self,
            ProtectionError::WrongPassword | ProtectionError::BiometricMismatch
        )
    }

    /// Short message safe to show to an end user.
    ///
    /// Wrong credentials and corrupted data produce different texts.
    pub fn user_message(&self) -> &'static str {
        match self {
            ProtectionError::WrongPassword => "Wrong password, try again.",
            ProtectionError::BiometricMismatch => "Face not recognised, try again.",
            ProtectionError::DataCorruption => {
                "The file is corrupted and cannot be decrypted."
            }
            ProtectionError::BiometricNotConfigured => "Face unlock is not set up for this file.",
            ProtectionError::TransientNetworkFailure(_)
            | ProtectionError::ExhaustedRetries { .. } => {
                "The storage service is unreachable, try again later."
            }
            ProtectionError::NotFound(_) => "The file does not exist.",
            ProtectionError::CredentialRequired(_) => "This file is locked.",
            ProtectionError::InvalidDescriptor(_)
            | ProtectionError::InvalidKey(_)
            | ProtectionError::InvalidRecord(_)
            | ProtectionError::Unsupported(_)
            | ProtectionError::Storage(_)
            | ProtectionError::Crypto(_) => "The operation could not be completed.",
        }
    }
}

impl From<StoreError> for ProtectionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Transient(msg) => ProtectionError::TransientNetworkFailure(msg),
            StoreError::NotFound(msg) => ProtectionError::NotFound(msg),
            StoreError::Permanent(msg) => ProtectionError::Storage(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn credential_errors_are_distinct_from_corruption() {
        assert!(ProtectionError::WrongPassword.is_retryable_credential());
        assert!(ProtectionError::BiometricMismatch.is_retryable_credential());
        assert!(!ProtectionError::DataCorruption.is_retryable_credential());
        assert_ne!(
            ProtectionError::WrongPassword.user_message(),
            ProtectionError::DataCorruption.user_message()
        );
    }

    #[test]
    fn exhausted_retries_carries_last_cause() {
        let cause = StoreError::Transient("503 slow down".into());
        let e = ProtectionError::ExhaustedRetries {
            attempts: 4,
            source: cause.clone(),
        };
        assert!(e.to_string().contains("503 slow down"));
        let src = e.source().unwrap().downcast_ref::<StoreError>().unwrap();
        assert_eq!(src, &cause);
    }

    #[test]
    fn store_errors_map_by_kind() {
        assert!(matches!(
            ProtectionError::from(StoreError::Transient("x".into())),
            ProtectionError::TransientNetworkFailure(_)
        ));
        assert!(matches!(
            ProtectionError::from(StoreError::NotFound("x".into())),
            ProtectionError::NotFound(_)
        ));
        assert!(matches!(
            ProtectionError::from(StoreError::Permanent("x".into())),
            ProtectionError::Storage(_)
        ));
    }

    #[test]
    fn only_transient_store_errors_retry() {
        assert!(StoreError::Transient("x".into()).is_transient());
        assert!(!StoreError::NotFound("x".into()).is_transient());
        assert!(!StoreError::Permanent("x".into()).is_transient());
    }
}
