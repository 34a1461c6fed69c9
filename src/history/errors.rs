//! # History Errors

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::store::StoreError;

/// Result type for history operations
pub type VersionResult<T> = Result<T, VersionError>;

/// Version-control errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// Record, version or key missing. Not retried.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The permissions collaborator refused the request.
    #[error("Permission denied: {user} may not {action} {record}")]
    PermissionDenied {
        user: String,
        action: &'static str,
        record: String,
    },

    /// No unlocked master key. The caller should prompt for re-authentication.
    #[error("Encryption session is locked")]
    EncryptionSessionLocked,

    /// Authentication failed on a ciphertext or content hash.
    #[error("Decryption integrity failure: {0}")]
    DecryptionIntegrity(String),

    /// Another writer took the version number. Retry the whole call.
    #[error("Version sequence conflict: {0}")]
    VersionSequenceConflict(String),

    /// A value could not be represented as a document.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Collaborator store failure.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl VersionError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            VersionError::NotFound(_) => "MEDVAULT_NOT_FOUND",
            VersionError::PermissionDenied { .. } => "MEDVAULT_PERMISSION_DENIED",
            VersionError::EncryptionSessionLocked => "MEDVAULT_SESSION_LOCKED",
            VersionError::DecryptionIntegrity(_) => "MEDVAULT_DECRYPTION_INTEGRITY",
            VersionError::VersionSequenceConflict(_) => "MEDVAULT_VERSION_CONFLICT",
            VersionError::Serialization(_) => "MEDVAULT_SERIALIZATION",
            VersionError::Store(_) => "MEDVAULT_STORE",
        }
    }

    /// Errors the caller can resolve: re-authenticate, or retry the call.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VersionError::EncryptionSessionLocked | VersionError::VersionSequenceConflict(_)
        )
    }

    pub(crate) fn permission_denied(user: &str, action: &'static str, record: &str) -> Self {
        VersionError::PermissionDenied {
            user: user.to_string(),
            action,
            record: record.to_string(),
        }
    }
}

impl From<CryptoError> for VersionError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::SessionLocked => VersionError::EncryptionSessionLocked,
            CryptoError::Integrity(msg) => VersionError::DecryptionIntegrity(msg),
            // Unusable key material cannot authenticate anything.
            CryptoError::InvalidKeyMaterial(msg) => VersionError::DecryptionIntegrity(msg),
            CryptoError::Encoding(msg) => VersionError::Serialization(msg),
        }
    }
}

impl From<StoreError> for VersionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => VersionError::NotFound(what),
            // The only conditional write is version creation.
            StoreError::AlreadyExists(id) => VersionError::VersionSequenceConflict(id),
            other => VersionError::Store(other),
        }
    }
}
