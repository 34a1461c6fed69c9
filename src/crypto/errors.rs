//! # Crypto Errors

use thiserror::Error;

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Key custody and AEAD errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// No unlocked master key in the session (never unlocked, logged out,
    /// or idle timeout elapsed)
    #[error("Encryption session is locked")]
    SessionLocked,

    /// Authentication failed: wrong key, wrong context, or tampered data
    #[error("Decryption failed integrity check: {0}")]
    Integrity(String),

    /// Key material is malformed or does not belong to the requester
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Plaintext could not be encoded or decoded
    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl CryptoError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            CryptoError::SessionLocked => "MEDVAULT_SESSION_LOCKED",
            CryptoError::Integrity(_) => "MEDVAULT_DECRYPTION_INTEGRITY",
            CryptoError::InvalidKeyMaterial(_) => "MEDVAULT_INVALID_KEY",
            CryptoError::Encoding(_) => "MEDVAULT_ENCODING",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CryptoError::SessionLocked.code(), "MEDVAULT_SESSION_LOCKED");
        assert_eq!(
            CryptoError::Integrity("x".into()).code(),
            "MEDVAULT_DECRYPTION_INTEGRITY"
        );
    }

    #[test]
    fn test_integrity_message_does_not_echo_key() {
        let err = CryptoError::Integrity("snapshot field".to_string());
        assert!(err.to_string().contains("integrity"));
    }
}
