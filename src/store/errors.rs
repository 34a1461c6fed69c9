//! # Store Errors

use thiserror::Error;

/// Result type for collaborator store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Record, version and key store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Corrupt entry {0}: {1}")]
    Corrupt(String, String),
}

impl StoreError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "MEDVAULT_STORE_NOT_FOUND",
            StoreError::AlreadyExists(_) => "MEDVAULT_STORE_ALREADY_EXISTS",
            StoreError::InvalidId(_) => "MEDVAULT_STORE_INVALID_ID",
            StoreError::Io(_) => "MEDVAULT_STORE_IO",
            StoreError::Corrupt(_, _) => "MEDVAULT_STORE_CORRUPT",
        }
    }

    pub(crate) fn poisoned() -> Self {
        StoreError::Io("Lock poisoned".to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = [
            StoreError::NotFound("a".into()),
            StoreError::AlreadyExists("a".into()),
            StoreError::InvalidId("a".into()),
            StoreError::Io("a".into()),
            StoreError::Corrupt("a".into(), "b".into()),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_display() {
        let err = StoreError::Corrupt("r1_v2".into(), "eof".into());
        assert_eq!(err.to_string(), "Corrupt entry r1_v2: eof");
    }
}
