//! Observable history events
//!
//! Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

/// Observable events in the version-control engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Sequencing
    /// Baseline (version 0) materialized from live state
    BaselineCreated,
    /// New version persisted
    VersionCreated,
    /// Conditional create lost a numbering race
    VersionConflict,
    /// Retry budget exhausted
    VersionRetriesExhausted,
    /// Live record written after a version
    LiveStateWritten,
    /// Version persisted but live write failed; repair with restore_live_state
    LiveStateWriteFailed,

    // Rollback
    RollbackBegin,
    RollbackComplete,
    RollbackFailed,

    // Reads
    HistoryListed,
    VersionsCompared,

    // Crypto
    /// Authentication failure on a ciphertext or content hash
    DecryptFailed,
    /// Decrypt attempted without an unlocked session
    SessionLocked,
    RecordEncrypted,
    AccessGranted,
    AccessRevoked,

    // Access control
    PermissionDenied,

    // Purge
    HistoryPurged,
    PurgePartialFailure,

    // Audit
    AuditWriteFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BaselineCreated => "BASELINE_CREATED",
            Event::VersionCreated => "VERSION_CREATED",
            Event::VersionConflict => "VERSION_CONFLICT",
            Event::VersionRetriesExhausted => "VERSION_RETRIES_EXHAUSTED",
            Event::LiveStateWritten => "LIVE_STATE_WRITTEN",
            Event::LiveStateWriteFailed => "LIVE_STATE_WRITE_FAILED",
            Event::RollbackBegin => "ROLLBACK_BEGIN",
            Event::RollbackComplete => "ROLLBACK_COMPLETE",
            Event::RollbackFailed => "ROLLBACK_FAILED",
            Event::HistoryListed => "HISTORY_LISTED",
            Event::VersionsCompared => "VERSIONS_COMPARED",
            Event::DecryptFailed => "DECRYPT_FAILED",
            Event::SessionLocked => "SESSION_LOCKED",
            Event::RecordEncrypted => "RECORD_ENCRYPTED",
            Event::AccessGranted => "ACCESS_GRANTED",
            Event::AccessRevoked => "ACCESS_REVOKED",
            Event::PermissionDenied => "PERMISSION_DENIED",
            Event::HistoryPurged => "HISTORY_PURGED",
            Event::PurgePartialFailure => "PURGE_PARTIAL_FAILURE",
            Event::AuditWriteFailed => "AUDIT_WRITE_FAILED",
        }
    }

    /// Default severity when the event is logged.
    pub fn severity(&self) -> Severity {
        match self {
            Event::DecryptFailed | Event::LiveStateWriteFailed | Event::RollbackFailed => {
                Severity::Error
            }
            Event::VersionConflict
            | Event::VersionRetriesExhausted
            | Event::SessionLocked
            | Event::PermissionDenied
            | Event::PurgePartialFailure
            | Event::AuditWriteFailed => Severity::Warn,
            Event::HistoryListed | Event::LiveStateWritten => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
