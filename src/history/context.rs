//! Shared collaborators and helpers for the history components.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::codec::{self, SnapshotSlot};
use crate::config::HistoryConfig;
use crate::crypto::{unwrap_key, KeyWrapping, RecordKey, SessionContext};
use crate::document::{Fields, RecordId, StoredRecord};
use crate::observability::{
    audit, log_event, AuditAction, AuditLog, AuditOutcome, AuditRecord, Event, HistoryMetrics,
};
use crate::store::{KeyStore, Permissions, RecordStore, StoreError, VersionStore};

use super::errors::{VersionError, VersionResult};
use super::version::StoredVersion;

/// Collaborators and policy shared by every component of one history.
#[derive(Clone)]
pub(crate) struct HistoryContext {
    pub records: Arc<dyn RecordStore>,
    pub versions: Arc<dyn VersionStore>,
    pub keys: Arc<dyn KeyStore>,
    pub permissions: Arc<dyn Permissions>,
    pub audit_log: Arc<dyn AuditLog>,
    pub metrics: Arc<HistoryMetrics>,
    pub config: Arc<HistoryConfig>,
}

impl HistoryContext {
    /// Resolve the key for a record.
    ///
    /// Plaintext records need no session. For encrypted ones the session is
    /// checked before any store or ciphertext access.
    pub fn record_key(
        &self,
        record_id: &RecordId,
        encrypted: bool,
        session: &SessionContext,
    ) -> VersionResult<RecordKey> {
        if !encrypted {
            return Ok(RecordKey::Plaintext);
        }
        if let Err(e) = session.master_key() {
            return Err(self.observe(record_id, e.into()));
        }

        let wrapped = self
            .keys
            .wrapped_key(record_id, session.user_id())?
            .ok_or_else(|| {
                VersionError::NotFound(format!("key for {} held by {}", record_id, session.user_id()))
            })?;

        let identity = match wrapped.wrapping {
            KeyWrapping::Owner { .. } => None,
            KeyWrapping::Shared { .. } => self.keys.share_identity(session.user_id())?,
        };

        unwrap_key(&wrapped, session, identity.as_ref())
            .map(RecordKey::Data)
            .map_err(|e| self.observe(record_id, e.into()))
    }

    /// Decrypt a version snapshot, verifying its content hash when enabled.
    pub fn open_snapshot(&self, version: &StoredVersion, key: &RecordKey) -> VersionResult<Fields> {
        let fields = codec::reveal(
            version.snapshot(),
            version.record_id(),
            SnapshotSlot::Version(version.version_number().value()),
            key,
        )
            .map_err(|e| self.observe(version.record_id(), e.into()))?;

        if self.config.verify_content_hash {
            codec::verify_content_hash(&fields, version.content_hash())
                .map_err(|e| self.observe(version.record_id(), e.into()))?;
        }
        Ok(fields)
    }

    /// Decrypt the live record.
    pub fn open_live(&self, record: &StoredRecord, key: &RecordKey) -> VersionResult<Fields> {
        codec::reveal(&record.fields, &record.id, SnapshotSlot::Live, key)
            .map_err(|e| self.observe(&record.id, e.into()))
    }

    /// Write `fields` as the live state, sealed to match the record.
    pub fn write_live(
        &self,
        live: &StoredRecord,
        fields: &Fields,
        key: &RecordKey,
    ) -> VersionResult<()> {
        let stored = if live.is_encrypted() {
            codec::protect(fields, &live.id, SnapshotSlot::Live, key)?
        } else {
            codec::protect(fields, &live.id, SnapshotSlot::Live, &RecordKey::Plaintext)?
        };

        let updated = StoredRecord {
            id: live.id.clone(),
            owner_id: live.owner_id.clone(),
            fields: stored,
        };
        self.records.put(&updated).map_err(|e| {
            let reason = e.to_string();
            log_event(
                Event::LiveStateWriteFailed,
                &[("record", live.id.as_str()), ("reason", reason.as_str())],
            );
            VersionError::from(e)
        })?;
        log_event(Event::LiveStateWritten, &[("record", live.id.as_str())]);
        Ok(())
    }

    /// Gate a read of history. Denials are logged and audited.
    pub fn require_view(
        &self,
        record_id: &RecordId,
        session: &SessionContext,
        action: AuditAction,
    ) -> VersionResult<()> {
        if self.permissions.can_view_history(record_id, session.user_id()) {
            return Ok(());
        }
        Err(self.deny(record_id, session, action, "view history of"))
    }

    /// Gate a rollback. Denials are logged and audited.
    pub fn require_rollback(&self, record_id: &RecordId, session: &SessionContext) -> VersionResult<()> {
        if self.permissions.can_rollback(record_id, session.user_id()) {
            return Ok(());
        }
        Err(self.deny(record_id, session, AuditAction::Rollback, "roll back"))
    }

    pub fn deny(
        &self,
        record_id: &RecordId,
        session: &SessionContext,
        action: AuditAction,
        verb: &'static str,
    ) -> VersionError {
        self.metrics.increment_permission_denials();
        log_event(
            Event::PermissionDenied,
            &[
                ("action", action.as_str()),
                ("record", record_id.as_str()),
                ("user", session.user_id()),
            ],
        );
        self.audit(
            AuditRecord::new(action, AuditOutcome::Denied, session.user_id(), record_id.as_str()),
        );
        VersionError::permission_denied(session.user_id(), verb, record_id.as_str())
    }

    pub fn audit(&self, record: AuditRecord) {
        audit(self.audit_log.as_ref(), record);
    }

    /// Count and log crypto failures on their way out.
    pub fn observe(&self, record_id: &RecordId, err: VersionError) -> VersionError {
        match &err {
            VersionError::DecryptionIntegrity(reason) => {
                self.metrics.increment_integrity_failures();
                log_event(
                    Event::DecryptFailed,
                    &[("record", record_id.as_str()), ("reason", reason.as_str())],
                );
            }
            VersionError::EncryptionSessionLocked => {
                self.metrics.increment_session_locked();
                log_event(Event::SessionLocked, &[("record", record_id.as_str())]);
            }
            _ => {}
        }
        err
    }
}

/// Per-record in-process leases: at most one writer per record.
#[derive(Debug, Default)]
pub(crate) struct RecordLeases {
    locks: Mutex<HashMap<RecordId, Arc<Mutex<()>>>>,
}

impl RecordLeases {
    /// The lock for `record_id`. Hold its guard for the whole write.
    pub fn lock_for(&self, record_id: &RecordId) -> VersionResult<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| VersionError::Store(StoreError::poisoned()))?;
        // Entries only the map references are idle.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(Arc::clone(
            locks
                .entry(record_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        ))
    }
}
