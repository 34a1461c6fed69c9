//! VersionSequencer - assigns version numbers and writes versions
//!
//! ## Write protocol
//! 1. Load the latest version; if none, materialize version 0 from the
//!    live record as it is persisted now
//! 2. Decrypt the latest snapshot and diff it against the new state
//! 3. Seal the changeset, the version snapshot and the live fields
//! 4. Conditionally create `{recordId}_v{n+1}`; a taken id is a conflict
//! 5. Write the live record
//!
//! A crash between 4 and 5 leaves a version the live record does not
//! reflect yet; `restore_live_state` repairs it.
//!
//! ## Invariants
//! - Version numbers per record are contiguous from 0
//! - A version is never overwritten
//! - At most one write per record is in flight in this process

use std::sync::Arc;

use crate::codec::{self, SnapshotSlot};
use crate::crypto::{RecordKey, SessionContext};
use crate::diff::{commit_message, diff_fields};
use crate::document::{Fields, RecordId, StoredRecord};
use crate::observability::{log_event, AuditAction, AuditOutcome, AuditRecord, Event};

use super::context::{HistoryContext, RecordLeases};
use super::errors::{VersionError, VersionResult};
use super::version::{StoredVersion, VersionId, VersionNumber};

/// Creates versions for records.
#[derive(Clone)]
pub struct VersionSequencer {
    ctx: HistoryContext,
    leases: Arc<RecordLeases>,
}

impl VersionSequencer {
    pub(crate) fn new(ctx: HistoryContext) -> Self {
        Self {
            ctx,
            leases: Arc::new(RecordLeases::default()),
        }
    }

    pub(crate) fn leases(&self) -> &RecordLeases {
        &self.leases
    }

    /// Record `new_state` as the next version of `record_id`.
    ///
    /// `message` overrides the generated commit message. A
    /// `VersionSequenceConflict` means another writer won the number;
    /// retry the whole call.
    pub fn create_next_version(
        &self,
        record_id: &RecordId,
        new_state: Fields,
        message: Option<String>,
        session: &SessionContext,
    ) -> VersionResult<VersionId> {
        let lock = self.leases.lock_for(record_id)?;
        let _lease = lock
            .lock()
            .map_err(|_| VersionError::Store(crate::store::StoreError::poisoned()))?;
        self.create_locked(record_id, new_state, message, session)
    }

    /// `create_next_version`, retried on conflict up to the configured limit.
    pub fn create_next_version_with_retry(
        &self,
        record_id: &RecordId,
        new_state: Fields,
        message: Option<String>,
        session: &SessionContext,
    ) -> VersionResult<VersionId> {
        let retries = self.ctx.config.max_conflict_retries;
        let mut attempt = 0;
        loop {
            match self.create_next_version(record_id, new_state.clone(), message.clone(), session) {
                Err(VersionError::VersionSequenceConflict(id)) if attempt < retries => {
                    attempt += 1;
                    log_event(
                        Event::VersionConflict,
                        &[
                            ("attempt", attempt.to_string().as_str()),
                            ("record", record_id.as_str()),
                            ("version", id.as_str()),
                        ],
                    );
                }
                Err(VersionError::VersionSequenceConflict(id)) => {
                    log_event(
                        Event::VersionRetriesExhausted,
                        &[
                            ("attempts", (attempt + 1).to_string().as_str()),
                            ("record", record_id.as_str()),
                        ],
                    );
                    return Err(VersionError::VersionSequenceConflict(id));
                }
                other => return other,
            }
        }
    }

    /// Body of `create_next_version`; the caller holds the record lease.
    pub(crate) fn create_locked(
        &self,
        record_id: &RecordId,
        new_state: Fields,
        message: Option<String>,
        session: &SessionContext,
    ) -> VersionResult<VersionId> {
        let live = self.ctx.records.get(record_id)?;
        let key = self.ctx.record_key(record_id, live.is_encrypted(), session)?;

        let (previous_number, previous_state) = match self.ctx.versions.latest(record_id)? {
            Some(latest) => {
                let state = self.ctx.open_snapshot(&latest, &key)?;
                (latest.version_number(), state)
            }
            None => self.create_baseline(&live, &key, session)?,
        };

        let changes = diff_fields(&previous_state, &new_state);
        let message = match message {
            Some(message) => message,
            None if changes.is_empty() => self.ctx.config.no_changes_message.clone(),
            None => commit_message(&changes),
        };

        let number = previous_number.next();
        let change_count = changes.len();
        let payload = if changes.is_empty() {
            None
        } else {
            Some(codec::protect_changes(changes, record_id, number.value(), &key)?)
        };
        let snapshot =
            codec::protect(&new_state, record_id, SnapshotSlot::Version(number.value()), &key)?;
        let live_fields = codec::protect(&new_state, record_id, SnapshotSlot::Live, &key)?;
        let content_hash = codec::content_hash(&new_state)?;

        let version = StoredVersion::new(
            record_id.clone(),
            number,
            session.user_id(),
            message,
            content_hash,
            change_count,
            payload,
            snapshot,
        );
        self.persist(&version)?;

        let updated = StoredRecord {
            id: live.id.clone(),
            owner_id: live.owner_id.clone(),
            fields: live_fields,
        };
        if let Err(e) = self.ctx.records.put(&updated) {
            let reason = e.to_string();
            log_event(
                Event::LiveStateWriteFailed,
                &[
                    ("reason", reason.as_str()),
                    ("record", record_id.as_str()),
                    ("version", version.id().as_str()),
                ],
            );
            return Err(e.into());
        }

        if change_count == 0 {
            self.ctx.metrics.increment_empty_versions();
        }
        log_event(
            Event::VersionCreated,
            &[
                ("changes", change_count.to_string().as_str()),
                ("record", record_id.as_str()),
                ("version", version.id().as_str()),
            ],
        );
        self.ctx.audit(
            AuditRecord::new(
                AuditAction::VersionCreated,
                AuditOutcome::Success,
                session.user_id(),
                record_id.as_str(),
            )
            .with_version(version.id().as_str()),
        );

        Ok(version.id().clone())
    }

    /// Materialize version 0 from the persisted live state.
    fn create_baseline(
        &self,
        live: &StoredRecord,
        key: &RecordKey,
        session: &SessionContext,
    ) -> VersionResult<(VersionNumber, Fields)> {
        let state = self.ctx.open_live(live, key)?;
        let baseline = StoredVersion::new(
            live.id.clone(),
            VersionNumber::BASELINE,
            session.user_id(),
            self.ctx.config.baseline_message.clone(),
            codec::content_hash(&state)?,
            0,
            None,
            codec::protect(
                &state,
                &live.id,
                SnapshotSlot::Version(VersionNumber::BASELINE.value()),
                key,
            )?,
        );
        self.persist(&baseline)?;

        self.ctx.metrics.increment_baselines();
        log_event(
            Event::BaselineCreated,
            &[("record", live.id.as_str()), ("version", baseline.id().as_str())],
        );
        Ok((VersionNumber::BASELINE, state))
    }

    /// Conditional create; a taken id surfaces as a conflict.
    fn persist(&self, version: &StoredVersion) -> VersionResult<()> {
        match self.ctx.versions.create(version) {
            Ok(()) => {
                self.ctx.metrics.increment_versions_created();
                Ok(())
            }
            Err(e) => {
                let err = VersionError::from(e);
                if let VersionError::VersionSequenceConflict(_) = err {
                    self.ctx.metrics.increment_conflicts();
                    log_event(
                        Event::VersionConflict,
                        &[
                            ("record", version.record_id().as_str()),
                            ("version", version.id().as_str()),
                        ],
                    );
                }
                Err(err)
            }
        }
    }

    /// Re-apply the latest version to the live record.
    ///
    /// Repairs a crash between persisting a version and writing the live
    /// state. Idempotent. `version_id` must be the record's latest version;
    /// anything older is refused as a conflict so history cannot be
    /// bypassed without a checkpoint.
    pub fn restore_live_state(
        &self,
        record_id: &RecordId,
        version_id: &VersionId,
        session: &SessionContext,
    ) -> VersionResult<()> {
        let lock = self.leases.lock_for(record_id)?;
        let _lease = lock
            .lock()
            .map_err(|_| VersionError::Store(crate::store::StoreError::poisoned()))?;

        let latest = self
            .ctx
            .versions
            .latest(record_id)?
            .ok_or_else(|| VersionError::NotFound(format!("versions of {}", record_id)))?;
        if latest.id() != version_id {
            return Err(VersionError::VersionSequenceConflict(format!(
                "{} is not the latest version of {} ({})",
                version_id,
                record_id,
                latest.id()
            )));
        }

        let live = self.ctx.records.get(record_id)?;
        let key = self.ctx.record_key(
            record_id,
            live.is_encrypted() || latest.is_encrypted(),
            session,
        )?;
        let state = self.ctx.open_snapshot(&latest, &key)?;
        self.ctx.write_live(&live, &state, &key)
    }
}
