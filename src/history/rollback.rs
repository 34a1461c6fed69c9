//! RollbackCoordinator - restore a record to a historical version
//!
//! 1. Check `can_rollback`
//! 2. Decrypt the target snapshot
//! 3. Checkpoint the current live state as a new version,
//!    "Before restoring to version {N}"
//! 4. Write the target snapshot as the live state
//!
//! After step 4 the live record equals the target, while the chain head is
//! the checkpoint. They differ until the next `create_next_version`.
//! Callers that need "head == live" at all times call it right after.

use serde::Serialize;

use crate::crypto::SessionContext;
use crate::document::{Fields, RecordId};
use crate::observability::{AuditAction, AuditOutcome, AuditRecord, ObservationScope};
use crate::store::StoreError;

use super::context::HistoryContext;
use super::errors::{VersionError, VersionResult};
use super::sequencer::VersionSequencer;
use super::version::{VersionId, VersionNumber};

/// Outcome of a rollback.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoredState {
    pub record_id: RecordId,
    /// The version whose content is now live.
    pub restored_from: VersionId,
    pub restored_version_number: VersionNumber,
    /// The version snapshotting the pre-rollback live state.
    pub checkpoint_version: VersionId,
    /// The restored plaintext fields.
    pub fields: Fields,
}

/// Coordinates rollbacks through the sequencer.
#[derive(Clone)]
pub struct RollbackCoordinator {
    ctx: HistoryContext,
    sequencer: VersionSequencer,
}

impl RollbackCoordinator {
    pub(crate) fn new(ctx: HistoryContext, sequencer: VersionSequencer) -> Self {
        Self { ctx, sequencer }
    }

    pub fn rollback(
        &self,
        record_id: &RecordId,
        target: &VersionId,
        session: &SessionContext,
    ) -> VersionResult<RestoredState> {
        self.ctx.require_rollback(record_id, session)?;

        let scope = ObservationScope::new(
            "ROLLBACK",
            &[("record", record_id.as_str()), ("target", target.as_str())],
        );
        match self.rollback_authorized(record_id, target, session) {
            Ok(restored) => {
                scope.complete(&[("checkpoint", restored.checkpoint_version.as_str())]);
                self.ctx.metrics.increment_rollbacks();
                self.ctx.audit(
                    AuditRecord::new(
                        AuditAction::Rollback,
                        AuditOutcome::Success,
                        session.user_id(),
                        record_id.as_str(),
                    )
                    .with_version(target.as_str())
                    .with_detail(format!("checkpoint {}", restored.checkpoint_version)),
                );
                Ok(restored)
            }
            Err(err) => {
                scope.fail(err.code());
                self.ctx.audit(
                    AuditRecord::new(
                        AuditAction::Rollback,
                        AuditOutcome::Failed,
                        session.user_id(),
                        record_id.as_str(),
                    )
                    .with_version(target.as_str())
                    .with_detail(err.code()),
                );
                Err(err)
            }
        }
    }

    fn rollback_authorized(
        &self,
        record_id: &RecordId,
        target: &VersionId,
        session: &SessionContext,
    ) -> VersionResult<RestoredState> {
        let target_version = self.ctx.versions.get(target)?;
        if target_version.record_id() != record_id {
            return Err(VersionError::NotFound(format!(
                "{} is not a version of {}",
                target, record_id
            )));
        }

        // Checkpoint and live write must not interleave with other writers.
        let lock = self.sequencer.leases().lock_for(record_id)?;
        let _lease = lock
            .lock()
            .map_err(|_| VersionError::Store(StoreError::poisoned()))?;

        let live = self.ctx.records.get(record_id)?;
        let key = self.ctx.record_key(
            record_id,
            live.is_encrypted() || target_version.is_encrypted(),
            session,
        )?;
        let target_state = self.ctx.open_snapshot(&target_version, &key)?;
        let current_state = self.ctx.open_live(&live, &key)?;

        let number = target_version.version_number();
        let checkpoint = self.sequencer.create_locked(
            record_id,
            current_state,
            Some(format!("Before restoring to version {}", number)),
            session,
        )?;

        // The checkpoint rewrote the live record; re-read its stored form.
        let live = self.ctx.records.get(record_id)?;
        self.ctx.write_live(&live, &target_state, &key)?;

        Ok(RestoredState {
            record_id: record_id.clone(),
            restored_from: target.clone(),
            restored_version_number: number,
            checkpoint_version: checkpoint,
            fields: target_state,
        })
    }
}
