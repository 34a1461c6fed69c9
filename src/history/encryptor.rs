//! RecordEncryptor - turns on encryption for a record and manages access
//!
//! Encrypting a record generates its DEK, stores the owner wrapping and
//! seals the live fields. Versions written before that stay plaintext;
//! every version written after is sealed.

use crate::codec::{self, SnapshotSlot};
use crate::crypto::{
    generate_share_identity, wrap_for_owner, wrap_for_share, DataKey, RecordKey, SessionContext,
    ShareIdentity,
};
use crate::document::{RecordFields, RecordId, StoredRecord};
use crate::observability::{log_event, AuditAction, AuditOutcome, AuditRecord, Event};
use crate::store::StoreError;

use super::context::HistoryContext;
use super::errors::{VersionError, VersionResult};
use super::sequencer::VersionSequencer;

#[derive(Clone)]
pub struct RecordEncryptor {
    ctx: HistoryContext,
    sequencer: VersionSequencer,
}

impl RecordEncryptor {
    pub(crate) fn new(ctx: HistoryContext, sequencer: VersionSequencer) -> Self {
        Self { ctx, sequencer }
    }

    /// Encrypt a plaintext record with a fresh DEK. Owner only.
    ///
    /// Returns `false` if the record was already encrypted.
    pub fn encrypt_record(&self, record_id: &RecordId, session: &SessionContext) -> VersionResult<bool> {
        session.master_key()?;

        let lock = self.sequencer.leases().lock_for(record_id)?;
        let _lease = lock
            .lock()
            .map_err(|_| VersionError::Store(StoreError::poisoned()))?;

        let live = self.require_owner(record_id, session, AuditAction::RecordEncrypted, "encrypt")?;
        let plain = match &live.fields {
            RecordFields::Encrypted(_) => return Ok(false),
            RecordFields::Plain(fields) => fields.clone(),
        };

        let dek = DataKey::generate();
        let wrapped = wrap_for_owner(&dek, record_id, session)?;
        self.ctx.keys.put_wrapped_key(&wrapped)?;

        let sealed = codec::protect(&plain, record_id, SnapshotSlot::Live, &RecordKey::Data(dek))?;
        self.ctx.records.put(&StoredRecord {
            id: live.id.clone(),
            owner_id: live.owner_id.clone(),
            fields: sealed,
        })?;

        log_event(
            Event::RecordEncrypted,
            &[("record", record_id.as_str()), ("user", session.user_id())],
        );
        self.ctx.audit(AuditRecord::new(
            AuditAction::RecordEncrypted,
            AuditOutcome::Success,
            session.user_id(),
            record_id.as_str(),
        ));
        Ok(true)
    }

    /// Generate and store a sharing keypair for the session user.
    pub fn publish_share_identity(&self, session: &SessionContext) -> VersionResult<ShareIdentity> {
        let identity = generate_share_identity(session)?;
        self.ctx.keys.put_share_identity(&identity)?;
        Ok(identity)
    }

    /// Give `recipient` access to an encrypted record's DEK.
    ///
    /// Only the record owner may grant. The recipient must have published
    /// a share identity.
    pub fn grant_access(
        &self,
        record_id: &RecordId,
        recipient: &str,
        session: &SessionContext,
    ) -> VersionResult<()> {
        let live = self.require_owner(record_id, session, AuditAction::AccessGranted, "grant access to")?;
        let dek = match self.ctx.record_key(record_id, live.is_encrypted(), session)? {
            RecordKey::Data(dek) => dek,
            RecordKey::Plaintext => {
                return Err(VersionError::NotFound(format!("{} is not encrypted", record_id)))
            }
        };

        let identity = self
            .ctx
            .keys
            .share_identity(recipient)?
            .ok_or_else(|| VersionError::NotFound(format!("share identity of {}", recipient)))?;
        let wrapped = wrap_for_share(&dek, record_id, &identity)?;
        self.ctx.keys.put_wrapped_key(&wrapped)?;

        log_event(
            Event::AccessGranted,
            &[("record", record_id.as_str()), ("recipient", recipient)],
        );
        self.ctx.audit(
            AuditRecord::new(
                AuditAction::AccessGranted,
                AuditOutcome::Success,
                session.user_id(),
                record_id.as_str(),
            )
            .with_detail(recipient),
        );
        Ok(())
    }

    /// Invalidate `user`'s wrapping of the record DEK.
    ///
    /// Only the owner may revoke, and never their own wrapping.
    pub fn revoke_access(
        &self,
        record_id: &RecordId,
        user: &str,
        session: &SessionContext,
    ) -> VersionResult<()> {
        let live = self.require_owner(record_id, session, AuditAction::AccessRevoked, "revoke access to")?;
        if live.owner_id == user {
            return Err(VersionError::permission_denied(
                session.user_id(),
                "revoke the owner's access to",
                record_id.as_str(),
            ));
        }
        self.ctx.keys.revoke(record_id, user)?;

        log_event(
            Event::AccessRevoked,
            &[("record", record_id.as_str()), ("user", user)],
        );
        self.ctx.audit(
            AuditRecord::new(
                AuditAction::AccessRevoked,
                AuditOutcome::Success,
                session.user_id(),
                record_id.as_str(),
            )
            .with_detail(user),
        );
        Ok(())
    }

    fn require_owner(
        &self,
        record_id: &RecordId,
        session: &SessionContext,
        action: AuditAction,
        verb: &'static str,
    ) -> VersionResult<StoredRecord> {
        let live = self.ctx.records.get(record_id)?;
        if live.owner_id != session.user_id() {
            return Err(self.ctx.deny(record_id, session, action, verb));
        }
        Ok(live)
    }
}
