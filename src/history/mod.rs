//! # Version History
//!
//! Append-only, encrypted, content-addressed version chains for records.
//!
//! Components:
//! - `VersionSequencer` - numbering, baseline, two-phase write
//! - `RollbackCoordinator` - restore with a checkpoint version
//! - `Comparator` - full diff between any two versions
//! - `RecordEncryptor` - DEK creation and access grants
//!
//! `VersionHistory` bundles them over one set of collaborators.

mod comparator;
mod context;
mod encryptor;
mod errors;
mod rollback;
mod sequencer;
mod version;

pub use comparator::{Comparator, Comparison};
pub use encryptor::RecordEncryptor;
pub use errors::{VersionError, VersionResult};
pub use rollback::{RestoredState, RollbackCoordinator};
pub use sequencer::VersionSequencer;
pub use version::{StoredVersion, VersionId, VersionNumber, VersionSummary};

use std::sync::Arc;

use crate::codec;
use crate::config::{ConfigError, HistoryConfig};
use crate::crypto::{MasterKey, SessionContext, ShareIdentity};
use crate::diff::Change;
use crate::document::{Fields, RecordId};
use crate::observability::{
    log_event, AuditAction, AuditLog, AuditOutcome, AuditRecord, Event, FileAuditLog,
    HistoryMetrics, MetricsSnapshot, NullAuditLog,
};
use crate::store::{KeyStore, Permissions, PurgeReport, RecordStore, VersionStore};

use context::HistoryContext;

/// Builder for `VersionHistory`.
pub struct VersionHistoryBuilder {
    records: Arc<dyn RecordStore>,
    versions: Arc<dyn VersionStore>,
    keys: Arc<dyn KeyStore>,
    permissions: Arc<dyn Permissions>,
    audit_log: Option<Arc<dyn AuditLog>>,
    config: HistoryConfig,
}

impl VersionHistoryBuilder {
    pub fn config(mut self, config: HistoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `audit_log` instead of the one named in the config.
    pub fn audit_log(mut self, audit_log: Arc<dyn AuditLog>) -> Self {
        self.audit_log = Some(audit_log);
        self
    }

    /// Fails on an invalid config or an audit log file that cannot be opened.
    pub fn build(self) -> Result<VersionHistory, ConfigError> {
        self.config.validate()?;

        let audit_log: Arc<dyn AuditLog> = match (self.audit_log, &self.config.audit_log_path) {
            (Some(log), _) => log,
            (None, Some(path)) => Arc::new(
                FileAuditLog::open(path).map_err(|e| ConfigError::Io(path.clone(), e.to_string()))?,
            ),
            (None, None) => Arc::new(NullAuditLog),
        };

        let ctx = HistoryContext {
            records: self.records,
            versions: self.versions,
            keys: self.keys,
            permissions: self.permissions,
            audit_log,
            metrics: Arc::new(HistoryMetrics::new()),
            config: Arc::new(self.config),
        };

        let sequencer = VersionSequencer::new(ctx.clone());
        Ok(VersionHistory {
            rollback: RollbackCoordinator::new(ctx.clone(), sequencer.clone()),
            comparator: Comparator::new(ctx.clone()),
            encryptor: RecordEncryptor::new(ctx.clone(), sequencer.clone()),
            sequencer,
            ctx,
        })
    }
}

/// Facade over the history components and their collaborators.
#[derive(Clone)]
pub struct VersionHistory {
    ctx: HistoryContext,
    sequencer: VersionSequencer,
    rollback: RollbackCoordinator,
    comparator: Comparator,
    encryptor: RecordEncryptor,
}

impl VersionHistory {
    pub fn builder(
        records: Arc<dyn RecordStore>,
        versions: Arc<dyn VersionStore>,
        keys: Arc<dyn KeyStore>,
        permissions: Arc<dyn Permissions>,
    ) -> VersionHistoryBuilder {
        VersionHistoryBuilder {
            records,
            versions,
            keys,
            permissions,
            audit_log: None,
            config: HistoryConfig::default(),
        }
    }

    pub fn sequencer(&self) -> &VersionSequencer {
        &self.sequencer
    }

    pub fn encryptor(&self) -> &RecordEncryptor {
        &self.encryptor
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.ctx.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// A session for `user_id` with the configured idle timeout.
    pub fn open_session(&self, user_id: impl Into<String>, master_key: MasterKey) -> SessionContext {
        SessionContext::unlocked(user_id, master_key)
            .with_idle_timeout(self.ctx.config.session_idle_timeout())
    }

    /// See `VersionSequencer::create_next_version`.
    pub fn create_next_version(
        &self,
        record_id: &RecordId,
        new_state: Fields,
        message: Option<String>,
        session: &SessionContext,
    ) -> VersionResult<VersionId> {
        self.sequencer
            .create_next_version(record_id, new_state, message, session)
    }

    /// See `VersionSequencer::create_next_version_with_retry`.
    pub fn create_next_version_with_retry(
        &self,
        record_id: &RecordId,
        new_state: Fields,
        message: Option<String>,
        session: &SessionContext,
    ) -> VersionResult<VersionId> {
        self.sequencer
            .create_next_version_with_retry(record_id, new_state, message, session)
    }

    /// See `VersionSequencer::restore_live_state`.
    pub fn restore_live_state(
        &self,
        record_id: &RecordId,
        version_id: &VersionId,
        session: &SessionContext,
    ) -> VersionResult<()> {
        self.sequencer
            .restore_live_state(record_id, version_id, session)
    }

    /// See `RollbackCoordinator::rollback`.
    pub fn rollback(
        &self,
        record_id: &RecordId,
        target: &VersionId,
        session: &SessionContext,
    ) -> VersionResult<RestoredState> {
        self.rollback.rollback(record_id, target, session)
    }

    /// See `Comparator::compare`.
    pub fn compare(
        &self,
        a: &VersionId,
        b: &VersionId,
        session: &SessionContext,
    ) -> VersionResult<Comparison> {
        self.comparator.compare(a, b, session)
    }

    /// See `RecordEncryptor::encrypt_record`.
    pub fn encrypt_record(&self, record_id: &RecordId, session: &SessionContext) -> VersionResult<bool> {
        self.encryptor.encrypt_record(record_id, session)
    }

    pub fn publish_share_identity(&self, session: &SessionContext) -> VersionResult<ShareIdentity> {
        self.encryptor.publish_share_identity(session)
    }

    /// See `RecordEncryptor::grant_access`.
    pub fn grant_access(
        &self,
        record_id: &RecordId,
        recipient: &str,
        session: &SessionContext,
    ) -> VersionResult<()> {
        self.encryptor.grant_access(record_id, recipient, session)
    }

    /// See `RecordEncryptor::revoke_access`.
    pub fn revoke_access(
        &self,
        record_id: &RecordId,
        user: &str,
        session: &SessionContext,
    ) -> VersionResult<()> {
        self.encryptor.revoke_access(record_id, user, session)
    }

    /// Version metadata, newest first. Nothing is decrypted.
    pub fn list_history(
        &self,
        record_id: &RecordId,
        session: &SessionContext,
    ) -> VersionResult<Vec<VersionSummary>> {
        self.ctx
            .require_view(record_id, session, AuditAction::HistoryViewed)?;
        let summaries: Vec<VersionSummary> = self
            .ctx
            .versions
            .query(record_id)?
            .iter()
            .map(StoredVersion::summary)
            .collect();

        log_event(
            Event::HistoryListed,
            &[
                ("record", record_id.as_str()),
                ("versions", summaries.len().to_string().as_str()),
            ],
        );
        self.ctx.audit(AuditRecord::new(
            AuditAction::HistoryViewed,
            AuditOutcome::Success,
            session.user_id(),
            record_id.as_str(),
        ));
        Ok(summaries)
    }

    /// Decrypted snapshot of one version, for display.
    pub fn version_state(
        &self,
        version_id: &VersionId,
        session: &SessionContext,
    ) -> VersionResult<Fields> {
        let version = self.ctx.versions.get(version_id)?;
        self.ctx
            .require_view(version.record_id(), session, AuditAction::VersionViewed)?;

        let key = self
            .ctx
            .record_key(version.record_id(), version.is_encrypted(), session)?;
        let fields = self.ctx.open_snapshot(&version, &key)?;

        self.ctx.audit(
            AuditRecord::new(
                AuditAction::VersionViewed,
                AuditOutcome::Success,
                session.user_id(),
                version.record_id().as_str(),
            )
            .with_version(version_id.as_str()),
        );
        Ok(fields)
    }

    /// Decrypted per-step changeset of one version. Empty for version 0
    /// and for edits that changed nothing.
    pub fn version_changes(
        &self,
        version_id: &VersionId,
        session: &SessionContext,
    ) -> VersionResult<Vec<Change>> {
        let version = self.ctx.versions.get(version_id)?;
        self.ctx
            .require_view(version.record_id(), session, AuditAction::VersionViewed)?;

        let Some(payload) = version.changes() else {
            return Ok(Vec::new());
        };
        let encrypted = matches!(payload, codec::ChangeSetPayload::Encrypted(_));
        let key = self
            .ctx
            .record_key(version.record_id(), encrypted, session)?;
        codec::reveal_changes(
            payload,
            version.record_id(),
            version.version_number().value(),
            &key,
        )
        .map_err(|e| self.ctx.observe(version.record_id(), e.into()))
    }

    /// Delete every version of a record. Never fails; failures are logged
    /// and returned in the report.
    pub fn purge_history(&self, record_id: &RecordId) -> PurgeReport {
        let report = self.ctx.versions.delete_all(record_id);

        self.ctx.metrics.add_versions_purged(report.deleted as u64);
        self.ctx
            .metrics
            .add_purge_failures(report.failures.len() as u64);
        for failure in &report.failures {
            let version = failure
                .version_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "*".to_string());
            let reason = failure.error.to_string();
            log_event(
                Event::PurgePartialFailure,
                &[
                    ("reason", reason.as_str()),
                    ("record", record_id.as_str()),
                    ("version", version.as_str()),
                ],
            );
        }

        let deleted = report.deleted.to_string();
        log_event(
            Event::HistoryPurged,
            &[("deleted", deleted.as_str()), ("record", record_id.as_str())],
        );
        let outcome = if report.is_complete() {
            AuditOutcome::Success
        } else {
            AuditOutcome::Failed
        };
        self.ctx.audit(
            AuditRecord::new(AuditAction::HistoryPurged, outcome, "system", record_id.as_str())
                .with_detail(format!(
                    "deleted {}, failed {}",
                    report.deleted,
                    report.failures.len()
                )),
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::StoredRecord;
    use crate::observability::MemoryAuditLog;
    use crate::store::{MemoryKeyStore, MemoryRecordStore, MemoryVersionStore, StaticPermissions};
    use serde_json::json;

    fn fields(title: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("title".to_string(), json!(title));
        fields
    }

    fn setup(permissions: StaticPermissions) -> (VersionHistory, Arc<MemoryAuditLog>, RecordId) {
        let records = Arc::new(MemoryRecordStore::new());
        let record_id = RecordId::from("r1");
        records
            .put(&StoredRecord::plain(record_id.clone(), "alice", fields("Visit A")))
            .unwrap();

        let audit = Arc::new(MemoryAuditLog::new());
        let history = VersionHistory::builder(
            records,
            Arc::new(MemoryVersionStore::new()),
            Arc::new(MemoryKeyStore::new()),
            Arc::new(permissions),
        )
        .audit_log(audit.clone())
        .build()
        .unwrap();
        (history, audit, record_id)
    }

    fn session(history: &VersionHistory, user: &str) -> SessionContext {
        history.open_session(user, MasterKey::generate())
    }

    #[test]
    fn test_first_edit_creates_baseline_and_v1() {
        let (history, _, record_id) = setup(StaticPermissions::allow_all());
        let alice = session(&history, "alice");

        let id = history
            .create_next_version(&record_id, fields("Visit B"), None, &alice)
            .unwrap();
        assert_eq!(id.as_str(), "r1_v1");

        let listed = history.list_history(&record_id, &alice).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].version_number, VersionNumber::new(1));
        assert_eq!(listed[1].message, "baseline");
        assert_eq!(listed[0].message, "Changed title from \"Visit A\" to \"Visit B\"");

        let metrics = history.metrics();
        assert_eq!(metrics.versions_created, 2);
        assert_eq!(metrics.baselines_created, 1);
    }

    #[test]
    fn test_empty_edit_still_recorded() {
        let (history, _, record_id) = setup(StaticPermissions::allow_all());
        let alice = session(&history, "alice");

        let id = history
            .create_next_version(&record_id, fields("Visit A"), None, &alice)
            .unwrap();
        let listed = history.list_history(&record_id, &alice).unwrap();
        assert_eq!(listed[0].id, id);
        assert_eq!(listed[0].message, "No changes detected");
        assert_eq!(listed[0].change_count, 0);
        assert!(history.version_changes(&id, &alice).unwrap().is_empty());
        assert_eq!(history.metrics().empty_versions, 1);
    }

    #[test]
    fn test_explicit_message_wins() {
        let (history, _, record_id) = setup(StaticPermissions::allow_all());
        let alice = session(&history, "alice");
        let id = history
            .create_next_version(&record_id, fields("Visit B"), Some("retitle".to_string()), &alice)
            .unwrap();
        let listed = history.list_history(&record_id, &alice).unwrap();
        assert_eq!(listed[0].id, id);
        assert_eq!(listed[0].message, "retitle");
    }

    #[test]
    fn test_missing_record_is_not_found() {
        let (history, _, _) = setup(StaticPermissions::allow_all());
        let alice = session(&history, "alice");
        let err = history
            .create_next_version(&RecordId::from("nope"), fields("x"), None, &alice)
            .unwrap_err();
        assert!(matches!(err, VersionError::NotFound(_)));
    }

    #[test]
    fn test_view_denied_is_audited() {
        let (history, audit, record_id) = setup(StaticPermissions::deny_all());
        let bob = session(&history, "bob");

        let err = history.list_history(&record_id, &bob).unwrap_err();
        assert!(matches!(err, VersionError::PermissionDenied { .. }));

        let denied = audit.records_for(AuditAction::HistoryViewed);
        assert_eq!(denied.len(), 1);
        assert_eq!(denied[0].outcome, AuditOutcome::Denied);
        assert_eq!(history.metrics().permission_denials, 1);
    }

    #[test]
    fn test_version_state_plaintext() {
        let (history, _, record_id) = setup(StaticPermissions::allow_all());
        let alice = session(&history, "alice");
        history
            .create_next_version(&record_id, fields("Visit B"), None, &alice)
            .unwrap();

        let v0 = VersionId::for_version(&record_id, VersionNumber::BASELINE);
        assert_eq!(history.version_state(&v0, &alice).unwrap(), fields("Visit A"));
    }

    #[test]
    fn test_purge_history() {
        let (history, audit, record_id) = setup(StaticPermissions::allow_all());
        let alice = session(&history, "alice");
        history
            .create_next_version(&record_id, fields("Visit B"), None, &alice)
            .unwrap();

        let report = history.purge_history(&record_id);
        assert_eq!(report.deleted, 2);
        assert!(report.is_complete());
        assert!(history.list_history(&record_id, &alice).unwrap().is_empty());
        assert_eq!(audit.records_for(AuditAction::HistoryPurged).len(), 1);
    }

    #[test]
    fn test_restore_live_state_only_for_latest() {
        let (history, _, record_id) = setup(StaticPermissions::allow_all());
        let alice = session(&history, "alice");
        let v1 = history
            .create_next_version(&record_id, fields("Visit B"), None, &alice)
            .unwrap();

        history.restore_live_state(&record_id, &v1, &alice).unwrap();
        let v0 = VersionId::for_version(&record_id, VersionNumber::BASELINE);
        assert!(matches!(
            history.restore_live_state(&record_id, &v0, &alice),
            Err(VersionError::VersionSequenceConflict(_))
        ));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let config = HistoryConfig {
            session_idle_timeout_secs: 0,
            ..HistoryConfig::default()
        };
        let result = VersionHistory::builder(
            Arc::new(MemoryRecordStore::new()),
            Arc::new(MemoryVersionStore::new()),
            Arc::new(MemoryKeyStore::new()),
            Arc::new(StaticPermissions::allow_all()),
        )
        .config(config)
        .build();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
