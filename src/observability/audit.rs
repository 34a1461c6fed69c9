//! History audit log
//!
//! - Every version creation, history read, comparison and rollback is logged
//! - Every permission denial is logged
//! - Audit log is append-only; one JSON record per line
//! - An audit write failure is reported but never fails the operation
//!
//! Records carry identifiers only. Record content never enters the log.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    VersionCreated,
    HistoryViewed,
    VersionViewed,
    VersionsCompared,
    Rollback,
    HistoryPurged,
    RecordEncrypted,
    AccessGranted,
    AccessRevoked,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::VersionCreated => "VERSION_CREATED",
            AuditAction::HistoryViewed => "HISTORY_VIEWED",
            AuditAction::VersionViewed => "VERSION_VIEWED",
            AuditAction::VersionsCompared => "VERSIONS_COMPARED",
            AuditAction::Rollback => "ROLLBACK",
            AuditAction::HistoryPurged => "HISTORY_PURGED",
            AuditAction::RecordEncrypted => "RECORD_ENCRYPTED",
            AuditAction::AccessGranted => "ACCESS_GRANTED",
            AuditAction::AccessRevoked => "ACCESS_REVOKED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audit record outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    Success,
    /// Refused before any data was touched (permissions).
    Denied,
    Failed,
}

/// A single audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub outcome: AuditOutcome,
    pub actor: String,
    pub record_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditRecord {
    pub fn new(
        action: AuditAction,
        outcome: AuditOutcome,
        actor: impl Into<String>,
        record_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            outcome,
            actor: actor.into(),
            record_id: record_id.into(),
            version_id: None,
            detail: None,
        }
    }

    pub fn with_version(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    /// Free-form detail: an error code, a version range. No record content.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Serialize to a JSON line.
    pub fn to_json(&self) -> io::Result<String> {
        serde_json::to_string(self).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// Append-only audit sink.
pub trait AuditLog: Send + Sync {
    /// Append a record. The record is visible once this returns.
    fn append(&self, record: &AuditRecord) -> io::Result<()>;
}

fn poisoned() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "audit log lock poisoned")
}

/// File-based audit log: one JSON record per line, synced per append.
pub struct FileAuditLog {
    path: PathBuf,
    writer: Arc<Mutex<BufWriter<File>>>,
}

impl FileAuditLog {
    /// Open or create an audit log file.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            writer: Arc::new(Mutex::new(BufWriter::new(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditLog for FileAuditLog {
    fn append(&self, record: &AuditRecord) -> io::Result<()> {
        let json = record.to_json()?;
        let mut writer = self.writer.lock().map_err(|_| poisoned())?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        writer.get_ref().sync_all()
    }
}

/// In-memory audit log for testing.
#[derive(Debug, Default, Clone)]
pub struct MemoryAuditLog {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Records for one action, in append order.
    pub fn records_for(&self, action: AuditAction) -> Vec<AuditRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.action == action)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, record: &AuditRecord) -> io::Result<()> {
        self.records
            .lock()
            .map_err(|_| poisoned())?
            .push(record.clone());
        Ok(())
    }
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditLog;

impl AuditLog for NullAuditLog {
    fn append(&self, _record: &AuditRecord) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_audit_record_builder() {
        let record = AuditRecord::new(AuditAction::Rollback, AuditOutcome::Success, "alice", "r1")
            .with_version("r1_v1")
            .with_detail("checkpoint r1_v3");

        assert_eq!(record.action, AuditAction::Rollback);
        assert_eq!(record.version_id.as_deref(), Some("r1_v1"));
        assert_eq!(record.detail.as_deref(), Some("checkpoint r1_v3"));
    }

    #[test]
    fn test_audit_record_json() {
        let record =
            AuditRecord::new(AuditAction::VersionCreated, AuditOutcome::Success, "alice", "r1");
        let json = record.to_json().unwrap();
        assert!(json.contains("\"VERSION_CREATED\""));
        assert!(json.contains("\"SUCCESS\""));
        assert!(!json.contains("version_id"));

        let back: AuditRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_memory_audit_log() {
        let log = MemoryAuditLog::new();
        log.append(&AuditRecord::new(
            AuditAction::HistoryViewed,
            AuditOutcome::Denied,
            "bob",
            "r1",
        ))
        .unwrap();
        log.append(&AuditRecord::new(
            AuditAction::VersionCreated,
            AuditOutcome::Success,
            "alice",
            "r1",
        ))
        .unwrap();

        assert_eq!(log.len(), 2);
        assert_eq!(log.records()[0].outcome, AuditOutcome::Denied);
        assert_eq!(log.records_for(AuditAction::VersionCreated).len(), 1);
    }

    #[test]
    fn test_file_audit_log_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.log");

        {
            let log = FileAuditLog::open(&path).unwrap();
            log.append(&AuditRecord::new(
                AuditAction::HistoryPurged,
                AuditOutcome::Success,
                "system",
                "r1",
            ))
            .unwrap();
        }
        {
            let log = FileAuditLog::open(&path).unwrap();
            assert_eq!(log.path(), path.as_path());
            log.append(&AuditRecord::new(
                AuditAction::Rollback,
                AuditOutcome::Failed,
                "alice",
                "r1",
            ))
            .unwrap();
        }

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("HISTORY_PURGED"));
        assert!(lines[1].contains("ROLLBACK"));
    }
}
