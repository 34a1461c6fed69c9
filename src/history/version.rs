//! Version - Immutable point-in-time snapshot of a record
//!
//! - A version has a complete snapshot of every sub-document
//! - Its changeset is the delta from the previous version (absent on v0)
//! - Once created, never changes; corrections are new versions
//!
//! Version identity is deterministic: `{recordId}_v{versionNumber}`.
//! A retried write after a crash therefore targets the same id and is
//! rejected by the store's conditional create instead of duplicated.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::ChangeSetPayload;
use crate::document::{RecordFields, RecordId};

/// Position of a version in its record's chain. Version 0 is the baseline.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionNumber(u64);

impl VersionNumber {
    pub const BASELINE: VersionNumber = VersionNumber(0);

    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The number that follows this one.
    #[inline]
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    #[inline]
    pub fn is_baseline(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic version identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    const SEPARATOR: &'static str = "_v";

    /// The id of version `number` of `record_id`.
    pub fn for_version(record_id: &RecordId, number: VersionNumber) -> Self {
        Self(format!("{}{}{}", record_id, Self::SEPARATOR, number))
    }

    /// Wrap an id received from a caller. Use `parse` to validate it.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into record id and version number.
    ///
    /// Splits at the last `_v`, so record ids may themselves contain `_v`.
    pub fn parse(&self) -> Option<(RecordId, VersionNumber)> {
        let (record, number) = self.0.rsplit_once(Self::SEPARATOR)?;
        if record.is_empty() || number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let number = number.parse::<u64>().ok()?;
        Some((RecordId::new(record), VersionNumber::new(number)))
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionId {
    fn from(id: &str) -> Self {
        Self::from_string(id)
    }
}

/// A persisted version.
///
/// Fields are private; a version is built once by the sequencer and only
/// read afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredVersion {
    id: VersionId,
    record_id: RecordId,
    version_number: VersionNumber,
    author: String,
    created_at: DateTime<Utc>,
    message: String,
    /// `sha256:<hex>` of the canonical plaintext snapshot.
    content_hash: String,
    change_count: usize,
    changes: Option<ChangeSetPayload>,
    snapshot: RecordFields,
}

impl StoredVersion {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        record_id: RecordId,
        version_number: VersionNumber,
        author: impl Into<String>,
        message: impl Into<String>,
        content_hash: String,
        change_count: usize,
        changes: Option<ChangeSetPayload>,
        snapshot: RecordFields,
    ) -> Self {
        Self {
            id: VersionId::for_version(&record_id, version_number),
            record_id,
            version_number,
            author: author.into(),
            created_at: Utc::now(),
            message: message.into(),
            content_hash,
            change_count,
            changes,
            snapshot,
        }
    }

    #[inline]
    pub fn id(&self) -> &VersionId {
        &self.id
    }

    #[inline]
    pub fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    #[inline]
    pub fn version_number(&self) -> VersionNumber {
        self.version_number
    }

    #[inline]
    pub fn author(&self) -> &str {
        &self.author
    }

    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    #[inline]
    pub fn change_count(&self) -> usize {
        self.change_count
    }

    #[inline]
    pub fn changes(&self) -> Option<&ChangeSetPayload> {
        self.changes.as_ref()
    }

    #[inline]
    pub fn snapshot(&self) -> &RecordFields {
        &self.snapshot
    }

    #[inline]
    pub fn is_encrypted(&self) -> bool {
        self.snapshot.is_encrypted()
    }

    /// Metadata view, without any ciphertext.
    pub fn summary(&self) -> VersionSummary {
        VersionSummary {
            id: self.id.clone(),
            version_number: self.version_number,
            author: self.author.clone(),
            created_at: self.created_at,
            message: self.message.clone(),
            change_count: self.change_count,
            content_hash: self.content_hash.clone(),
            encrypted: self.is_encrypted(),
        }
    }
}

/// History listing entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSummary {
    pub id: VersionId,
    pub version_number: VersionNumber,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub message: String,
    pub change_count: usize,
    pub content_hash: String,
    pub encrypted: bool,
}
