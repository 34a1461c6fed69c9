//! # Collaborator Stores
//!
//! Contracts for the persistence the history engine depends on but does
//! not own: the live record store, the append-only version store, the
//! key store, and the permissions oracle.
//!
//! Traits are synchronous and `Send + Sync`; a service embedding the
//! engine wraps them in its own runtime.
//!
//! ## Invariants
//! - `VersionStore::create` never overwrites: an existing id is `AlreadyExists`
//! - `VersionStore::query` returns versions newest first
//! - `VersionStore::delete_all` never fails; failures are reported

mod errors;
mod local;
mod memory;

pub use errors::{StoreError, StoreResult};
pub use local::FileVersionStore;
pub use memory::{MemoryKeyStore, MemoryRecordStore, MemoryVersionStore, StaticPermissions};

use crate::crypto::{ShareIdentity, WrappedKey};
use crate::document::{RecordId, StoredRecord};
use crate::history::{StoredVersion, VersionId};

/// The live record store.
pub trait RecordStore: Send + Sync {
    /// Fetch a record. Missing records are `NotFound`.
    fn get(&self, id: &RecordId) -> StoreResult<StoredRecord>;

    /// Replace the live state of a record.
    fn put(&self, record: &StoredRecord) -> StoreResult<()>;
}

/// Append-only version storage.
pub trait VersionStore: Send + Sync {
    fn get(&self, id: &VersionId) -> StoreResult<StoredVersion>;

    /// All versions of a record, ordered by version number descending.
    fn query(&self, record_id: &RecordId) -> StoreResult<Vec<StoredVersion>>;

    /// Create `version` only if its id is absent.
    fn create(&self, version: &StoredVersion) -> StoreResult<()>;

    fn delete(&self, id: &VersionId) -> StoreResult<()>;

    /// The most recent version of a record, if any.
    fn latest(&self, record_id: &RecordId) -> StoreResult<Option<StoredVersion>> {
        Ok(self.query(record_id)?.into_iter().next())
    }

    /// Delete every version of a record, best effort.
    fn delete_all(&self, record_id: &RecordId) -> PurgeReport {
        let mut report = PurgeReport::default();
        let versions = match self.query(record_id) {
            Ok(versions) => versions,
            Err(error) => {
                report.failures.push(PurgeFailure {
                    version_id: None,
                    error,
                });
                return report;
            }
        };

        for version in versions {
            match self.delete(version.id()) {
                Ok(()) => report.deleted += 1,
                Err(error) => report.failures.push(PurgeFailure {
                    version_id: Some(version.id().clone()),
                    error,
                }),
            }
        }
        report
    }
}

/// Outcome of a bulk delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub deleted: usize,
    pub failures: Vec<PurgeFailure>,
}

impl PurgeReport {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One failed deletion. `version_id` is `None` when listing failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeFailure {
    pub version_id: Option<VersionId>,
    pub error: StoreError,
}

/// Wrapped DEKs and share identities.
pub trait KeyStore: Send + Sync {
    /// The active wrapping of `record_id`'s DEK for `user_id`.
    fn wrapped_key(&self, record_id: &RecordId, user_id: &str) -> StoreResult<Option<WrappedKey>>;

    fn put_wrapped_key(&self, key: &WrappedKey) -> StoreResult<()>;

    /// Invalidate a user's wrapping. Missing wrappings are `NotFound`.
    fn revoke(&self, record_id: &RecordId, user_id: &str) -> StoreResult<()>;

    fn share_identity(&self, user_id: &str) -> StoreResult<Option<ShareIdentity>>;

    fn put_share_identity(&self, identity: &ShareIdentity) -> StoreResult<()>;
}

/// Authorization oracle for history access.
pub trait Permissions: Send + Sync {
    fn can_view_history(&self, record_id: &RecordId, user_id: &str) -> bool;

    fn can_rollback(&self, record_id: &RecordId, user_id: &str) -> bool;
}
