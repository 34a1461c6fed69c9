//! In-memory store implementations for tests and embedding

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use super::errors::{StoreError, StoreResult};
use super::{KeyStore, Permissions, RecordStore, VersionStore};
use crate::crypto::{ShareIdentity, WrappedKey};
use crate::document::{RecordId, StoredRecord};
use crate::history::{StoredVersion, VersionId};

/// In-memory live record store
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<RecordId, StoredRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, id: &RecordId) -> StoreResult<StoredRecord> {
        let records = self.records.read().map_err(|_| StoreError::poisoned())?;
        records
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn put(&self, record: &StoredRecord) -> StoreResult<()> {
        let mut records = self.records.write().map_err(|_| StoreError::poisoned())?;
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }
}

/// In-memory version store
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    versions: RwLock<BTreeMap<VersionId, StoredVersion>>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of versions across all records.
    pub fn len(&self) -> usize {
        self.versions.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl VersionStore for MemoryVersionStore {
    fn get(&self, id: &VersionId) -> StoreResult<StoredVersion> {
        let versions = self.versions.read().map_err(|_| StoreError::poisoned())?;
        versions
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn query(&self, record_id: &RecordId) -> StoreResult<Vec<StoredVersion>> {
        let versions = self.versions.read().map_err(|_| StoreError::poisoned())?;
        let mut found: Vec<StoredVersion> = versions
            .values()
            .filter(|v| v.record_id() == record_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.version_number().cmp(&a.version_number()));
        Ok(found)
    }

    fn create(&self, version: &StoredVersion) -> StoreResult<()> {
        let mut versions = self.versions.write().map_err(|_| StoreError::poisoned())?;
        if versions.contains_key(version.id()) {
            return Err(StoreError::AlreadyExists(version.id().to_string()));
        }
        versions.insert(version.id().clone(), version.clone());
        Ok(())
    }

    fn delete(&self, id: &VersionId) -> StoreResult<()> {
        let mut versions = self.versions.write().map_err(|_| StoreError::poisoned())?;
        versions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

/// In-memory key store
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    wrapped: RwLock<HashMap<(RecordId, String), WrappedKey>>,
    identities: RwLock<HashMap<String, ShareIdentity>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn wrapped_key(&self, record_id: &RecordId, user_id: &str) -> StoreResult<Option<WrappedKey>> {
        let wrapped = self.wrapped.read().map_err(|_| StoreError::poisoned())?;
        Ok(wrapped
            .get(&(record_id.clone(), user_id.to_string()))
            .cloned())
    }

    fn put_wrapped_key(&self, key: &WrappedKey) -> StoreResult<()> {
        let mut wrapped = self.wrapped.write().map_err(|_| StoreError::poisoned())?;
        wrapped.insert((key.record_id.clone(), key.user_id.clone()), key.clone());
        Ok(())
    }

    fn revoke(&self, record_id: &RecordId, user_id: &str) -> StoreResult<()> {
        let mut wrapped = self.wrapped.write().map_err(|_| StoreError::poisoned())?;
        wrapped
            .remove(&(record_id.clone(), user_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", record_id, user_id)))
    }

    fn share_identity(&self, user_id: &str) -> StoreResult<Option<ShareIdentity>> {
        let identities = self.identities.read().map_err(|_| StoreError::poisoned())?;
        Ok(identities.get(user_id).cloned())
    }

    fn put_share_identity(&self, identity: &ShareIdentity) -> StoreResult<()> {
        let mut identities = self.identities.write().map_err(|_| StoreError::poisoned())?;
        identities.insert(identity.user_id.clone(), identity.clone());
        Ok(())
    }
}

/// Fixed permission table.
///
/// Rollback permission implies history view permission.
#[derive(Debug, Default, Clone)]
pub struct StaticPermissions {
    allow_all: bool,
    viewers: HashSet<(RecordId, String)>,
    restorers: HashSet<(RecordId, String)>,
}

impl StaticPermissions {
    pub fn allow_all() -> Self {
        Self {
            allow_all: true,
            ..Self::default()
        }
    }

    pub fn deny_all() -> Self {
        Self::default()
    }

    pub fn grant_view(mut self, record_id: &RecordId, user_id: &str) -> Self {
        self.viewers.insert((record_id.clone(), user_id.to_string()));
        self
    }

    pub fn grant_rollback(mut self, record_id: &RecordId, user_id: &str) -> Self {
        self.restorers.insert((record_id.clone(), user_id.to_string()));
        self
    }
}

impl Permissions for StaticPermissions {
    fn can_view_history(&self, record_id: &RecordId, user_id: &str) -> bool {
        let key = (record_id.clone(), user_id.to_string());
        self.allow_all || self.viewers.contains(&key) || self.restorers.contains(&key)
    }

    fn can_rollback(&self, record_id: &RecordId, user_id: &str) -> bool {
        self.allow_all
            || self
                .restorers
                .contains(&(record_id.clone(), user_id.to_string()))
    }
}
