//! # File-backed Version Store
//!
//! One JSON document per version: `{root}/{recordId}/{versionId}.json`.
//!
//! Creation writes a private temp file, syncs it, then hard-links it to
//! the final name. The link fails if the name exists, which gives a
//! conditional create that never exposes a half-written version.
//!
//! Bulk delete removes files without parsing them, so a corrupt version
//! never blocks a purge.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::errors::{StoreError, StoreResult};
use super::{PurgeFailure, PurgeReport, VersionStore};
use crate::document::RecordId;
use crate::history::{StoredVersion, VersionId};

const EXTENSION: &str = "json";

/// Directory-backed version store
#[derive(Debug)]
pub struct FileVersionStore {
    root: PathBuf,
}

impl FileVersionStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_dir(&self, record_id: &RecordId) -> StoreResult<PathBuf> {
        check_component(record_id.as_str())?;
        Ok(self.root.join(record_id.as_str()))
    }

    fn version_path(&self, id: &VersionId) -> StoreResult<PathBuf> {
        let (record_id, _) = id
            .parse()
            .ok_or_else(|| StoreError::InvalidId(id.to_string()))?;
        check_component(id.as_str())?;
        Ok(self
            .record_dir(&record_id)?
            .join(format!("{}.{}", id, EXTENSION)))
    }

    fn read_version(path: &Path, id: &str) -> StoreResult<StoredVersion> {
        let bytes = fs::read(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StoreError::NotFound(id.to_string())
            } else {
                StoreError::Io(e.to_string())
            }
        })?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(id.to_string(), e.to_string()))
    }
}

/// Identifiers become path components; reject anything that could escape.
fn check_component(id: &str) -> StoreResult<()> {
    if id.is_empty()
        || id == "."
        || id == ".."
        || id.contains('/')
        || id.contains('\\')
        || id.contains('\0')
    {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}

impl VersionStore for FileVersionStore {
    fn get(&self, id: &VersionId) -> StoreResult<StoredVersion> {
        let path = self.version_path(id)?;
        Self::read_version(&path, id.as_str())
    }

    fn query(&self, record_id: &RecordId) -> StoreResult<Vec<StoredVersion>> {
        let dir = self.record_dir(record_id)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut versions = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            versions.push(Self::read_version(&path, &name)?);
        }

        versions.sort_by(|a, b| b.version_number().cmp(&a.version_number()));
        Ok(versions)
    }

    fn create(&self, version: &StoredVersion) -> StoreResult<()> {
        let path = self.version_path(version.id())?;
        let dir = self.record_dir(version.record_id())?;
        fs::create_dir_all(&dir)?;

        let body = serde_json::to_vec_pretty(version)
            .map_err(|e| StoreError::Corrupt(version.id().to_string(), e.to_string()))?;

        let tmp = dir.join(format!(".{}.{}.tmp", version.id(), Uuid::new_v4()));
        let mut file = File::create(&tmp)?;
        file.write_all(&body)?;
        file.sync_all()?;
        drop(file);

        let linked = fs::hard_link(&tmp, &path);
        let _ = fs::remove_file(&tmp);
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::AlreadyExists(version.id().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, id: &VersionId) -> StoreResult<()> {
        let path = self.version_path(id)?;
        remove_version_file(&path, id)
    }

    fn delete_all(&self, record_id: &RecordId) -> PurgeReport {
        let mut report = PurgeReport::default();
        let entries = match self.record_dir(record_id).and_then(|dir| {
            fs::read_dir(dir).map_err(|e| match e.kind() {
                ErrorKind::NotFound => StoreError::NotFound(record_id.to_string()),
                _ => StoreError::Io(e.to_string()),
            })
        }) {
            Ok(entries) => entries,
            Err(StoreError::NotFound(_)) => return report,
            Err(error) => {
                report.failures.push(PurgeFailure {
                    version_id: None,
                    error,
                });
                return report;
            }
        };

        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    report.failures.push(PurgeFailure {
                        version_id: None,
                        error: e.into(),
                    });
                    continue;
                }
            };
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let id = VersionId::from_string(
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default(),
            );
            match remove_version_file(&path, &id) {
                Ok(()) => report.deleted += 1,
                Err(error) => report.failures.push(PurgeFailure {
                    version_id: Some(id),
                    error,
                }),
            }
        }
        report
    }
}

fn remove_version_file(path: &Path, id: &VersionId) -> StoreResult<()> {
    fs::remove_file(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            StoreError::NotFound(id.to_string())
        } else {
            StoreError::Io(e.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Fields, RecordFields};
    use crate::history::VersionNumber;
    use serde_json::json;
    use tempfile::TempDir;

    fn version(record: &str, number: u64) -> StoredVersion {
        let mut fields = Fields::new();
        fields.insert("title".to_string(), json!(format!("v{}", number)));
        StoredVersion::new(
            RecordId::from(record),
            VersionNumber::new(number),
            "alice",
            "msg",
            "sha256:00".to_string(),
            0,
            None,
            RecordFields::Plain(fields),
        )
    }

    #[test]
    fn test_create_get() {
        let temp = TempDir::new().unwrap();
        let store = FileVersionStore::open(temp.path()).unwrap();

        let v = version("r1", 0);
        store.create(&v).unwrap();
        assert_eq!(store.get(v.id()).unwrap(), v);
        assert!(temp.path().join("r1").join("r1_v0.json").exists());
    }

    #[test]
    fn test_create_is_conditional() {
        let temp = TempDir::new().unwrap();
        let store = FileVersionStore::open(temp.path()).unwrap();

        store.create(&version("r1", 0)).unwrap();
        let err = store.create(&version("r1", 0)).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));

        let entries: Vec<_> = fs::read_dir(temp.path().join("r1")).unwrap().collect();
        assert_eq!(entries.len(), 1, "temp files must be cleaned up");
    }

    #[test]
    fn test_query_descending() {
        let temp = TempDir::new().unwrap();
        let store = FileVersionStore::open(temp.path()).unwrap();
        for n in [0, 2, 1] {
            store.create(&version("r1", n)).unwrap();
        }
        let numbers: Vec<u64> = store
            .query(&RecordId::from("r1"))
            .unwrap()
            .iter()
            .map(|v| v.version_number().value())
            .collect();
        assert_eq!(numbers, vec![2, 1, 0]);
        assert!(store.query(&RecordId::from("unknown")).unwrap().is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let store = FileVersionStore::open(temp.path()).unwrap();
            store.create(&version("r1", 0)).unwrap();
            store.create(&version("r1", 1)).unwrap();
        }
        let store = FileVersionStore::open(temp.path()).unwrap();
        let latest = store.latest(&RecordId::from("r1")).unwrap().unwrap();
        assert_eq!(latest, version_on_disk(&store, "r1_v1"));
        assert_eq!(latest.version_number().value(), 1);
    }

    fn version_on_disk(store: &FileVersionStore, id: &str) -> StoredVersion {
        store.get(&VersionId::from(id)).unwrap()
    }

    #[test]
    fn test_corrupt_file() {
        let temp = TempDir::new().unwrap();
        let store = FileVersionStore::open(temp.path()).unwrap();
        store.create(&version("r1", 0)).unwrap();
        fs::write(temp.path().join("r1").join("r1_v0.json"), b"{ not json").unwrap();

        assert!(matches!(
            store.get(&VersionId::from("r1_v0")),
            Err(StoreError::Corrupt(_, _))
        ));
    }

    #[test]
    fn test_delete_all_skips_past_corrupt_file() {
        let temp = TempDir::new().unwrap();
        let store = FileVersionStore::open(temp.path()).unwrap();
        for n in 0..3 {
            store.create(&version("r1", n)).unwrap();
        }
        store.create(&version("r2", 0)).unwrap();
        fs::write(temp.path().join("r1").join("r1_v1.json"), b"{bad").unwrap();

        let report = store.delete_all(&RecordId::from("r1"));
        assert_eq!(report.deleted, 3);
        assert!(report.is_complete());
        assert!(store.query(&RecordId::from("r1")).unwrap().is_empty());
        assert_eq!(store.query(&RecordId::from("r2")).unwrap().len(), 1);

        let empty = store.delete_all(&RecordId::from("unknown"));
        assert_eq!(empty, PurgeReport::default());
    }

    #[test]
    fn test_rejects_path_escape() {
        let temp = TempDir::new().unwrap();
        let store = FileVersionStore::open(temp.path()).unwrap();
        assert!(matches!(
            store.get(&VersionId::from("../etc_v0")),
            Err(StoreError::InvalidId(_))
        ));
        assert!(matches!(
            store.query(&RecordId::from("..")),
            Err(StoreError::InvalidId(_))
        ));
        assert!(matches!(
            store.get(&VersionId::from("no-number")),
            Err(StoreError::InvalidId(_))
        ));
    }

    #[test]
    fn test_delete_and_delete_all() {
        let temp = TempDir::new().unwrap();
        let store = FileVersionStore::open(temp.path()).unwrap();
        for n in 0..3 {
            store.create(&version("r1", n)).unwrap();
        }

        store.delete(&VersionId::from("r1_v2")).unwrap();
        assert!(matches!(
            store.delete(&VersionId::from("r1_v2")),
            Err(StoreError::NotFound(_))
        ));

        let report = store.delete_all(&RecordId::from("r1"));
        assert_eq!(report.deleted, 2);
        assert!(report.is_complete());
        assert!(store.query(&RecordId::from("r1")).unwrap().is_empty());
    }
}
