//! ChangeSet codec
//!
//! A version's change list is serialized as JSON and sealed with the
//! record DEK. The associated data binds the ciphertext to its record
//! and version number, so a changeset cannot be replayed onto another
//! version.

use serde::{Deserialize, Serialize};

use crate::crypto::{self, CryptoError, CryptoResult, DataKey, RecordKey, SealedBytes};
use crate::diff::Change;
use crate::document::RecordId;

/// A changeset as stored in a version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "encryption", content = "changes", rename_all = "lowercase")]
pub enum ChangeSetPayload {
    Plain(Vec<Change>),
    Encrypted(SealedBytes),
}

fn changes_aad(record_id: &RecordId, version_number: u64) -> Vec<u8> {
    format!("changes:{}:v{}", record_id, version_number).into_bytes()
}

/// Encrypt a change list.
pub fn encrypt_changes(
    changes: &[Change],
    record_id: &RecordId,
    version_number: u64,
    dek: &DataKey,
) -> CryptoResult<SealedBytes> {
    let plaintext =
        serde_json::to_vec(changes).map_err(|e| CryptoError::Encoding(e.to_string()))?;
    crypto::seal(dek.as_bytes(), &plaintext, &changes_aad(record_id, version_number))
}

/// Decrypt a change list sealed by `encrypt_changes`.
pub fn decrypt_changes(
    sealed: &SealedBytes,
    record_id: &RecordId,
    version_number: u64,
    dek: &DataKey,
) -> CryptoResult<Vec<Change>> {
    let plaintext = crypto::open(dek.as_bytes(), sealed, &changes_aad(record_id, version_number))?;
    // Authenticated bytes that do not parse mean the writer was broken;
    // still refuse rather than return a partial list.
    serde_json::from_slice(&plaintext).map_err(|e| CryptoError::Integrity(e.to_string()))
}

/// Protect a change list according to the record's key.
pub fn protect_changes(
    changes: Vec<Change>,
    record_id: &RecordId,
    version_number: u64,
    key: &RecordKey,
) -> CryptoResult<ChangeSetPayload> {
    match key {
        RecordKey::Plaintext => Ok(ChangeSetPayload::Plain(changes)),
        RecordKey::Data(dek) => {
            encrypt_changes(&changes, record_id, version_number, dek).map(ChangeSetPayload::Encrypted)
        }
    }
}

/// Recover a stored change list.
pub fn reveal_changes(
    payload: &ChangeSetPayload,
    record_id: &RecordId,
    version_number: u64,
    key: &RecordKey,
) -> CryptoResult<Vec<Change>> {
    match (payload, key) {
        (ChangeSetPayload::Plain(changes), _) => Ok(changes.clone()),
        (ChangeSetPayload::Encrypted(sealed), RecordKey::Data(dek)) => {
            decrypt_changes(sealed, record_id, version_number, dek)
        }
        (ChangeSetPayload::Encrypted(_), RecordKey::Plaintext) => Err(
            CryptoError::InvalidKeyMaterial("encrypted changeset needs a record key".to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_changes() -> Vec<Change> {
        vec![
            Change::update("title".to_string(), json!("Visit A"), json!("Visit B")),
            Change::create("entries[1]".to_string(), json!({ "code": "E11", "dose": 2.5 })),
            Change::delete("notes".to_string(), json!(["a", null, true])),
        ]
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let dek = DataKey::generate();
        let record = RecordId::from("r1");
        let sealed = encrypt_changes(&sample_changes(), &record, 3, &dek).unwrap();
        assert_eq!(decrypt_changes(&sealed, &record, 3, &dek).unwrap(), sample_changes());
    }

    #[test]
    fn test_empty_change_list_round_trip() {
        let dek = DataKey::generate();
        let record = RecordId::from("r1");
        let sealed = encrypt_changes(&[], &record, 1, &dek).unwrap();
        assert!(decrypt_changes(&sealed, &record, 1, &dek).unwrap().is_empty());
    }

    #[test]
    fn test_ciphertext_bound_to_version() {
        let dek = DataKey::generate();
        let record = RecordId::from("r1");
        let sealed = encrypt_changes(&sample_changes(), &record, 3, &dek).unwrap();
        assert!(matches!(
            decrypt_changes(&sealed, &record, 4, &dek),
            Err(CryptoError::Integrity(_))
        ));
    }

    #[test]
    fn test_wrong_dek_fails_integrity() {
        let record = RecordId::from("r1");
        let sealed = encrypt_changes(&sample_changes(), &record, 1, &DataKey::generate()).unwrap();
        assert!(matches!(
            decrypt_changes(&sealed, &record, 1, &DataKey::generate()),
            Err(CryptoError::Integrity(_))
        ));
    }

    #[test]
    fn test_plaintext_payload_passthrough() {
        let record = RecordId::from("r1");
        let payload = protect_changes(sample_changes(), &record, 1, &RecordKey::Plaintext).unwrap();
        assert!(matches!(payload, ChangeSetPayload::Plain(_)));
        assert_eq!(
            reveal_changes(&payload, &record, 1, &RecordKey::Plaintext).unwrap(),
            sample_changes()
        );
    }

    #[test]
    fn test_encrypted_payload_without_key_rejected() {
        let record = RecordId::from("r1");
        let key = RecordKey::Data(DataKey::generate());
        let payload = protect_changes(sample_changes(), &record, 1, &key).unwrap();
        assert!(matches!(
            reveal_changes(&payload, &record, 1, &RecordKey::Plaintext),
            Err(CryptoError::InvalidKeyMaterial(_))
        ));
    }
}
