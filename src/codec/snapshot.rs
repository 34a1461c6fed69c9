//! Snapshot manager
//!
//! Whole-document snapshots are sealed field by field. Each sub-document
//! is its own ciphertext, bound to where it is stored: the live record
//! uses `snapshot:{record}:{field}`, version `n` uses
//! `snapshot:{record}:v{n}:{field}`. A field cannot be moved to another
//! record, renamed, or replayed from another version undetected.
//!
//! Content hashes are taken over the canonical plaintext JSON and let a
//! reader confirm a decrypted snapshot is the one that was committed.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::crypto::{self, CryptoError, CryptoResult, DataKey, RecordKey};
use crate::document::{Fields, RecordFields, RecordId, SealedField};

const HASH_PREFIX: &str = "sha256:";

/// Where a sealed snapshot is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSlot {
    Live,
    Version(u64),
}

fn field_aad(record_id: &RecordId, slot: SnapshotSlot, field: &str) -> Vec<u8> {
    match slot {
        SnapshotSlot::Live => format!("snapshot:{}:{}", record_id, field),
        SnapshotSlot::Version(n) => format!("snapshot:{}:v{}:{}", record_id, n, field),
    }
    .into_bytes()
}

/// Seal every sub-document of `fields` under `dek`.
pub fn encrypt_snapshot(
    fields: &Fields,
    record_id: &RecordId,
    slot: SnapshotSlot,
    dek: &DataKey,
) -> CryptoResult<BTreeMap<String, SealedField>> {
    let mut sealed = BTreeMap::new();
    for (name, value) in fields {
        let plaintext =
            serde_json::to_vec(value).map_err(|e| CryptoError::Encoding(e.to_string()))?;
        let aad = field_aad(record_id, slot, name);
        let ciphertext = crypto::seal(dek.as_bytes(), &plaintext, &aad)?;
        sealed.insert(name.clone(), SealedField { ciphertext });
    }
    Ok(sealed)
}

/// Open every sub-document. Any failing field fails the whole snapshot.
pub fn decrypt_snapshot(
    sealed: &BTreeMap<String, SealedField>,
    record_id: &RecordId,
    slot: SnapshotSlot,
    dek: &DataKey,
) -> CryptoResult<Fields> {
    let mut fields = Fields::new();
    for (name, field) in sealed {
        let aad = field_aad(record_id, slot, name);
        let plaintext = crypto::open(dek.as_bytes(), &field.ciphertext, &aad)?;
        let value = serde_json::from_slice(&plaintext)
            .map_err(|e| CryptoError::Integrity(format!("field {}: {}", name, e)))?;
        fields.insert(name.clone(), value);
    }
    Ok(fields)
}

/// Store `fields` in the form the record key calls for.
pub fn protect(
    fields: &Fields,
    record_id: &RecordId,
    slot: SnapshotSlot,
    key: &RecordKey,
) -> CryptoResult<RecordFields> {
    match key {
        RecordKey::Plaintext => Ok(RecordFields::Plain(fields.clone())),
        RecordKey::Data(dek) => {
            encrypt_snapshot(fields, record_id, slot, dek).map(RecordFields::Encrypted)
        }
    }
}

/// Recover plaintext fields from their stored form.
///
/// Plain snapshots read without a key; they predate the record's
/// encryption.
pub fn reveal(
    stored: &RecordFields,
    record_id: &RecordId,
    slot: SnapshotSlot,
    key: &RecordKey,
) -> CryptoResult<Fields> {
    match (stored, key) {
        (RecordFields::Plain(fields), _) => Ok(fields.clone()),
        (RecordFields::Encrypted(sealed), RecordKey::Data(dek)) => {
            decrypt_snapshot(sealed, record_id, slot, dek)
        }
        (RecordFields::Encrypted(_), RecordKey::Plaintext) => Err(CryptoError::InvalidKeyMaterial(
            "encrypted snapshot needs a record key".to_string(),
        )),
    }
}

/// Content hash of a plaintext snapshot: `sha256:<hex>`.
pub fn content_hash(fields: &Fields) -> CryptoResult<String> {
    let canonical = serde_json::to_vec(fields).map_err(|e| CryptoError::Encoding(e.to_string()))?;
    let digest = Sha256::digest(&canonical);

    let mut out = String::with_capacity(HASH_PREFIX.len() + digest.len() * 2);
    out.push_str(HASH_PREFIX);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    Ok(out)
}

/// Check `fields` against a recorded content hash.
pub fn verify_content_hash(fields: &Fields, expected: &str) -> CryptoResult<()> {
    let actual = content_hash(fields)?;
    if crypto::constant_time_eq(actual.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(CryptoError::Integrity("snapshot content hash mismatch".to_string()))
    }
}
