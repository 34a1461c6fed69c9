//! # Record Documents
//!
//! The live, mutable side of the system. A record is a set of named
//! sub-documents (clinical bundle, metadata, free text) that is either
//! fully plaintext or fully encrypted.

pub mod sanitize;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::SealedBytes;

/// Named sub-documents of a record, in canonical (sorted) order.
pub type Fields = BTreeMap<String, Value>;

/// Stable record identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One encrypted sub-document: nonce-prefixed AEAD ciphertext of its JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedField {
    pub ciphertext: SealedBytes,
}

/// Sub-documents as persisted.
///
/// A record is plaintext or encrypted as a whole; there is no mixed form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "encryption", content = "fields", rename_all = "lowercase")]
pub enum RecordFields {
    Plain(Fields),
    Encrypted(BTreeMap<String, SealedField>),
}

impl RecordFields {
    #[inline]
    pub fn is_encrypted(&self) -> bool {
        matches!(self, RecordFields::Encrypted(_))
    }

    /// Names of the stored sub-documents.
    pub fn field_names(&self) -> Vec<&str> {
        match self {
            RecordFields::Plain(fields) => fields.keys().map(String::as_str).collect(),
            RecordFields::Encrypted(fields) => fields.keys().map(String::as_str).collect(),
        }
    }
}

/// The live record as held by the Record Store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    /// The user who first encrypted (or created) the record.
    pub owner_id: String,
    pub fields: RecordFields,
}

impl StoredRecord {
    pub fn plain(id: RecordId, owner_id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id,
            owner_id: owner_id.into(),
            fields: RecordFields::Plain(fields),
        }
    }

    #[inline]
    pub fn is_encrypted(&self) -> bool {
        self.fields.is_encrypted()
    }
}
