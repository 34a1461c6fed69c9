//! Symmetric key material.
//!
//! Keys live in `Zeroizing` buffers and are wiped when dropped. Debug
//! output never includes key bytes.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use super::cipher::KEY_SIZE;
use super::errors::{CryptoError, CryptoResult};

fn random_key() -> Zeroizing<[u8; KEY_SIZE]> {
    let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
    OsRng.fill_bytes(&mut bytes[..]);
    bytes
}

fn key_from_slice(bytes: &[u8]) -> CryptoResult<Zeroizing<[u8; KEY_SIZE]>> {
    if bytes.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKeyMaterial(format!(
            "expected {} key bytes, got {}",
            KEY_SIZE,
            bytes.len()
        )));
    }
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    key.copy_from_slice(bytes);
    Ok(key)
}

/// Data encryption key: encrypts one record's fields and changesets.
#[derive(Clone)]
pub struct DataKey(Zeroizing<[u8; KEY_SIZE]>);

impl DataKey {
    /// Generate a fresh random DEK.
    pub fn generate() -> Self {
        Self(random_key())
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        key_from_slice(bytes).map(Self)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataKey(..)")
    }
}

/// A user's personal master key, held only by an unlocked session.
///
/// Derivation from a password happens outside this crate.
#[derive(Clone)]
pub struct MasterKey(Zeroizing<[u8; KEY_SIZE]>);

impl MasterKey {
    pub fn generate() -> Self {
        Self(random_key())
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        key_from_slice(bytes).map(Self)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// How a record's content is protected once its key is resolved.
#[derive(Clone, Debug)]
pub enum RecordKey {
    /// The record is stored in plaintext; no key applies.
    Plaintext,
    /// The record is encrypted under this DEK.
    Data(DataKey),
}

impl RecordKey {
    #[inline]
    pub fn is_plaintext(&self) -> bool {
        matches!(self, RecordKey::Plaintext)
    }
}
