//! # Authenticated Encryption
//!
//! XChaCha20-Poly1305 with a fresh random 24-byte nonce per call. The
//! nonce is the first bytes of the output, so decryption needs nothing
//! but the key and the associated data.
//!
//! ## Invariants
//! - Every seal uses a new nonce from the OS RNG
//! - `open` either authenticates or fails; no partial plaintext escapes

use std::fmt;

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use subtle::ConstantTimeEq;

use super::errors::{CryptoError, CryptoResult};

/// Symmetric key size in bytes.
pub const KEY_SIZE: usize = 32;
/// Nonce prefix size in bytes.
pub const NONCE_SIZE: usize = 24;
/// Poly1305 tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Nonce-prefixed ciphertext. Serialized as standard base64.
#[derive(Clone, PartialEq, Eq)]
pub struct SealedBytes(Vec<u8>);

impl SealedBytes {
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn to_base64(&self) -> String {
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &self.0)
    }
}

impl fmt::Debug for SealedBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SealedBytes({} bytes)", self.0.len())
    }
}

impl Serialize for SealedBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for SealedBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
            .map(SealedBytes)
            .map_err(serde::de::Error::custom)
    }
}

/// Encrypt `plaintext` under `key`, binding `aad`.
pub fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8], aad: &[u8]) -> CryptoResult<SealedBytes> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::Encoding("encryption failed".to_string()))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(SealedBytes(out))
}

/// Decrypt and authenticate `sealed` under `key` with the same `aad`.
pub fn open(key: &[u8; KEY_SIZE], sealed: &SealedBytes, aad: &[u8]) -> CryptoResult<Vec<u8>> {
    let bytes = sealed.as_bytes();
    if bytes.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Integrity("ciphertext too short".to_string()));
    }

    let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::Integrity("authentication tag mismatch".to_string()))
}

/// Constant-time comparison of two byte slices
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
