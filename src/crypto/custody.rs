//! # Key Custody
//!
//! Wrapping and unwrapping of record DEKs.
//!
//! Two wrapping paths:
//! - Owner: DEK sealed under the owner's master key
//! - Shared: DEK sealed to the recipient's X25519 public key; opening it
//!   first unlocks the recipient's private key with their master key
//!
//! ## Invariants
//! - A locked session fails before any ciphertext is touched
//! - A DEK is only returned after AEAD authentication succeeded
//! - A wrapping is bound to its (record, user) pair by associated data

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::cipher::{self, SealedBytes};
use super::envelope::{self, ShareIdentity};
use super::errors::{CryptoError, CryptoResult};
use super::keys::DataKey;
use super::session::SessionContext;
use crate::document::RecordId;

/// How a DEK is wrapped for one user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum KeyWrapping {
    /// Sealed under the user's master key.
    Owner { ciphertext: SealedBytes },
    /// Sealed to the user's public share key.
    Shared { envelope: SealedBytes },
}

/// Association of (record, user) to a DEK wrapping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    pub record_id: RecordId,
    pub user_id: String,
    pub wrapping: KeyWrapping,
    pub created_at: DateTime<Utc>,
}

impl WrappedKey {
    #[inline]
    pub fn is_owner(&self) -> bool {
        matches!(self.wrapping, KeyWrapping::Owner { .. })
    }
}

fn dek_aad(record_id: &RecordId, user_id: &str) -> Vec<u8> {
    format!("dek:{}:{}", record_id, user_id).into_bytes()
}

/// Wrap `dek` for the session's user as record owner.
pub fn wrap_for_owner(
    dek: &DataKey,
    record_id: &RecordId,
    session: &SessionContext,
) -> CryptoResult<WrappedKey> {
    let master = session.master_key()?;
    let ciphertext = cipher::seal(
        master.as_bytes(),
        dek.as_bytes(),
        &dek_aad(record_id, session.user_id()),
    )?;

    Ok(WrappedKey {
        record_id: record_id.clone(),
        user_id: session.user_id().to_string(),
        wrapping: KeyWrapping::Owner { ciphertext },
        created_at: Utc::now(),
    })
}

/// Wrap `dek` for another user, granting shared access.
///
/// Needs no session: only the recipient's public key is used.
pub fn wrap_for_share(
    dek: &DataKey,
    record_id: &RecordId,
    recipient: &ShareIdentity,
) -> CryptoResult<WrappedKey> {
    let envelope = envelope::seal_to(
        &recipient.public_key,
        dek.as_bytes(),
        &dek_aad(record_id, &recipient.user_id),
    )?;

    Ok(WrappedKey {
        record_id: record_id.clone(),
        user_id: recipient.user_id.clone(),
        wrapping: KeyWrapping::Shared { envelope },
        created_at: Utc::now(),
    })
}

/// Unwrap the DEK in `wrapped` for the session's user.
///
/// `identity` is the requester's share identity; it is only consulted
/// on the shared path.
pub fn unwrap_key(
    wrapped: &WrappedKey,
    session: &SessionContext,
    identity: Option<&ShareIdentity>,
) -> CryptoResult<DataKey> {
    let master = session.master_key()?;
    if wrapped.user_id != session.user_id() {
        return Err(CryptoError::InvalidKeyMaterial(
            "wrapped key belongs to another user".to_string(),
        ));
    }

    let aad = dek_aad(&wrapped.record_id, &wrapped.user_id);
    let bytes = match &wrapped.wrapping {
        KeyWrapping::Owner { ciphertext } => {
            Zeroizing::new(cipher::open(master.as_bytes(), ciphertext, &aad)?)
        }
        KeyWrapping::Shared { envelope } => {
            let identity = identity.ok_or_else(|| {
                CryptoError::InvalidKeyMaterial("no share identity for shared key".to_string())
            })?;
            let secret = envelope::unlock_share_key(identity, session)?;
            Zeroizing::new(envelope::open_with(&secret, envelope, &aad)?)
        }
    };

    DataKey::from_slice(&bytes)
}
