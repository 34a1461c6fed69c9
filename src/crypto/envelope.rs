//! # Sealed Envelopes
//!
//! Asymmetric wrapping for shared access. A DEK is sealed to the
//! recipient's X25519 public key:
//!
//! 1. Generate an ephemeral X25519 secret
//! 2. Agree on a shared secret with the recipient's public key
//! 3. Derive the wrapping key: SHA-256(domain || shared || eph_pub || recipient_pub)
//! 4. Seal with the symmetric AEAD
//!
//! Layout: `eph_pub (32) || nonce (24) || ciphertext || tag (16)`.
//!
//! The recipient's private key is stored sealed under their master key
//! (`ShareIdentity::protected_private_key`), so opening an envelope
//! requires an unlocked session.

use std::fmt;

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use super::cipher::{self, SealedBytes, KEY_SIZE};
use super::errors::{CryptoError, CryptoResult};
use super::session::SessionContext;

const ENVELOPE_DOMAIN: &[u8] = b"medvault/envelope/v1";
const PUBLIC_KEY_SIZE: usize = 32;

/// A user's X25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicShareKey([u8; PUBLIC_KEY_SIZE]);

impl PublicShareKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for PublicShareKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicShareKey({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

/// A user's sharing keypair with the private half sealed under their
/// master key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareIdentity {
    pub user_id: String,
    pub public_key: PublicShareKey,
    pub protected_private_key: SealedBytes,
}

fn private_key_aad(user_id: &str) -> Vec<u8> {
    format!("share-key:{}", user_id).into_bytes()
}

/// Generate a sharing keypair for the session's user.
pub fn generate_share_identity(session: &SessionContext) -> CryptoResult<ShareIdentity> {
    let master = session.master_key()?;
    let secret = StaticSecret::random_from_rng(OsRng);
    let public = PublicKey::from(&secret);

    let private_bytes = Zeroizing::new(secret.to_bytes());
    let protected_private_key = cipher::seal(
        master.as_bytes(),
        &private_bytes[..],
        &private_key_aad(session.user_id()),
    )?;

    Ok(ShareIdentity {
        user_id: session.user_id().to_string(),
        public_key: PublicShareKey(public.to_bytes()),
        protected_private_key,
    })
}

/// Recover the private half of `identity` with the session's master key.
pub fn unlock_share_key(
    identity: &ShareIdentity,
    session: &SessionContext,
) -> CryptoResult<StaticSecret> {
    let master = session.master_key()?;
    if identity.user_id != session.user_id() {
        return Err(CryptoError::InvalidKeyMaterial(
            "share identity belongs to another user".to_string(),
        ));
    }

    let bytes = Zeroizing::new(cipher::open(
        master.as_bytes(),
        &identity.protected_private_key,
        &private_key_aad(&identity.user_id),
    )?);
    let array: [u8; KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
        CryptoError::InvalidKeyMaterial("private key has wrong length".to_string())
    })?;
    Ok(StaticSecret::from(array))
}

fn derive_wrapping_key(
    shared: &[u8],
    ephemeral_public: &[u8],
    recipient_public: &[u8],
) -> Zeroizing<[u8; KEY_SIZE]> {
    let mut hasher = Sha256::new();
    hasher.update(ENVELOPE_DOMAIN);
    hasher.update(shared);
    hasher.update(ephemeral_public);
    hasher.update(recipient_public);
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    key.copy_from_slice(&hasher.finalize());
    key
}

/// Seal `plaintext` so only the holder of `recipient`'s private key can open it.
pub fn seal_to(recipient: &PublicShareKey, plaintext: &[u8], aad: &[u8]) -> CryptoResult<SealedBytes> {
    let ephemeral = StaticSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&PublicKey::from(recipient.0));

    let key = derive_wrapping_key(shared.as_bytes(), ephemeral_public.as_bytes(), &recipient.0);
    let sealed = cipher::seal(&key, plaintext, aad)?;

    let mut out = Vec::with_capacity(PUBLIC_KEY_SIZE + sealed.len());
    out.extend_from_slice(ephemeral_public.as_bytes());
    out.extend_from_slice(sealed.as_bytes());
    Ok(SealedBytes::from_vec(out))
}

/// Open an envelope produced by `seal_to`.
pub fn open_with(secret: &StaticSecret, envelope: &SealedBytes, aad: &[u8]) -> CryptoResult<Vec<u8>> {
    let bytes = envelope.as_bytes();
    if bytes.len() < PUBLIC_KEY_SIZE {
        return Err(CryptoError::Integrity("envelope too short".to_string()));
    }

    let (ephemeral_bytes, sealed) = bytes.split_at(PUBLIC_KEY_SIZE);
    let mut ephemeral = [0u8; PUBLIC_KEY_SIZE];
    ephemeral.copy_from_slice(ephemeral_bytes);

    let recipient_public = PublicKey::from(secret);
    let shared = secret.diffie_hellman(&PublicKey::from(ephemeral));
    let key = derive_wrapping_key(shared.as_bytes(), &ephemeral, recipient_public.as_bytes());

    cipher::open(&key, &SealedBytes::from_vec(sealed.to_vec()), aad)
}
