//! # Crypto Module
//!
//! Authenticated encryption, session-held master keys, and custody of
//! record DEKs for owners and shared-access users.

pub mod cipher;
pub mod custody;
pub mod envelope;
pub mod errors;
mod keys;
mod session;

pub use cipher::{constant_time_eq, open, seal, SealedBytes, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use custody::{unwrap_key, wrap_for_owner, wrap_for_share, KeyWrapping, WrappedKey};
pub use envelope::{generate_share_identity, PublicShareKey, ShareIdentity};
pub use errors::{CryptoError, CryptoResult};
pub use keys::{DataKey, MasterKey, RecordKey};
pub use session::{SessionContext, DEFAULT_IDLE_TIMEOUT_SECS};
