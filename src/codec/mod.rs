//! Codecs between plaintext history data and its stored form.
//!
//! - `changeset` - change lists sealed with the record DEK
//! - `snapshot` - per-field sealed snapshots and content hashes

pub mod changeset;
pub mod snapshot;

pub use changeset::{
    decrypt_changes, encrypt_changes, protect_changes, reveal_changes, ChangeSetPayload,
};
pub use snapshot::{
    content_hash, decrypt_snapshot, encrypt_snapshot, protect, reveal, verify_content_hash,
    SnapshotSlot,
};
