//! medvault - Encrypted, diff-based version control for health records
//!
//! Every tracked edit of a record becomes an immutable, encrypted,
//! content-addressed version in an append-only chain. Any two versions
//! can be compared structurally, and a record can be restored to an
//! earlier state without losing history.
//!
//! Layering (leaves first):
//! - `diff` - structural differences between two document values
//! - `crypto` - AEAD primitives, session context, key custody
//! - `codec` - changeset and snapshot encryption
//! - `history` - sequencing, rollback, comparison
//! - `store` - collaborator contracts and reference stores

pub mod codec;
pub mod config;
pub mod crypto;
pub mod diff;
pub mod document;
pub mod history;
pub mod observability;
pub mod store;

pub use config::{ConfigError, HistoryConfig};
pub use crypto::SessionContext;
pub use diff::{diff, Change, ChangeOperation};
pub use document::{Fields, RecordFields, RecordId, StoredRecord};
pub use history::{
    Comparison, RestoredState, StoredVersion, VersionError, VersionHistory,
    VersionHistoryBuilder, VersionId, VersionNumber, VersionResult, VersionSummary,
};
