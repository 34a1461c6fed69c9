//! Diff Engine
//!
//! Pure structural differences between document states. No I/O, no
//! crypto; everything above this module feeds it decrypted values.
//!
//! This module provides:
//! - `Change` / `ChangeOperation` - one structural edit
//! - `diff` / `diff_fields` - positional recursive diff
//! - `ChangeSummary` / `commit_message` - summaries for history views

mod change;
mod engine;
mod summary;

pub use change::{Change, ChangeOperation};
pub use engine::{diff, diff_fields};
pub use summary::{commit_message, ChangeSummary, NO_CHANGES_MESSAGE};
