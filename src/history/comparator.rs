//! Comparator - diff between any two versions of a record
//!
//! Both snapshots are decrypted and diffed in full; the stored per-step
//! changesets only hold adjacent deltas and are not used. Arguments are
//! ordered by version number, so `compare(a, b) == compare(b, a)`.

use serde::Serialize;

use crate::crypto::SessionContext;
use crate::diff::{diff_fields, Change, ChangeSummary};
use crate::observability::{log_event, AuditAction, AuditOutcome, AuditRecord, Event};

use super::context::HistoryContext;
use super::errors::{VersionError, VersionResult};
use super::version::{VersionId, VersionSummary};

/// Structural comparison of two versions, oldest to newest.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub older: VersionSummary,
    pub newer: VersionSummary,
    pub changes: Vec<Change>,
    pub summary: ChangeSummary,
}

#[derive(Clone)]
pub struct Comparator {
    ctx: HistoryContext,
}

impl Comparator {
    pub(crate) fn new(ctx: HistoryContext) -> Self {
        Self { ctx }
    }

    pub fn compare(
        &self,
        a: &VersionId,
        b: &VersionId,
        session: &SessionContext,
    ) -> VersionResult<Comparison> {
        let first = self.ctx.versions.get(a)?;
        let second = self.ctx.versions.get(b)?;
        if first.record_id() != second.record_id() {
            return Err(VersionError::NotFound(format!(
                "{} and {} belong to different records",
                a, b
            )));
        }
        let record_id = first.record_id().clone();
        self.ctx
            .require_view(&record_id, session, AuditAction::VersionsCompared)?;

        let (older, newer) = if first.version_number() <= second.version_number() {
            (first, second)
        } else {
            (second, first)
        };

        let key = self.ctx.record_key(
            &record_id,
            older.is_encrypted() || newer.is_encrypted(),
            session,
        )?;
        let older_state = self.ctx.open_snapshot(&older, &key)?;
        let newer_state = self.ctx.open_snapshot(&newer, &key)?;

        let changes = diff_fields(&older_state, &newer_state);
        let summary = ChangeSummary::of(&changes);

        self.ctx.metrics.increment_comparisons();
        let range = format!("{}..{}", older.version_number(), newer.version_number());
        log_event(
            Event::VersionsCompared,
            &[
                ("changes", summary.total_changes.to_string().as_str()),
                ("range", range.as_str()),
                ("record", record_id.as_str()),
            ],
        );
        self.ctx.audit(
            AuditRecord::new(
                AuditAction::VersionsCompared,
                AuditOutcome::Success,
                session.user_id(),
                record_id.as_str(),
            )
            .with_detail(range),
        );

        Ok(Comparison {
            older: older.summary(),
            newer: newer.summary(),
            changes,
            summary,
        })
    }
}
