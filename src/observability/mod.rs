//! Observability for the history engine
//!
//! - Structured logging (JSON lines)
//! - Append-only audit log
//! - Atomic counters
//!
//! # Principles
//!
//! 1. Observability never fails the operation it observes
//! 2. No record content in logs, audit records or metrics
//! 3. No background threads
//!
//! ```ignore
//! use medvault::observability::{log_event, Event};
//!
//! log_event(Event::VersionCreated, &[("version", "r1_v1"), ("changes", "2")]);
//! ```

pub mod audit;
mod events;
mod logger;
mod metrics;
mod scope;

pub use audit::{AuditAction, AuditLog, AuditOutcome, AuditRecord, FileAuditLog, MemoryAuditLog, NullAuditLog};
pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{HistoryMetrics, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log a typed event at its default severity.
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

/// Append to the audit log; a failed append is logged and swallowed.
pub fn audit(log: &dyn AuditLog, record: AuditRecord) {
    if let Err(e) = log.append(&record) {
        let reason = e.to_string();
        log_event(
            Event::AuditWriteFailed,
            &[
                ("action", record.action.as_str()),
                ("record", record.record_id.as_str()),
                ("reason", reason.as_str()),
            ],
        );
    }
}
