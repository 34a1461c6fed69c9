//! History metrics
//!
//! - Counters only
//! - Monotonic increase
//! - Reset only on process start

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for one `VersionHistory`.
///
/// Relaxed ordering; counters are independent.
#[derive(Debug, Default)]
pub struct HistoryMetrics {
    versions_created: AtomicU64,
    baselines_created: AtomicU64,
    empty_versions: AtomicU64,
    sequence_conflicts: AtomicU64,
    rollbacks: AtomicU64,
    comparisons: AtomicU64,
    integrity_failures: AtomicU64,
    session_locked: AtomicU64,
    permission_denials: AtomicU64,
    versions_purged: AtomicU64,
    purge_failures: AtomicU64,
}

impl HistoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_versions_created(&self) {
        self.versions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_baselines(&self) {
        self.baselines_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Versions recorded with no structural change.
    pub fn increment_empty_versions(&self) {
        self.empty_versions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_conflicts(&self) {
        self.sequence_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rollbacks(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_comparisons(&self) {
        self.comparisons.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_integrity_failures(&self) {
        self.integrity_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_session_locked(&self) {
        self.session_locked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_permission_denials(&self) {
        self.permission_denials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_versions_purged(&self, count: u64) {
        self.versions_purged.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_purge_failures(&self, count: u64) {
        self.purge_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            versions_created: self.versions_created.load(Ordering::Relaxed),
            baselines_created: self.baselines_created.load(Ordering::Relaxed),
            empty_versions: self.empty_versions.load(Ordering::Relaxed),
            sequence_conflicts: self.sequence_conflicts.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            comparisons: self.comparisons.load(Ordering::Relaxed),
            integrity_failures: self.integrity_failures.load(Ordering::Relaxed),
            session_locked: self.session_locked.load(Ordering::Relaxed),
            permission_denials: self.permission_denials.load(Ordering::Relaxed),
            versions_purged: self.versions_purged.load(Ordering::Relaxed),
            purge_failures: self.purge_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of all counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Includes baselines.
    pub versions_created: u64,
    pub baselines_created: u64,
    pub empty_versions: u64,
    pub sequence_conflicts: u64,
    pub rollbacks: u64,
    pub comparisons: u64,
    pub integrity_failures: u64,
    pub session_locked: u64,
    pub permission_denials: u64,
    pub versions_purged: u64,
    pub purge_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_is_zero() {
        assert_eq!(HistoryMetrics::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_increment_counters() {
        let metrics = HistoryMetrics::new();
        metrics.increment_versions_created();
        metrics.increment_versions_created();
        metrics.increment_baselines();
        metrics.increment_conflicts();
        metrics.increment_rollbacks();
        metrics.increment_integrity_failures();
        metrics.add_versions_purged(4);
        metrics.add_purge_failures(1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.versions_created, 2);
        assert_eq!(snapshot.baselines_created, 1);
        assert_eq!(snapshot.sequence_conflicts, 1);
        assert_eq!(snapshot.rollbacks, 1);
        assert_eq!(snapshot.integrity_failures, 1);
        assert_eq!(snapshot.versions_purged, 4);
        assert_eq!(snapshot.purge_failures, 1);
        assert_eq!(snapshot.comparisons, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = HistoryMetrics::new();
        metrics.increment_comparisons();
        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["comparisons"], 1);
    }

    #[test]
    fn test_concurrent_increments() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(HistoryMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.increment_versions_created();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().versions_created, 400);
    }
}
