//! Metrics registry for gridstore
//!
//! - Counters only (no gauges, no histograms)
//! - Monotonic increase
//! - Thread-safe but lock-minimal

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Metrics registry containing all operational counters
///
/// # Thread Safety
///
/// All counters use atomic operations for thread-safe increments.
/// Uses Relaxed ordering for minimal overhead (eventual consistency is fine for metrics).
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Successful query count
    queries_executed: AtomicU64,
    /// Queries failed on topology or replica availability
    queries_failed: AtomicU64,
    /// Queries rejected before dispatch
    queries_malformed: AtomicU64,
    /// Sub-query attempts retried
    subquery_retries: AtomicU64,
    /// Replicas that gave no answer
    replica_failures: AtomicU64,
    /// Store executions narrowed by an index
    index_lookups: AtomicU64,
    /// Store executions that scanned every entry
    full_scans: AtomicU64,
    /// Entries evicted by expiry
    entries_expired: AtomicU64,
    /// Entries loaded by warm-up
    entries_loaded: AtomicU64,
    /// Partitions moved between members
    partitions_migrated: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    // Query metrics

    /// Increment queries executed
    pub fn increment_queries_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment queries failed
    pub fn increment_queries_failed(&self) {
        self.queries_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment queries rejected as malformed
    pub fn increment_queries_malformed(&self) {
        self.queries_malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment retried sub-queries
    pub fn increment_subquery_retries(&self) {
        self.subquery_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment unavailable replicas
    pub fn increment_replica_failures(&self) {
        self.replica_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one store execution by how it found candidates
    pub fn record_store_execution(&self, index_assisted: bool) {
        if index_assisted {
            self.index_lookups.fetch_add(1, Ordering::Relaxed);
        } else {
            self.full_scans.fetch_add(1, Ordering::Relaxed);
        }
    }

    // Store metrics

    /// Add expired entries
    pub fn add_entries_expired(&self, count: u64) {
        self.entries_expired.fetch_add(count, Ordering::Relaxed);
    }

    /// Add entries loaded by warm-up
    pub fn add_entries_loaded(&self, count: u64) {
        self.entries_loaded.fetch_add(count, Ordering::Relaxed);
    }

    // Membership metrics

    /// Increment partitions migrated
    pub fn increment_partitions_migrated(&self) {
        self.partitions_migrated.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of all metrics as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_default()
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
            queries_malformed: self.queries_malformed.load(Ordering::Relaxed),
            subquery_retries: self.subquery_retries.load(Ordering::Relaxed),
            replica_failures: self.replica_failures.load(Ordering::Relaxed),
            index_lookups: self.index_lookups.load(Ordering::Relaxed),
            full_scans: self.full_scans.load(Ordering::Relaxed),
            entries_expired: self.entries_expired.load(Ordering::Relaxed),
            entries_loaded: self.entries_loaded.load(Ordering::Relaxed),
            partitions_migrated: self.partitions_migrated.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queries_executed: u64,
    pub queries_failed: u64,
    pub queries_malformed: u64,
    pub subquery_retries: u64,
    pub replica_failures: u64,
    pub index_lookups: u64,
    pub full_scans: u64,
    pub entries_expired: u64,
    pub entries_loaded: u64,
    pub partitions_migrated: u64,
}
