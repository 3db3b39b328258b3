use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion and search activity.
#[derive(Default)]
pub struct IngestMetrics {
    files_ingested: AtomicU64,
    duplicates_skipped: AtomicU64,
    ingest_failures: AtomicU64,
    searches_served: AtomicU64,
}

impl IngestMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully ingested file, or a duplicate that was skipped.
    pub fn record_ingest(&self, created: bool) {
        if created {
            self.files_ingested.fetch_add(1, Ordering::Relaxed);
        } else {
            self.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record an ingestion that ended in a failure state.
    pub fn record_failure(&self) {
        self.ingest_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a served search request.
    pub fn record_search(&self) {
        self.searches_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_ingested: self.files_ingested.load(Ordering::Relaxed),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::Relaxed),
            ingest_failures: self.ingest_failures.load(Ordering::Relaxed),
            searches_served: self.searches_served.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of activity counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of novel files indexed since startup.
    pub files_ingested: u64,
    /// Number of uploads skipped because identical content was already indexed.
    pub duplicates_skipped: u64,
    /// Number of uploads that ended in an error state.
    pub ingest_failures: u64,
    /// Number of search requests served.
    pub searches_served: u64,
}
