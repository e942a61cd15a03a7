use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing indexing activity.
#[derive(Default)]
pub struct IndexMetrics {
    documents_indexed: AtomicU64,
    chunks_written: AtomicU64,
    documents_failed: AtomicU64,
}

impl IndexMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an indexed document and the number of entries written for it.
    pub fn record_document(&self, chunk_count: u64) {
        self.documents_indexed.fetch_add(1, Ordering::Relaxed);
        self.chunks_written.fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record a document whose indexing was aborted.
    pub fn record_failure(&self) {
        self.documents_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_indexed: self.documents_indexed.load(Ordering::Relaxed),
            chunks_written: self.chunks_written.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of indexing counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents indexed since startup.
    pub documents_indexed: u64,
    /// Total vector entries written across all indexed documents.
    pub chunks_written: u64,
    /// Number of documents whose indexing failed.
    pub documents_failed: u64,
}
