use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion and retrieval activity.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_ingested: AtomicU64,
    summaries_generated: AtomicU64,
    records_stored: AtomicU64,
    failed_ingestions: AtomicU64,
    searches_served: AtomicU64,
    answers_served: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed ingestion and what it produced.
    pub fn record_ingestion(&self, documents: u64, summaries: u64, records: u64) {
        self.documents_ingested
            .fetch_add(documents, Ordering::Relaxed);
        self.summaries_generated
            .fetch_add(summaries, Ordering::Relaxed);
        self.records_stored.fetch_add(records, Ordering::Relaxed);
    }

    /// Record an ingestion that ended with an error status.
    pub fn record_failed_ingestion(&self) {
        self.failed_ingestions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a served search request.
    pub fn record_search(&self) {
        self.searches_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a served answer request.
    pub fn record_answer(&self) {
        self.answers_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            summaries_generated: self.summaries_generated.load(Ordering::Relaxed),
            records_stored: self.records_stored.load(Ordering::Relaxed),
            failed_ingestions: self.failed_ingestions.load(Ordering::Relaxed),
            searches_served: self.searches_served.load(Ordering::Relaxed),
            answers_served: self.answers_served.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents successfully ingested since startup.
    pub documents_ingested: u64,
    /// Number of per-chunk summaries produced by the LLM.
    pub summaries_generated: u64,
    /// Number of vector records written.
    pub records_stored: u64,
    /// Number of ingestion requests that returned an error status.
    pub failed_ingestions: u64,
    /// Number of search requests served.
    pub searches_served: u64,
    /// Number of answer requests served.
    pub answers_served: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_ingestions_and_queries() {
        let metrics = PipelineMetrics::new();
        metrics.record_ingestion(2, 5, 3);
        metrics.record_ingestion(1, 1, 1);
        metrics.record_failed_ingestion();
        metrics.record_search();
        metrics.record_answer();
        metrics.record_answer();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_ingested, 3);
        assert_eq!(snapshot.summaries_generated, 6);
        assert_eq!(snapshot.records_stored, 4);
        assert_eq!(snapshot.failed_ingestions, 1);
        assert_eq!(snapshot.searches_served, 1);
        assert_eq!(snapshot.answers_served, 2);
    }

    #[test]
    fn snapshot_starts_empty() {
        assert_eq!(PipelineMetrics::new().snapshot(), MetricsSnapshot::default());
    }
}
