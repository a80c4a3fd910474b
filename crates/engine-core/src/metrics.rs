use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    records_read: AtomicU64,
    records_written: AtomicU64,
    records_skipped: AtomicU64,
    records_filtered: AtomicU64,
    chunks_committed: AtomicU64,
    chunks_already_applied: AtomicU64,
    retry_count: AtomicU64,
}

/// Per-run counters shared between the orchestrator and the writer service.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_read: u64,
    pub records_written: u64,
    pub records_skipped: u64,
    pub records_filtered: u64,
    pub chunks_committed: u64,
    pub chunks_already_applied: u64,
    pub retry_count: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_read(&self, count: u64) {
        self.inner.records_read.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_written(&self, count: u64) {
        self.inner
            .records_written
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_skipped(&self, count: u64) {
        self.inner
            .records_skipped
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_filtered(&self, count: u64) {
        self.inner
            .records_filtered
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_committed(&self, count: u64) {
        self.inner
            .chunks_committed
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_already_applied(&self, count: u64) {
        self.inner
            .chunks_already_applied
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_retries(&self, count: u64) {
        self.inner.retry_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn skipped(&self) -> u64 {
        self.inner.records_skipped.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_read: self.inner.records_read.load(Ordering::Relaxed),
            records_written: self.inner.records_written.load(Ordering::Relaxed),
            records_skipped: self.inner.records_skipped.load(Ordering::Relaxed),
            records_filtered: self.inner.records_filtered.load(Ordering::Relaxed),
            chunks_committed: self.inner.chunks_committed.load(Ordering::Relaxed),
            chunks_already_applied: self.inner.chunks_already_applied.load(Ordering::Relaxed),
            retry_count: self.inner.retry_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_counters() {
        let metrics = Metrics::new();
        let handle = metrics.clone();

        handle.increment_read(3);
        handle.increment_skipped(1);
        metrics.increment_committed(1);

        let snap = metrics.snapshot();
        assert_eq!(snap.records_read, 3);
        assert_eq!(snap.records_skipped, 1);
        assert_eq!(snap.chunks_committed, 1);
        assert_eq!(metrics.skipped(), 1);
    }
}
