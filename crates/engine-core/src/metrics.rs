use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    records_processed: AtomicU64,
    messages_produced: AtomicU64,
    messages_acked: AtomicU64,
    bytes_produced: AtomicU64,
    produce_failures: AtomicU64,
    flushes: AtomicU64,
    flush_failures: AtomicU64,
}

/// Session counters shared by the ingest loop, the workers and delivery callbacks.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_processed: u64,
    pub messages_produced: u64,
    pub messages_acked: u64,
    pub bytes_produced: u64,
    pub produce_failures: u64,
    pub flushes: u64,
    pub flush_failures: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_records(&self, count: u64) {
        self.inner
            .records_processed
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_produced(&self, bytes: u64) {
        self.inner.messages_produced.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_produced.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_acked(&self) {
        self.inner.messages_acked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_produce_failure(&self) {
        self.inner.produce_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, ok: bool) {
        self.inner.flushes.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.inner.flush_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn records_processed(&self) -> u64 {
        self.inner.records_processed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_processed: self.inner.records_processed.load(Ordering::Relaxed),
            messages_produced: self.inner.messages_produced.load(Ordering::Relaxed),
            messages_acked: self.inner.messages_acked.load(Ordering::Relaxed),
            bytes_produced: self.inner.bytes_produced.load(Ordering::Relaxed),
            produce_failures: self.inner.produce_failures.load(Ordering::Relaxed),
            flushes: self.inner.flushes.load(Ordering::Relaxed),
            flush_failures: self.inner.flush_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
