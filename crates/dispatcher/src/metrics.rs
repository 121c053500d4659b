//! Per-sink counters

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters shared between a sink handle and its worker
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Outputs waiting in the sink queue
    queue_len: AtomicUsize,
    written: AtomicU64,
    /// Camera/strobe pairs among the written outputs
    pairs_written: AtomicU64,
    failures: AtomicU64,
    /// Outputs dropped because the queue was full
    dropped: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn pairs_written(&self) -> u64 {
        self.pairs_written.load(Ordering::Relaxed)
    }

    pub fn record_write(&self, is_pair: bool) {
        self.written.fetch_add(1, Ordering::Relaxed);
        if is_pair {
            self.pairs_written.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            written: self.written(),
            pairs_written: self.pairs_written(),
            failures: self.failures(),
            dropped: self.dropped(),
        }
    }
}

/// Point-in-time copy of [`SinkMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub written: u64,
    pub pairs_written: u64,
    pub failures: u64,
    pub dropped: u64,
}
