//! Counters for locally-absorbed conditions

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for conditions the sink absorbs without aborting the pipeline.
#[derive(Debug, Default)]
pub(crate) struct SinkMetrics {
    records_written: AtomicU64,
    records_dropped: AtomicU64,
    write_errors: AtomicU64,
    rotations: AtomicU64,
}

impl SinkMetrics {
    pub(crate) fn record_written(&self) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_written: self.records_written.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the sink counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Records formatted and handed to a destination
    pub records_written: u64,
    /// Records dropped (invalid key or unusable destination)
    pub records_dropped: u64,
    /// Write or flush failures on otherwise usable destinations
    pub write_errors: u64,
    /// Completed rename-chain rotations
    pub rotations: u64,
}
