//! Flush metrics
//!
//! Process-wide counters fed from `FlushStats`. The memtable never records
//! into these itself; whoever drives the flush decides where stats go.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::memtable::FlushStats;

/// Atomic counters describing memtable flushes
#[derive(Debug, Default)]
pub struct FlushMetrics {
    flushes: AtomicU64,
    rows_flushed: AtomicU64,
    flush_duration_us: AtomicU64,
    failed_flushes: AtomicU64,
}

impl FlushMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful flush
    pub fn record(&self, stats: &FlushStats) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.rows_flushed.fetch_add(stats.rows, Ordering::Relaxed);
        let micros = u64::try_from(stats.duration.as_micros()).unwrap_or(u64::MAX);
        self.flush_duration_us.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    pub fn rows_flushed(&self) -> u64 {
        self.rows_flushed.load(Ordering::Relaxed)
    }

    /// Total time spent in successful flushes, in microseconds
    pub fn flush_duration_us(&self) -> u64 {
        self.flush_duration_us.load(Ordering::Relaxed)
    }

    pub fn failed_flushes(&self) -> u64 {
        self.failed_flushes.load(Ordering::Relaxed)
    }
}
