//! Hierarchical memory tracker
//!
//! A tracker accumulates bytes for one owner and forwards every change to
//! its ancestors, so a shared parent sees the sum of all its children.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::utils::CachePadded;

/// Byte accumulator with an optional soft limit
///
/// ## Concurrency:
/// - Counters are atomics; a parent may be shared by many memtables
/// - Limits are soft: `consume` never fails, callers poll `limit_exceeded`
#[derive(Debug)]
pub struct MemTracker {
    label: String,
    limit: Option<u64>,
    consumption: CachePadded<AtomicU64>,
    peak: CachePadded<AtomicU64>,
    parent: Option<Arc<MemTracker>>,
}

impl MemTracker {
    /// Create a tracker, optionally attached under `parent`
    pub fn new(
        label: impl Into<String>,
        limit: Option<u64>,
        parent: Option<Arc<MemTracker>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            limit,
            consumption: CachePadded::new(AtomicU64::new(0)),
            peak: CachePadded::new(AtomicU64::new(0)),
            parent,
        })
    }

    /// Create a tracker with no parent
    pub fn root(label: impl Into<String>, limit: Option<u64>) -> Arc<Self> {
        Self::new(label, limit, None)
    }

    /// Create a tracker reporting into this one
    pub fn child(self: &Arc<Self>, label: impl Into<String>, limit: Option<u64>) -> Arc<Self> {
        Self::new(label, limit, Some(Arc::clone(self)))
    }

    /// Add `bytes` to this tracker and every ancestor
    pub fn consume(&self, bytes: u64) {
        if bytes == 0 {
            return;
        }
        let mut tracker = Some(self);
        while let Some(t) = tracker {
            let now = t.consumption.fetch_add(bytes, Ordering::Relaxed) + bytes;
            t.peak.fetch_max(now, Ordering::Relaxed);
            tracker = t.parent.as_deref();
        }
    }

    /// Subtract `bytes` from this tracker and every ancestor
    pub fn release(&self, bytes: u64) {
        if bytes == 0 {
            return;
        }
        let mut tracker = Some(self);
        while let Some(t) = tracker {
            t.consumption.fetch_sub(bytes, Ordering::Relaxed);
            tracker = t.parent.as_deref();
        }
    }

    pub fn consumption(&self) -> u64 {
        self.consumption.load(Ordering::Relaxed)
    }

    /// Highest consumption ever observed
    pub fn peak(&self) -> u64 {
        self.peak.load(Ordering::Relaxed)
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn parent(&self) -> Option<&Arc<MemTracker>> {
        self.parent.as_ref()
    }

    /// First tracker on the path to the root that is above its limit
    pub fn exceeded_tracker(&self) -> Option<&MemTracker> {
        let mut tracker = Some(self);
        while let Some(t) = tracker {
            if let Some(limit) = t.limit {
                if t.consumption() > limit {
                    return Some(t);
                }
            }
            tracker = t.parent.as_deref();
        }
        None
    }

    /// True if this tracker or any ancestor is above its limit
    pub fn limit_exceeded(&self) -> bool {
        self.exceeded_tracker().is_some()
    }
}
