//! Statistics tracking for pools

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Point-in-time statistics of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Total number of slots
    pub capacity: usize,
    /// Slots currently in use
    pub in_use: usize,
    /// Successful `get_object` calls
    pub total_allocs: u64,
    /// Successful `return_object` calls
    pub total_returns: u64,
    /// `get_object` calls that found the pool exhausted
    pub failed_allocs: u64,
    /// Highest simultaneous in-use count observed
    pub peak_in_use: usize,
}

impl PoolStats {
    /// Slots currently free
    pub fn free(&self) -> usize {
        self.capacity - self.in_use
    }

    /// Fraction of slots in use, `0.0` for an empty-capacity pool
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.in_use as f64 / self.capacity as f64
        }
    }
}

/// Counters for single-owner pools
#[derive(Debug, Default)]
pub(crate) struct Counters {
    allocs: u64,
    returns: u64,
    failed: u64,
    peak: usize,
}

impl Counters {
    pub(crate) fn record_alloc(&mut self, in_use: usize) {
        self.allocs += 1;
        self.peak = self.peak.max(in_use);
    }

    pub(crate) fn record_return(&mut self) {
        self.returns += 1;
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn snapshot(&self, capacity: usize, in_use: usize) -> PoolStats {
        PoolStats {
            capacity,
            in_use,
            total_allocs: self.allocs,
            total_returns: self.returns,
            failed_allocs: self.failed,
            peak_in_use: self.peak,
        }
    }
}

/// Counters for shared pools
#[derive(Debug, Default)]
pub(crate) struct AtomicCounters {
    allocs: AtomicU64,
    returns: AtomicU64,
    failed: AtomicU64,
    peak: AtomicUsize,
}

impl AtomicCounters {
    pub(crate) fn record_alloc(&self, in_use: usize) {
        self.allocs.fetch_add(1, Ordering::Relaxed);
        self.peak.fetch_max(in_use, Ordering::Relaxed);
    }

    pub(crate) fn record_return(&self) {
        self.returns.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.allocs.store(0, Ordering::Relaxed);
        self.returns.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.peak.store(0, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, capacity: usize, in_use: usize) -> PoolStats {
        PoolStats {
            capacity,
            in_use,
            total_allocs: self.allocs.load(Ordering::Relaxed),
            total_returns: self.returns.load(Ordering::Relaxed),
            failed_allocs: self.failed.load(Ordering::Relaxed),
            peak_in_use: self.peak.load(Ordering::Relaxed),
        }
    }
}
