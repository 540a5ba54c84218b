//! Marshaling statistics and the allocation ledger.
//!
//! Every byte region the binding allocates is counted here when it is created
//! and again when it is freed, so `allocations - frees` is the number of
//! regions currently alive. Tests use this to check that every exit path
//! frees exactly what it allocated.

use std::sync::atomic::{AtomicU64, Ordering};

/// Marshaling counters.
///
/// All counters are atomic; allocations are freed on worker threads while the
/// host thread reads the totals.
#[derive(Debug, Default)]
pub struct MarshalStats {
    // Allocation ledger
    allocations: AtomicU64,
    frees: AtomicU64,
    bytes_allocated: AtomicU64,
    bytes_freed: AtomicU64,

    // Slice kinds
    zero_copy_slices: AtomicU64,
    retained_slices: AtomicU64,
    sentinel_slices: AtomicU64,
    owned_copies: AtomicU64,

    // Dispatch
    jobs_dispatched: AtomicU64,
    callbacks_invoked: AtomicU64,

    // Errors by class
    setup_failures: AtomicU64,
    validation_failures: AtomicU64,
    engine_failures: AtomicU64,
}

impl MarshalStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_allocation(&self, bytes: usize) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.bytes_allocated
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_free(&self, bytes: usize) {
        self.frees.fetch_add(1, Ordering::Relaxed);
        self.bytes_freed.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_zero_copy(&self) {
        self.zero_copy_slices.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retained(&self) {
        self.retained_slices.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sentinel(&self) {
        self.sentinel_slices.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_owned_copy(&self) {
        self.owned_copies.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatch(&self) {
        self.jobs_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_callback(&self) {
        self.callbacks_invoked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_setup_failure(&self) {
        self.setup_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_validation_failure(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_engine_failure(&self) {
        self.engine_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of regions allocated.
    pub fn allocations(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }

    /// Returns the number of regions freed.
    pub fn frees(&self) -> u64 {
        self.frees.load(Ordering::Relaxed)
    }

    /// Returns the number of regions allocated but not yet freed.
    pub fn outstanding(&self) -> u64 {
        self.allocations().saturating_sub(self.frees())
    }

    /// Returns the total bytes allocated.
    pub fn bytes_allocated(&self) -> u64 {
        self.bytes_allocated.load(Ordering::Relaxed)
    }

    /// Returns the total bytes freed.
    pub fn bytes_freed(&self) -> u64 {
        self.bytes_freed.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            allocations: self.allocations(),
            frees: self.frees(),
            bytes_allocated: self.bytes_allocated(),
            bytes_freed: self.bytes_freed(),
            zero_copy_slices: self.zero_copy_slices.load(Ordering::Relaxed),
            retained_slices: self.retained_slices.load(Ordering::Relaxed),
            sentinel_slices: self.sentinel_slices.load(Ordering::Relaxed),
            owned_copies: self.owned_copies.load(Ordering::Relaxed),
            jobs_dispatched: self.jobs_dispatched.load(Ordering::Relaxed),
            callbacks_invoked: self.callbacks_invoked.load(Ordering::Relaxed),
            setup_failures: self.setup_failures.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            engine_failures: self.engine_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`MarshalStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Regions allocated by the slice view and copy allocator.
    pub allocations: u64,
    /// Regions freed.
    pub frees: u64,
    /// Total bytes allocated.
    pub bytes_allocated: u64,
    /// Total bytes freed.
    pub bytes_freed: u64,
    /// Slices that referenced a live host buffer directly.
    pub zero_copy_slices: u64,
    /// Slices that held a retained host buffer handle.
    pub retained_slices: u64,
    /// Slices that fell back to the one-byte empty sentinel.
    pub sentinel_slices: u64,
    /// Owned copies created.
    pub owned_copies: u64,
    /// Jobs handed to the worker pool.
    pub jobs_dispatched: u64,
    /// Callbacks invoked on the host thread.
    pub callbacks_invoked: u64,
    /// Calls rejected before a callback was found.
    pub setup_failures: u64,
    /// Validation errors delivered through a callback.
    pub validation_failures: u64,
    /// Engine errors delivered through a callback.
    pub engine_failures: u64,
}

impl StatsSnapshot {
    /// Returns the number of regions allocated but not yet freed.
    pub fn outstanding(&self) -> u64 {
        self.allocations.saturating_sub(self.frees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = MarshalStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn ledger_balances() {
        let stats = MarshalStats::new();
        stats.record_allocation(10);
        stats.record_allocation(1);
        assert_eq!(stats.outstanding(), 2);
        assert_eq!(stats.bytes_allocated(), 11);

        stats.record_free(10);
        stats.record_free(1);
        assert_eq!(stats.outstanding(), 0);
        assert_eq!(stats.bytes_freed(), 11);
    }

    #[test]
    fn snapshot_copies_counters() {
        let stats = MarshalStats::new();
        stats.record_zero_copy();
        stats.record_callback();
        stats.record_setup_failure();

        let snap = stats.snapshot();
        assert_eq!(snap.zero_copy_slices, 1);
        assert_eq!(snap.callbacks_invoked, 1);
        assert_eq!(snap.setup_failures, 1);
        assert_eq!(snap.outstanding(), 0);
    }
}
