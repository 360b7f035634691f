//! Counters shared by the admission gate and the workers.
//!
//! All updates use relaxed atomics: the numbers are for observation only and
//! never drive admission decisions. The capacity invariant is enforced by
//! the queue itself.

use portable_atomic::{AtomicIsize, AtomicU64, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct PoolStats {
    admitted: AtomicU64,
    rejected_full: AtomicU64,
    rejected_closed: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    retried: AtomicU64,
    // Signed: a worker may record a dequeue before the gate records the
    // matching admission.
    queued: AtomicIsize,
    in_flight: AtomicUsize,
    active_workers: AtomicUsize,
}

/// Point-in-time copy of [`PoolStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StatsSnapshot {
    /// Items accepted by the gate.
    pub admitted: u64,
    /// Admissions refused because the queue was full.
    pub rejected_full: u64,
    /// Admissions refused because shutdown had started.
    pub rejected_closed: u64,
    /// Items whose processing succeeded.
    pub processed: u64,
    /// Items dropped after their last failed attempt.
    pub failed: u64,
    /// Attempts that ended in a caught panic.
    pub panicked: u64,
    /// Extra attempts made under [`FailurePolicy::Retry`](crate::FailurePolicy::Retry).
    pub retried: u64,
    /// Items admitted but not yet picked up by a worker.
    pub queued: usize,
    /// Items currently held by a worker.
    pub in_flight: usize,
    /// Workers that have not terminated yet.
    pub active_workers: usize,
}

impl PoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected_full: self.rejected_full.load(Ordering::Relaxed),
            rejected_closed: self.rejected_closed.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            queued: usize::try_from(self.queued.load(Ordering::Relaxed)).unwrap_or(0),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            active_workers: self.active_workers.load(Ordering::Relaxed),
        }
    }

    pub fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::Relaxed)
    }

    pub(crate) fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected_full(&self) {
        self.rejected_full.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected_closed(&self) {
        self.rejected_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dequeued(&self) {
        self.queued.fetch_sub(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_processed(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn worker_started(&self) {
        self.active_workers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn worker_stopped(&self) {
        self.active_workers.fetch_sub(1, Ordering::Relaxed);
    }
}
