//! Non-blocking admission of work items.
//!
//! The [`AdmissionGate`] sits on the request path. It decides in O(1), and
//! without ever waiting on a worker, whether an item is accepted into the
//! queue. What the caller does after an accepted admission is its own
//! business: the gate gives no guarantee that the item has been, or will be,
//! processed by any particular time.

use crate::{Error, PoolStats, Result, queue::Producer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Cloneable handle used by callers to submit work items.
pub struct AdmissionGate<T> {
    inner: Arc<GateInner<T>>,
}

struct GateInner<T> {
    producer: Producer<T>,
    closed: CancellationToken,
    stats: Arc<PoolStats>,
}

impl<T> Clone for AdmissionGate<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> AdmissionGate<T> {
    pub(crate) fn new(producer: Producer<T>, stats: Arc<PoolStats>) -> Self {
        Self {
            inner: Arc::new(GateInner {
                producer,
                closed: CancellationToken::new(),
                stats,
            }),
        }
    }

    /// Attempts to enqueue `item` without blocking.
    ///
    /// On success the item is owned by the pool. Item content is not
    /// inspected.
    ///
    /// # Errors
    ///
    /// - [`Error::QueueFull`] if the queue is at capacity. This is the
    ///   overload signal and is never retried internally.
    /// - [`Error::Closed`] if shutdown has started.
    pub fn try_admit(&self, item: T) -> Result<()> {
        let inner = &*self.inner;

        if inner.closed.is_cancelled() {
            inner.stats.record_rejected_closed();
            return Err(Error::Closed);
        }

        match inner.producer.try_push(item) {
            Ok(()) => {
                inner.stats.record_admitted();
                Ok(())
            }
            Err(e @ Error::QueueFull { .. }) => {
                inner.stats.record_rejected_full();
                #[cfg(feature = "tracing")]
                tracing::trace!("Admission rejected: {e}");
                Err(e)
            }
            Err(e) => {
                inner.stats.record_rejected_closed();
                Err(e)
            }
        }
    }

    /// Stops admitting new items. Items already queued are left for the
    /// workers to drain.
    pub fn close(&self) {
        if !self.inner.closed.is_cancelled() {
            #[cfg(feature = "tracing")]
            tracing::info!("Closing admission gate");
        }
        self.inner.closed.cancel();
        self.inner.producer.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled() || self.inner.producer.is_closed()
    }

    /// Cancelled once the gate closes. Useful for tying other shutdown work
    /// to the gate's lifecycle.
    pub fn closed_token(&self) -> CancellationToken {
        self.inner.closed.clone()
    }

    pub fn capacity(&self) -> usize {
        self.inner.producer.capacity()
    }

    /// Number of items admitted but not yet picked up by a worker.
    pub fn queued(&self) -> usize {
        self.inner.stats.snapshot().queued
    }
}
