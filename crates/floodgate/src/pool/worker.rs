use crate::{FailurePolicy, PoolStats, ProcessingError, Processor, queue::Consumer};
use core::panic::AssertUnwindSafe;
use futures::FutureExt;
use std::sync::Arc;

/// Decrements the outstanding-worker count however the loop exits.
struct ExitGuard(Arc<PoolStats>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.worker_stopped();
    }
}

/// Worker task that drains the shared queue.
///
/// Each iteration waits for the next item, runs the processor on it and
/// goes back to waiting. The loop ends when the queue is closed and empty,
/// which only happens during shutdown.
///
/// # Arguments
///
/// - `worker_id`: Index of this worker, used for logs.
/// - `consumer`: Shared receiving half of the queue.
/// - `processor`: The processing routine.
/// - `policy`: What to do with an item whose attempt failed.
/// - `stats`: Counters shared with the gate. The caller has already counted
///   this worker as active.
pub(crate) async fn worker_loop<T, P>(
    worker_id: usize,
    consumer: Consumer<T>,
    processor: Arc<P>,
    policy: FailurePolicy,
    stats: Arc<PoolStats>,
) where
    T: Send + Sync + 'static,
    P: Processor<T>,
{
    let _exit = ExitGuard(Arc::clone(&stats));

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    while let Some(item) = consumer.pop().await {
        stats.record_dequeued();
        handle_item(worker_id, &item, processor.as_ref(), policy, &stats).await;
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} stopped");
}

/// Runs one item to completion according to `policy`.
///
/// Errors and panics from the processor are converted into
/// [`ProcessingError`]s and reported here; nothing propagates out.
#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
async fn handle_item<T, P>(
    worker_id: usize,
    item: &T,
    processor: &P,
    policy: FailurePolicy,
    stats: &PoolStats,
) where
    T: Send + Sync + 'static,
    P: Processor<T>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;

    loop {
        // The call itself must happen inside the guarded future: a processor
        // may panic before it hands back its future.
        let outcome = AssertUnwindSafe(async { processor.process(item).await })
            .catch_unwind()
            .await;

        let err = match outcome {
            Ok(Ok(())) => {
                stats.record_processed();
                return;
            }
            Ok(Err(e)) => ProcessingError::Failed(e.to_string()),
            Err(payload) => {
                stats.record_panicked();
                ProcessingError::from_panic(payload.as_ref())
            }
        };

        if attempt >= max_attempts {
            #[cfg(feature = "tracing")]
            tracing::warn!("Worker {worker_id} dropped item after {attempt} attempt(s): {err}");
            stats.record_failed();
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Worker {worker_id} retrying item (attempt {attempt}/{max_attempts}): {err}");
        stats.record_retry();
        attempt += 1;

        let backoff = policy.backoff();
        if !backoff.is_zero() {
            tokio::time::sleep(backoff).await;
        }
    }
}
