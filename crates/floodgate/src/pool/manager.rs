//! Spawning and joining of the worker tasks.
//!
//! All workers pull from one shared queue, so there is no per-worker
//! dispatch: whichever worker is waiting first takes the next item. The
//! pool's only job after spawning is to know when every worker has exited.

use super::worker::worker_loop;
use crate::{Error, FailurePolicy, PoolStats, Processor, Result, queue::Consumer};
use core::time::Duration;
use std::sync::Arc;
use tokio::{sync::Mutex, task::JoinHandle};

/// A fixed set of worker tasks plus what is needed to wait for them.
pub struct WorkerPool {
    handles: Mutex<Vec<JoinHandle<()>>>,
    stats: Arc<PoolStats>,
    size: usize,
}

impl WorkerPool {
    /// Spawns `size` workers on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub(crate) fn spawn<T, P>(
        size: usize,
        consumer: Consumer<T>,
        processor: P,
        policy: FailurePolicy,
        stats: Arc<PoolStats>,
    ) -> Self
    where
        T: Send + Sync + 'static,
        P: Processor<T>,
    {
        let processor = Arc::new(processor);
        let mut handles = Vec::with_capacity(size);

        for worker_id in 0..size {
            // Counted before the task is first polled so that the count
            // never under-reports a worker that has not started yet.
            stats.worker_started();
            handles.push(tokio::spawn(worker_loop(
                worker_id,
                consumer.clone(),
                Arc::clone(&processor),
                policy,
                Arc::clone(&stats),
            )));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Spawned {size} workers");

        Self {
            handles: Mutex::new(handles),
            stats,
            size,
        }
    }

    /// Number of workers the pool was started with.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Workers that have not reached their terminal state yet.
    pub fn active_workers(&self) -> usize {
        self.stats.active_workers()
    }

    /// Waits for every worker to terminate.
    ///
    /// Workers only terminate once the queue is closed and drained, so this
    /// is meant to be called after the gate has been closed. Concurrent
    /// callers queue up on the same handles, so none of them returns before
    /// the workers are done.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutdownTimeout`] if `timeout` elapses first. The
    /// still-running workers are kept, so a later call can wait for them
    /// again.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub async fn join(&self, timeout: Option<Duration>) -> Result<()> {
        let wait = async {
            let mut handles = self.handles.lock().await;
            // A handle is only removed once its worker has been awaited.
            while let Some(handle) = handles.last_mut() {
                if let Err(e) = handle.await {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {} exited abnormally: {e}", handles.len() - 1);
                }
                handles.pop();
            }
        };

        let finished = match timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await.is_ok(),
            None => {
                wait.await;
                true
            }
        };

        let remaining = if finished {
            0
        } else {
            match self.handles.try_lock() {
                Ok(mut handles) => {
                    handles.retain(|h| !h.is_finished());
                    handles.len()
                }
                Err(_) => self.stats.active_workers(),
            }
        };

        if remaining == 0 {
            #[cfg(feature = "tracing")]
            tracing::info!("Worker pool shutdown complete");
            return Ok(());
        }

        #[cfg(feature = "tracing")]
        tracing::warn!("Worker pool shutdown timed out ({remaining} workers still active)");

        Err(Error::ShutdownTimeout { remaining })
    }
}
