//! The explicitly constructed admission context.
//!
//! [`Floodgate`] owns the queue, the admission gate and the worker pool as
//! one unit with a single start and a single teardown. Construct it once at
//! startup, before accepting connections, and hand clones to whatever needs
//! to admit work.

use crate::{
    AdmissionGate, PoolConfig, PoolStats, Processor, Result, StatsSnapshot, WorkerPool, queue,
};
use std::sync::Arc;

pub struct Floodgate<T> {
    gate: AdmissionGate<T>,
    pool: Arc<WorkerPool>,
    stats: Arc<PoolStats>,
    config: PoolConfig,
}

impl<T> Clone for Floodgate<T> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            pool: Arc::clone(&self.pool),
            stats: Arc::clone(&self.stats),
            config: self.config.clone(),
        }
    }
}

impl<T> Floodgate<T>
where
    T: Send + Sync + 'static,
{
    /// Validates `config`, creates the queue and spawns the worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) if the
    /// configuration is rejected. Nothing is spawned in that case.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start<P>(config: PoolConfig, processor: P) -> Result<Self>
    where
        P: Processor<T>,
    {
        config.validate()?;

        let stats = Arc::new(PoolStats::new());
        let (producer, consumer) = queue::bounded(config.queue_capacity);
        let gate = AdmissionGate::new(producer, Arc::clone(&stats));
        let pool = WorkerPool::spawn(
            config.pool_size,
            consumer,
            processor,
            config.failure_policy,
            Arc::clone(&stats),
        );

        Ok(Self {
            gate,
            pool: Arc::new(pool),
            stats,
            config,
        })
    }

    /// Shorthand for [`AdmissionGate::try_admit`].
    ///
    /// # Errors
    ///
    /// See [`AdmissionGate::try_admit`].
    pub fn try_admit(&self, item: T) -> Result<()> {
        self.gate.try_admit(item)
    }

    /// Stops admissions, lets the workers drain the queue and waits for all
    /// of them to terminate, bounded by `shutdown_timeout` if configured.
    ///
    /// Safe to call more than once, including concurrently: every call
    /// waits for the same workers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutdownTimeout`](crate::Error::ShutdownTimeout) if
    /// workers are still running when the timeout elapses.
    pub async fn shutdown(&self) -> Result<()> {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Shutting down: draining {} queued items across {} workers",
            self.gate.queued(),
            self.pool.active_workers()
        );

        self.gate.close();
        self.pool.join(self.config.shutdown_timeout).await
    }
}

impl<T> Floodgate<T> {
    pub fn gate(&self) -> &AdmissionGate<T> {
        &self.gate
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
