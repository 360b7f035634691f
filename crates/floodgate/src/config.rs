use crate::{Error, FailurePolicy, Result};
use core::time::Duration;

/// Static configuration of a [`Floodgate`](crate::Floodgate).
///
/// Set once before the pool starts; nothing here is hot-reloadable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of workers spawned at startup.
    pub pool_size: usize,
    /// Maximum number of admitted-but-not-yet-dequeued items.
    pub queue_capacity: usize,
    /// What workers do with failed items.
    pub failure_policy: FailurePolicy,
    /// Upper bound on how long shutdown waits for workers. `None` waits
    /// until every worker has terminated.
    pub shutdown_timeout: Option<Duration>,
}

impl PoolConfig {
    pub const fn new(pool_size: usize, queue_capacity: usize) -> Self {
        Self {
            pool_size,
            queue_capacity,
            failure_policy: FailurePolicy::Drop,
            shutdown_timeout: None,
        }
    }

    #[must_use]
    pub const fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    #[must_use]
    pub const fn with_shutdown_timeout(mut self, shutdown_timeout: Option<Duration>) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    /// Checks the invariants the pool relies on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `pool_size` or `queue_capacity`
    /// is zero, or if a retry policy allows zero attempts.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::InvalidConfig {
                reason: "pool_size must be greater than 0".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidConfig {
                reason: "queue_capacity must be greater than 0".to_string(),
            });
        }
        if self.failure_policy.max_attempts() == 0 {
            return Err(Error::InvalidConfig {
                reason: "retry max_attempts must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
