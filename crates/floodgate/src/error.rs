//! Error types for admission and pool lifecycle.
//!
//! Only two outcomes ever cross the gate/pool boundary: an item is accepted
//! or it is rejected. [`Error`] covers the rejection side plus the lifecycle
//! failures of the pool itself.
//!
//! ## Error Cases
//! - `QueueFull`: the queue is at capacity; the caller should shed load.
//! - `Closed`: the gate was closed because shutdown started.
//! - `InvalidConfig`: a [`PoolConfig`](crate::PoolConfig) failed validation.
//! - `ShutdownTimeout`: workers did not terminate in time.
//!
//! Failures of the processing routine are described by [`ProcessingError`].
//! They are reported by the worker that hit them and never returned to the
//! admitting caller.

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for admission and pool lifecycle.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The queue holds `capacity` items already.
    #[error("Queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Shutdown has started; no new work is admitted.
    #[error("Admission gate is closed")]
    Closed,

    /// The pool configuration was rejected before anything was spawned.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Workers were still running when the shutdown timeout elapsed.
    #[error("Shutdown timed out with {remaining} worker(s) still running")]
    ShutdownTimeout { remaining: usize },
}

impl Error {
    /// Returns `true` for rejections caused by load rather than lifecycle.
    pub const fn is_overload(&self) -> bool {
        matches!(self, Self::QueueFull { .. })
    }
}

/// A failed processing attempt, local to the worker that ran it.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum ProcessingError {
    /// The processor returned an error.
    #[error("processing failed: {0}")]
    Failed(String),

    /// The processor panicked; the panic was caught by the worker.
    #[error("processing panicked: {0}")]
    Panicked(String),
}

impl ProcessingError {
    pub(crate) fn from_panic(payload: &(dyn core::any::Any + Send)) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panicked(msg)
    }
}
