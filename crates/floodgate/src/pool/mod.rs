//! Fixed-size pool of workers draining the admission queue.
//!
//! - [`manager`] - spawning and joining the workers ([`WorkerPool`]).
//! - [`worker`] - the per-worker dequeue/process loop.

mod manager;
mod worker;

pub use manager::WorkerPool;

#[cfg(test)]
mod tests;
