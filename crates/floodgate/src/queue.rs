//! Fixed-capacity FIFO queue between the gate and the workers.
//!
//! The queue is a bounded [`mpsc`] channel. The single [`mpsc::Sender`] lives
//! in the [`Producer`]; closing the producer drops it, which lets workers
//! drain what is already buffered and then observe the end of the stream.
//! The [`mpsc::Receiver`] is shared by every worker behind an async mutex, so
//! each item is handed to exactly one worker, in the order it was accepted.

use crate::{Error, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Creates a queue holding at most `capacity` items.
///
/// # Panics
///
/// Panics if `capacity` is zero. Callers validate this through
/// [`PoolConfig::validate`](crate::PoolConfig::validate) first.
pub(crate) fn bounded<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        Producer {
            tx: RwLock::new(Some(tx)),
            capacity,
        },
        Consumer {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

pub(crate) struct Producer<T> {
    tx: RwLock<Option<mpsc::Sender<T>>>,
    capacity: usize,
}

impl<T> Producer<T> {
    /// Inserts `item` without waiting.
    ///
    /// # Errors
    ///
    /// - [`Error::QueueFull`] if `capacity` items are already buffered.
    /// - [`Error::Closed`] once [`close`](Self::close) was called.
    pub(crate) fn try_push(&self, item: T) -> Result<()> {
        let guard = self.tx.read();
        let Some(tx) = guard.as_ref() else {
            return Err(Error::Closed);
        };

        match tx.try_send(item) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(Error::QueueFull {
                capacity: self.capacity,
            }),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(Error::Closed),
        }
    }

    /// Stops accepting items. Buffered items remain available to consumers.
    pub(crate) fn close(&self) {
        self.tx.write().take();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.tx.read().is_none()
    }

    pub(crate) const fn capacity(&self) -> usize {
        self.capacity
    }
}

pub(crate) struct Consumer<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for Consumer<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T> Consumer<T> {
    /// Waits for the next item. Returns `None` once the producer is closed
    /// and every buffered item has been handed out.
    pub(crate) async fn pop(&self) -> Option<T> {
        // The lock is released as soon as an item (or end of stream) is
        // received, never held while the item is processed.
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }
}
