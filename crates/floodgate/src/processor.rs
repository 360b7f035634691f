use core::{fmt, future::Future};

/// The processing routine run by every worker.
///
/// A worker calls [`process`](Processor::process) once per attempt and waits
/// for it before taking the next item. Errors and panics stay inside the
/// worker: they are reported, handled according to the configured
/// [`FailurePolicy`](crate::FailurePolicy), and never reach the caller that
/// admitted the item.
///
/// The item is passed by reference so that a retry can reuse it without
/// requiring `T: Clone`.
pub trait Processor<T>: Send + Sync + 'static {
    type Error: fmt::Display + Send;

    fn process(&self, item: &T) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
