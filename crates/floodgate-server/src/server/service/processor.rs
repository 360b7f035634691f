use super::request::RequestDescriptor;
use crate::server::telemetry::{
    increment_items_processed, record_processing_duration, record_queue_wait,
};
use core::{convert::Infallible, future::Future, time::Duration};
use floodgate::Processor;
use std::time::Instant;
use tracing::Instrument;

/// Simulates the work done for each admitted request by holding a worker for
/// a fixed delay.
#[derive(Debug, Clone, Copy)]
pub struct RequestProcessor {
    delay: Duration,
}

impl RequestProcessor {
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Processor<RequestDescriptor> for RequestProcessor {
    type Error = Infallible;

    fn process(
        &self,
        request: &RequestDescriptor,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let span = tracing::debug_span!("process", method = %request.method, path = %request.path);
        async move {
            let started = Instant::now();
            let queue_wait = started.duration_since(request.received_at);
            record_queue_wait(queue_wait.as_secs_f64() * 1000.0);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            record_processing_duration(started.elapsed().as_secs_f64() * 1000.0);
            increment_items_processed();

            tracing::info!(
                method = %request.method,
                user_agent = request.user_agent.as_deref().unwrap_or("-"),
                queue_wait_ms = queue_wait.as_millis(),
                "Processed request: {}",
                request.path
            );
            Ok(())
        }
        .instrument(span)
    }
}
