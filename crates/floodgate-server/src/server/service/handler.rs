use super::request::RequestDescriptor;
use crate::server::telemetry::{increment_admissions, increment_errors, increment_rejections};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use core::time::Duration;
use floodgate::{Floodgate, StatsSnapshot};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub const HEALTH_OK: &str = "Health OK";
pub const ACCEPTED: &str = "Request received and queued";
pub const QUEUE_FULL: &str = "Queue full. Please try again later.";
pub const SHUTTING_DOWN: &str = "Service is shutting down";

#[derive(Clone)]
pub struct AppState {
    pub floodgate: Floodgate<RequestDescriptor>,
    pub response_delay: Duration,
    pub count_rejections_as_errors: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/", get(admit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    HEALTH_OK
}

async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.floodgate.stats())
}

/// Hands the request to the worker pool and answers without waiting for it
/// to be processed.
async fn admit(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<&'static str, AdmissionRejection> {
    let descriptor = RequestDescriptor::new(method, &uri, &headers);

    if let Err(e) = state.floodgate.try_admit(descriptor) {
        let rejection = AdmissionRejection(e);
        rejection.record(uri.path(), state.count_rejections_as_errors);
        return Err(rejection);
    }

    increment_admissions();

    if !state.response_delay.is_zero() {
        tokio::time::sleep(state.response_delay).await;
    }

    Ok(ACCEPTED)
}

/// A request the admission gate refused.
#[derive(Debug)]
pub struct AdmissionRejection(floodgate::Error);

impl AdmissionRejection {
    const fn reason(&self) -> &'static str {
        if self.0.is_overload() {
            "queue_full"
        } else {
            "closed"
        }
    }

    fn record(&self, path: &str, count_as_error: bool) {
        increment_rejections(self.reason());

        if !self.0.is_overload() {
            tracing::debug!(path, "Rejected request during shutdown");
            return;
        }

        if count_as_error {
            increment_errors();
            tracing::warn!(path, "Rejected request: {}", self.0);
        } else {
            tracing::debug!(path, "Rejected request: {}", self.0);
        }
    }
}

impl IntoResponse for AdmissionRejection {
    fn into_response(self) -> Response {
        let body = if self.0.is_overload() {
            QUEUE_FULL
        } else {
            SHUTTING_DOWN
        };
        (StatusCode::SERVICE_UNAVAILABLE, body).into_response()
    }
}
