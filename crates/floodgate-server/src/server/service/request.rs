use axum::http::{HeaderMap, Method, Uri, header};
use std::time::Instant;

/// What a worker receives for each admitted HTTP request.
///
/// Only request metadata is captured. The body is never read.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub user_agent: Option<String>,
    pub received_at: Instant,
}

impl RequestDescriptor {
    pub fn new(method: Method, uri: &Uri, headers: &HeaderMap) -> Self {
        Self {
            method,
            path: uri.path().to_owned(),
            user_agent: headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
            received_at: Instant::now(),
        }
    }
}
