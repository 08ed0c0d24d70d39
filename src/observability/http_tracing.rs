//! # HTTP Request Tracing Middleware
//!
//! Axum middleware wrapping every request in a `request_span!` span and
//! recording request count and latency.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::Instrument;

use super::metrics;

/// Route label for metrics: the matched route template, so `/v1/role/{name}`
/// is one series rather than one per role.
fn metrics_path(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

pub async fn trace_http_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let uri = request.uri().path().to_string();
    let route = metrics_path(&request);
    let start = Instant::now();

    let span = crate::request_span!(method, uri, status = tracing::field::Empty);
    let response = next.run(request).instrument(span.clone()).await;

    let status = response.status().as_u16();
    let elapsed = start.elapsed();
    span.record("status", status);

    span.in_scope(|| {
        if status >= 500 {
            tracing::warn!(status, elapsed_ms = elapsed.as_millis() as u64, "Request failed");
        } else {
            tracing::debug!(status, elapsed_ms = elapsed.as_millis() as u64, "Request completed");
        }
    });

    metrics::record_http_request(&method, &route, status, elapsed.as_secs_f64());

    response
}
