use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, Request},
    middleware::Next,
    response::IntoResponse,
};
use metrics::gauge;

const METRIC_CAPTURE_IN_FLIGHT_REQUESTS: &str = "capture_in_flight_requests";
const METRIC_HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
const METRIC_HTTP_REQUESTS_DURATION_SECONDS: &str = "http_requests_duration_seconds";

static IN_FLIGHT_REQUESTS: AtomicUsize = AtomicUsize::new(0);

// Decrements even when the handler future is dropped mid-request
struct InFlightGuard;

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let requests = IN_FLIGHT_REQUESTS
            .fetch_sub(1, Ordering::Relaxed)
            .saturating_sub(1);
        gauge!(METRIC_CAPTURE_IN_FLIGHT_REQUESTS).set(requests as f64);
    }
}

/// Middleware to record some common HTTP metrics
/// Someday tower-http might provide a metrics middleware: https://github.com/tower-rs/tower-http/issues/57
pub async fn track_metrics(req: Request<Body>, next: Next) -> impl IntoResponse {
    let start = Instant::now();

    let path = if let Some(matched_path) = req.extensions().get::<MatchedPath>() {
        matched_path.as_str().to_owned()
    } else {
        req.uri().path().to_owned()
    };

    let method = req.method().clone();

    let requests = IN_FLIGHT_REQUESTS.fetch_add(1, Ordering::Relaxed) + 1;
    gauge!(METRIC_CAPTURE_IN_FLIGHT_REQUESTS).set(requests as f64);
    let _guard = InFlightGuard;

    let response = next.run(req).await;

    let latency = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    let labels = [
        ("method", method.to_string()),
        ("path", path),
        ("status", status),
    ];

    metrics::counter!(METRIC_HTTP_REQUESTS_TOTAL, &labels).increment(1);
    metrics::histogram!(METRIC_HTTP_REQUESTS_DURATION_SECONDS, &labels).record(latency);

    response
}
