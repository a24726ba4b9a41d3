// HTTP request metrics middleware
// Times every request and records `http_requests_total` and
// `http_request_duration_seconds`, labelled by method, normalized endpoint
// and status, exactly once per request.
//
// obs-instrument maintainers 2026 Oct

use crate::metrics::MetricsRegistry;
use crate::normalize::normalize_endpoint;
use axum::{
    extract::{OriginalUri, Request, State},
    middleware::Next,
    response::Response,
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::warn;

pub const REQUESTS_TOTAL: &str = "http_requests_total";
pub const REQUEST_DURATION: &str = "http_request_duration_seconds";

/// Status label used when no response was produced (panic or cancellation).
pub const UNKNOWN_STATUS: &str = "unknown";

/// Writes the per-request HTTP metrics into the registry.
#[derive(Clone)]
pub struct HttpMetrics {
    registry: MetricsRegistry,
}

impl HttpMetrics {
    pub fn new(registry: MetricsRegistry) -> Self {
        Self { registry }
    }

    /// Count one request and observe its duration. Never fails; registry
    /// errors are logged and dropped.
    pub fn record(&self, method: &str, endpoint: &str, status: &str, elapsed: Duration) {
        let labels = [("method", method), ("endpoint", endpoint), ("status", status)];

        match self
            .registry
            .counter(REQUESTS_TOTAL, "Total number of HTTP requests", &labels)
        {
            Ok(counter) => counter.inc(),
            Err(err) => warn!(error = %err, metric = REQUESTS_TOTAL, "request counter unavailable"),
        }

        match self.registry.histogram(
            REQUEST_DURATION,
            "HTTP request duration in seconds",
            &labels,
        ) {
            Ok(histogram) => histogram.observe(elapsed.as_secs_f64()),
            Err(err) => {
                warn!(error = %err, metric = REQUEST_DURATION, "request timer unavailable")
            }
        }
    }
}

/// In-flight request outcome. Recording happens in `Drop`, so it runs once
/// on every exit path: normal return, panic, or the future being dropped.
struct RequestOutcome {
    metrics: HttpMetrics,
    method: String,
    raw_path: Option<String>,
    status: Option<u16>,
    start: Instant,
}

impl Drop for RequestOutcome {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let endpoint = normalize_endpoint(self.raw_path.as_deref());
        let status = self
            .status
            .map(|code| code.to_string())
            .unwrap_or_else(|| UNKNOWN_STATUS.to_string());
        self.metrics.record(&self.method, &endpoint, &status, elapsed);
    }
}

/// Axum middleware: install with
/// `axum::middleware::from_fn_with_state(http_metrics, track_requests)`.
///
/// A panic in the downstream handler is recorded with status `unknown` and
/// then resumed, so outer layers still see it.
pub async fn track_requests(
    State(metrics): State<HttpMetrics>,
    request: Request,
    next: Next,
) -> Response {
    // Nested routers rewrite the URI; label by what the client asked for.
    let raw_path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let mut outcome = RequestOutcome {
        metrics,
        method: request.method().as_str().to_string(),
        raw_path: Some(raw_path),
        status: None,
        start: Instant::now(),
    };

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => {
            outcome.status = Some(response.status().as_u16());
            drop(outcome);
            response
        }
        Err(panic) => {
            drop(outcome);
            std::panic::resume_unwind(panic)
        }
    }
}
