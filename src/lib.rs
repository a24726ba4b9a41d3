// Library root module for obs-instrument
// Request instrumentation for an HTTP service: per-request metrics with
// bounded endpoint labels, Prometheus exposition, and gated debug endpoints
// that manufacture latency and error signals for alert testing.
//
// obs-instrument maintainers 2026 Oct

pub mod api;
pub mod config;
pub mod debug;
pub mod errors;
pub mod metrics;
pub mod middleware;
pub mod normalize;
