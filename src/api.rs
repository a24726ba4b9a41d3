// HTTP API implementation
// Route table, handlers and application state. Every route, including the
// metrics scrape and the 404 fallback, runs through the request
// metrics middleware.
//
// obs-instrument maintainers 2026 Oct

use crate::config::AppConfig;
use crate::debug::{DebugInstrumentation, DEFAULT_ERROR_CODE, DEFAULT_SLEEP_MS};
use crate::debug::{ERROR_ENDPOINT, SLEEP_ENDPOINT};
use crate::errors::Result;
use crate::metrics::MetricsRegistry;
use crate::middleware::{track_requests, HttpMetrics};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    middleware::from_fn_with_state,
    response::Json,
    routing::get,
    Router as AxumRouter,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub metrics: MetricsRegistry,
    /// Present only when `obs.debug.enabled` is set
    pub debug: Option<Arc<DebugInstrumentation>>,
}

impl AppState {
    pub fn build(config: &AppConfig, metrics: MetricsRegistry) -> Result<Self> {
        let debug = if config.debug_enabled() {
            Some(Arc::new(DebugInstrumentation::new(metrics.clone())?))
        } else {
            None
        };
        Ok(Self { metrics, debug })
    }
}

#[derive(Debug, Serialize)]
pub struct HelloResponse {
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Deserialize)]
pub struct SleepParams {
    pub ms: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepResponse {
    pub slept_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct ErrorParams {
    pub code: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ForcedErrorResponse {
    pub error: &'static str,
    pub code: u16,
}

/// Create the HTTP router.
///
/// Layers, outermost first: request tracing, panic-to-500 conversion, then
/// the metrics middleware. The metrics layer therefore observes panics
/// before they are turned into responses.
pub fn create_api_router(state: AppState, metrics_path: &str) -> AxumRouter {
    let mut app = AxumRouter::new()
        .route("/api/hello", get(hello))
        .route("/healthz", get(healthz))
        .route(metrics_path, get(scrape_metrics))
        .fallback(not_found);

    if let Some(debug) = state.debug.clone() {
        app = app.merge(debug_router(debug));
    }

    let http_metrics = HttpMetrics::new(state.metrics.clone());
    app.with_state(state)
        .layer(from_fn_with_state(http_metrics, track_requests))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}

fn debug_router(debug: Arc<DebugInstrumentation>) -> AxumRouter<AppState> {
    AxumRouter::new()
        .route(SLEEP_ENDPOINT, get(debug_sleep))
        .route(ERROR_ENDPOINT, get(debug_error))
        .with_state(debug)
}

/// Greeting endpoint
async fn hello() -> Json<HelloResponse> {
    Json(HelloResponse {
        message: "hello".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// Liveness/readiness probe
async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn not_found() -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "not found".to_string(),
        }),
    )
}

/// Prometheus text exposition of every registered metric
async fn scrape_metrics(
    State(state): State<AppState>,
) -> std::result::Result<([(header::HeaderName, String); 1], String), ApiError> {
    let body = state.metrics.render().map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;
    Ok(([(header::CONTENT_TYPE, state.metrics.content_type())], body))
}

/// Artificial latency: `GET /debug/sleep?ms=200`
async fn debug_sleep(
    State(debug): State<Arc<DebugInstrumentation>>,
    Query(params): Query<SleepParams>,
) -> Json<SleepResponse> {
    let slept_ms = debug.sleep(params.ms.unwrap_or(DEFAULT_SLEEP_MS)).await;
    Json(SleepResponse { slept_ms })
}

/// Controlled error response: `GET /debug/error?code=500`
async fn debug_error(
    State(debug): State<Arc<DebugInstrumentation>>,
    Query(params): Query<ErrorParams>,
) -> (StatusCode, Json<ForcedErrorResponse>) {
    let code = debug.forced_error(params.code.unwrap_or(DEFAULT_ERROR_CODE));
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ForcedErrorResponse {
            error: "forced",
            code,
        }),
    )
}
