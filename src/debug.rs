// Debug instrumentation
// Synthetic latency and error signals for testing dashboards and alert
// rules. Only constructed when `obs.debug.enabled` is set; when it is not,
// nothing here is registered or routed.
//
// obs-instrument maintainers 2026 Oct

use crate::errors::Result;
use crate::metrics::MetricsRegistry;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use prometheus::{Counter, Histogram, HistogramTimer};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SLEEP_ENDPOINT: &str = "/debug/sleep";
pub const ERROR_ENDPOINT: &str = "/debug/error";

pub const SLEEP_TIMER: &str = "obs_debug_sleep";
pub const FORCED_ERRORS: &str = "obs_forced_errors_total";

pub const DEFAULT_SLEEP_MS: i64 = 200;
pub const MAX_SLEEP_MS: u64 = 10_000;
pub const DEFAULT_ERROR_CODE: i64 = 500;
pub const FALLBACK_ERROR_CODE: u16 = 500;
pub const ERROR_CODES: RangeInclusive<i64> = 400..=599;

pub struct DebugInstrumentation {
    sleep_timer: Histogram,
    errors: ErrorCounters,
}

impl DebugInstrumentation {
    pub fn new(registry: MetricsRegistry) -> Result<Self> {
        let sleep_timer = registry.histogram(
            SLEEP_TIMER,
            "Custom timer for artificial sleep endpoint",
            &[("endpoint", SLEEP_ENDPOINT)],
        )?;
        info!("debug instrumentation initialized; debug endpoints are ENABLED");
        Ok(Self {
            sleep_timer,
            errors: ErrorCounters::new(registry),
        })
    }

    /// Sleep for `requested_ms` clamped into `[0, MAX_SLEEP_MS]`, timed by
    /// `obs_debug_sleep`. Returns the clamped value.
    ///
    /// If the caller drops the future mid-sleep the timer still records the
    /// shortened interval.
    pub async fn sleep(&self, requested_ms: i64) -> u64 {
        let actual = clamp_sleep_ms(requested_ms);
        if actual as i64 != requested_ms {
            warn!(requested = requested_ms, actual = actual, "sleep duration capped");
        }

        let scope = SleepScope::start(&self.sleep_timer, actual);
        tokio::time::sleep(Duration::from_millis(actual)).await;
        scope.complete();
        actual
    }

    /// Count a forced error for `requested_code`, substituting 500 for codes
    /// outside 400..=599. Returns the status to respond with.
    pub fn forced_error(&self, requested_code: i64) -> u16 {
        let code = validate_error_code(requested_code);
        if i64::from(code) != requested_code {
            warn!(requested = requested_code, actual = code, "invalid error code requested");
        }

        match self.errors.get_or_create(code) {
            Ok(counter) => counter.inc(),
            Err(err) => warn!(error = %err, code = code, "forced error counter unavailable"),
        }
        debug!(code = code, "forced error returned");
        code
    }

    pub fn error_counters(&self) -> &ErrorCounters {
        &self.errors
    }

    pub fn sleep_timer(&self) -> &Histogram {
        &self.sleep_timer
    }
}

pub fn clamp_sleep_ms(requested_ms: i64) -> u64 {
    // clamp keeps the value in 0..=MAX_SLEEP_MS, so the cast is lossless
    requested_ms.clamp(0, MAX_SLEEP_MS as i64) as u64
}

pub fn validate_error_code(requested_code: i64) -> u16 {
    if ERROR_CODES.contains(&requested_code) {
        requested_code as u16
    } else {
        FALLBACK_ERROR_CODE
    }
}

/// Timer scope around one synthetic sleep. The histogram observation
/// happens when the inner `HistogramTimer` drops.
struct SleepScope {
    _timer: HistogramTimer,
    ms: u64,
    completed: bool,
}

impl SleepScope {
    fn start(timer: &Histogram, ms: u64) -> Self {
        Self {
            _timer: timer.start_timer(),
            ms,
            completed: false,
        }
    }

    fn complete(mut self) {
        self.completed = true;
        debug!(ms = self.ms, "artificial sleep completed");
    }
}

impl Drop for SleepScope {
    fn drop(&mut self) {
        if !self.completed {
            warn!(ms = self.ms, "artificial sleep interrupted");
        }
    }
}

/// Per-status-code counter handles for `obs_forced_errors_total`.
///
/// Handles are created on first use of a code and kept for the life of the
/// process. Creation happens under the map's entry lock, so concurrent
/// first requests for one code share a single handle.
pub struct ErrorCounters {
    registry: MetricsRegistry,
    handles: DashMap<u16, Counter>,
    created: AtomicUsize,
}

impl ErrorCounters {
    pub fn new(registry: MetricsRegistry) -> Self {
        Self {
            registry,
            handles: DashMap::new(),
            created: AtomicUsize::new(0),
        }
    }

    pub fn get_or_create(&self, code: u16) -> Result<Counter> {
        match self.handles.entry(code) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let label = code.to_string();
                let counter = self.registry.counter(
                    FORCED_ERRORS,
                    "Counter for forced error responses from debug endpoint",
                    &[("code", label.as_str()), ("endpoint", ERROR_ENDPOINT)],
                )?;
                self.created.fetch_add(1, Ordering::Relaxed);
                Ok(entry.insert(counter).clone())
            }
        }
    }

    /// Current value for `code`, if a handle exists.
    pub fn value(&self, code: u16) -> Option<f64> {
        self.handles.get(&code).map(|counter| counter.get())
    }

    /// Number of handles ever created.
    pub fn handles_created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    fn instrumentation() -> (MetricsRegistry, DebugInstrumentation) {
        let registry = MetricsRegistry::new();
        let debug = DebugInstrumentation::new(registry.clone()).unwrap();
        (registry, debug)
    }

    #[test]
    fn sleep_is_clamped() {
        assert_eq!(clamp_sleep_ms(-5), 0);
        assert_eq!(clamp_sleep_ms(0), 0);
        assert_eq!(clamp_sleep_ms(250), 250);
        assert_eq!(clamp_sleep_ms(10_000), 10_000);
        assert_eq!(clamp_sleep_ms(10_001), 10_000);
        assert_eq!(clamp_sleep_ms(i64::MAX), 10_000);
        assert_eq!(clamp_sleep_ms(i64::MIN), 0);
    }

    #[test]
    fn error_codes_outside_range_fall_back() {
        assert_eq!(validate_error_code(400), 400);
        assert_eq!(validate_error_code(418), 418);
        assert_eq!(validate_error_code(599), 599);
        assert_eq!(validate_error_code(399), 500);
        assert_eq!(validate_error_code(600), 500);
        assert_eq!(validate_error_code(200), 500);
        assert_eq!(validate_error_code(-1), 500);
    }

    #[tokio::test]
    async fn sleep_is_timed() {
        let (_registry, debug) = instrumentation();
        let slept = debug.sleep(30).await;
        assert_eq!(slept, 30);
        let timer = debug.sleep_timer();
        assert_eq!(timer.get_sample_count(), 1);
        let secs = timer.get_sample_sum();
        assert!(secs >= 0.029 && secs < 0.5, "recorded {secs}s");
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_sleep_is_capped() {
        let (_registry, debug) = instrumentation();
        let started = tokio::time::Instant::now();
        assert_eq!(debug.sleep(20_000).await, MAX_SLEEP_MS);
        assert!(started.elapsed() >= Duration::from_millis(MAX_SLEEP_MS));
        assert_eq!(debug.sleep_timer().get_sample_count(), 1);
    }

    #[tokio::test]
    async fn negative_sleep_returns_immediately() {
        let (_registry, debug) = instrumentation();
        assert_eq!(debug.sleep(-100).await, 0);
        assert_eq!(debug.sleep_timer().get_sample_count(), 1);
        assert!(debug.sleep_timer().get_sample_sum() < 0.05);
    }

    #[tokio::test]
    async fn interrupted_sleep_still_records() {
        let (_registry, debug) = instrumentation();
        let res =
            tokio::time::timeout(Duration::from_millis(20), debug.sleep(5_000)).await;
        assert!(res.is_err());
        let timer = debug.sleep_timer();
        assert_eq!(timer.get_sample_count(), 1);
        assert!(timer.get_sample_sum() < 1.0);
    }

    #[test]
    fn forced_error_counts_per_code() {
        let (_registry, debug) = instrumentation();
        assert_eq!(debug.forced_error(503), 503);
        assert_eq!(debug.forced_error(503), 503);
        assert_eq!(debug.forced_error(42), 500);
        let counters = debug.error_counters();
        assert_eq!(counters.value(503), Some(2.0));
        assert_eq!(counters.value(500), Some(1.0));
        assert_eq!(counters.value(42), None);
        assert_eq!(counters.len(), 2);
    }

    #[test]
    fn concurrent_first_use_shares_one_handle() {
        const N: usize = 32;
        let (registry, debug) = instrumentation();
        let debug = Arc::new(debug);
        let barrier = Arc::new(Barrier::new(N));

        std::thread::scope(|s| {
            for _ in 0..N {
                let debug = Arc::clone(&debug);
                let barrier = Arc::clone(&barrier);
                s.spawn(move || {
                    barrier.wait();
                    assert_eq!(debug.forced_error(418), 418);
                });
            }
        });

        let counters = debug.error_counters();
        assert_eq!(counters.handles_created(), 1);
        assert_eq!(counters.value(418), Some(N as f64));

        let text = registry.render().unwrap();
        let series: Vec<&str> = text
            .lines()
            .filter(|l| l.starts_with("obs_forced_errors_total{"))
            .collect();
        assert_eq!(series.len(), 1, "{text}");
        assert!(series[0].contains("code=\"418\""));
        assert!(series[0].contains("endpoint=\"/debug/error\""));
        assert!(series[0].ends_with(&format!(" {N}")));
    }
}
