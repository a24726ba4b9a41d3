// Metrics registry
// Create-or-fetch access to labelled Prometheus counters and histograms,
// plus text exposition of everything registered.
//
// A metric name is bound to one label-key set the first time it is used.
// Label values are then resolved per call, so the same name + label set
// always maps to the same series no matter the order labels are passed in.
//
// obs-instrument maintainers 2026 Oct

use crate::errors::{ObsError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use prometheus::{
    Counter, CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Shared handle to the process metrics registry. Cloning is cheap; all
/// clones see the same series.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    registry: Registry,
    counters: DashMap<String, CounterVec>,
    histograms: DashMap<String, HistogramVec>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the process collector (cpu, resident memory, open fds).
    #[cfg(target_os = "linux")]
    pub fn register_process_collector(&self) -> Result<()> {
        let collector = prometheus::process_collector::ProcessCollector::for_self();
        self.inner.registry.register(Box::new(collector))?;
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    pub fn register_process_collector(&self) -> Result<()> {
        debug!("process collector unavailable on this platform");
        Ok(())
    }

    /// Fetch or create the counter `name{labels}`.
    pub fn counter(&self, name: &str, help: &str, labels: &[(&str, &str)]) -> Result<Counter> {
        let cached = self.inner.counters.get(name).map(|family| family.clone());
        let family = match cached {
            Some(family) => family,
            None => self.counter_family(name, help, labels)?,
        };
        Ok(family.get_metric_with(&label_values(labels))?)
    }

    fn counter_family(&self, name: &str, help: &str, labels: &[(&str, &str)]) -> Result<CounterVec> {
        let family = match self.inner.counters.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let family = CounterVec::new(Opts::new(name, help), &label_names(labels))?;
                self.inner.registry.register(Box::new(family.clone()))?;
                debug!(metric = name, "registered counter family");
                entry.insert(family).clone()
            }
        };
        Ok(family)
    }

    /// Fetch or create the histogram `name{labels}` with the default
    /// latency buckets (5ms .. 10s).
    pub fn histogram(
        &self,
        name: &str,
        help: &str,
        labels: &[(&str, &str)],
    ) -> Result<Histogram> {
        let cached = self.inner.histograms.get(name).map(|family| family.clone());
        let family = match cached {
            Some(family) => family,
            None => self.histogram_family(name, help, labels)?,
        };
        Ok(family.get_metric_with(&label_values(labels))?)
    }

    fn histogram_family(
        &self,
        name: &str,
        help: &str,
        labels: &[(&str, &str)],
    ) -> Result<HistogramVec> {
        let family = match self.inner.histograms.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let family =
                    HistogramVec::new(HistogramOpts::new(name, help), &label_names(labels))?;
                self.inner.registry.register(Box::new(family.clone()))?;
                debug!(metric = name, "registered histogram family");
                entry.insert(family).clone()
            }
        };
        Ok(family)
    }

    /// Number of registered families.
    pub fn family_count(&self) -> usize {
        self.inner.registry.gather().len()
    }

    /// Render every registered family in the Prometheus text format.
    pub fn render(&self) -> Result<String> {
        let families = self.inner.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf)?;
        String::from_utf8(buf).map_err(|err| ObsError::Encode(err.to_string()))
    }

    /// Content type of [`render`](Self::render) output.
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

fn label_names<'a>(labels: &[(&'a str, &str)]) -> Vec<&'a str> {
    let mut names: Vec<&str> = labels.iter().map(|(k, _)| *k).collect();
    names.sort_unstable();
    names
}

fn label_values<'a>(labels: &[(&'a str, &'a str)]) -> HashMap<&'a str, &'a str> {
    labels.iter().copied().collect()
}
