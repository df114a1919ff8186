//! Prometheus metrics for service calls.
//!
//! Each process owns one [`Metrics`] with a private registry, exposed at
//! `GET /metrics` in the text exposition format.

use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Per-process call metrics.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration_seconds: HistogramVec,
}

impl Metrics {
    /// Create the metric families and register them.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("gtd_requests_total", "Total service calls by outcome"),
            &["service", "method", "outcome"],
        )?;
        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "gtd_request_duration_seconds",
                "Service call latency in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["service", "method"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration_seconds,
        })
    }

    /// Record one completed call. `outcome` is `ok` or an error code.
    pub fn record(&self, service: &str, method: &str, outcome: &str, elapsed: Duration) {
        self.requests_total
            .with_label_values(&[service, method, outcome])
            .inc();
        self.request_duration_seconds
            .with_label_values(&[service, method])
            .observe(elapsed.as_secs_f64());
    }

    /// Calls recorded so far for one label set.
    pub fn count(&self, service: &str, method: &str, outcome: &str) -> u64 {
        self.requests_total
            .with_label_values(&[service, method, outcome])
            .get()
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}
