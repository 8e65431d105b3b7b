//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub executions_total: IntCounter,
    pub executions_confirmed: IntCounter,
    pub executions_failed: IntCounter,
    pub failures_by_category: IntCounterVec,
    pub bundle_endpoint_accepted: IntCounter,
    pub bundle_endpoint_failed: IntCounter,
    pub confirmation_polls: IntCounter,
    pub simulations_total: IntCounter,

    // Gauges
    pub executions_in_flight: IntGauge,

    // Histograms
    pub execution_latency: Histogram,
    pub broadcast_latency: Histogram,
    pub confirmation_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let executions_total = IntCounter::with_opts(Opts::new(
            "executions_total",
            "Total number of execute-and-confirm attempts",
        ))?;

        let executions_confirmed = IntCounter::with_opts(Opts::new(
            "executions_confirmed",
            "Attempts whose transaction landed without error",
        ))?;

        let executions_failed = IntCounter::with_opts(Opts::new(
            "executions_failed",
            "Attempts that ended unconfirmed",
        ))?;

        let failures_by_category = IntCounterVec::new(
            Opts::new("execution_failures", "Unconfirmed attempts by error category"),
            &["category"],
        )?;

        let bundle_endpoint_accepted = IntCounter::with_opts(Opts::new(
            "bundle_endpoint_accepted",
            "Block engine endpoints that accepted a bundle",
        ))?;

        let bundle_endpoint_failed = IntCounter::with_opts(Opts::new(
            "bundle_endpoint_failed",
            "Block engine endpoints that failed or timed out",
        ))?;

        let confirmation_polls = IntCounter::with_opts(Opts::new(
            "confirmation_polls",
            "Signature status polls issued",
        ))?;

        let simulations_total = IntCounter::with_opts(Opts::new(
            "simulations_total",
            "Simulate-only runs",
        ))?;

        let executions_in_flight = IntGauge::with_opts(Opts::new(
            "executions_in_flight",
            "Attempts currently between submission and settlement",
        ))?;

        let execution_latency = Histogram::with_opts(
            HistogramOpts::new("execution_latency_seconds", "Submit-to-settle latency")
                .buckets(vec![0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 90.0]),
        )?;

        let broadcast_latency = Histogram::with_opts(
            HistogramOpts::new("broadcast_latency_seconds", "Bundle fan-out latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
        )?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new("confirmation_latency_seconds", "Confirmation polling latency")
                .buckets(vec![0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 90.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(executions_total.clone()))?;
        registry.register(Box::new(executions_confirmed.clone()))?;
        registry.register(Box::new(executions_failed.clone()))?;
        registry.register(Box::new(failures_by_category.clone()))?;
        registry.register(Box::new(bundle_endpoint_accepted.clone()))?;
        registry.register(Box::new(bundle_endpoint_failed.clone()))?;
        registry.register(Box::new(confirmation_polls.clone()))?;
        registry.register(Box::new(simulations_total.clone()))?;
        registry.register(Box::new(executions_in_flight.clone()))?;
        registry.register(Box::new(execution_latency.clone()))?;
        registry.register(Box::new(broadcast_latency.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;

        Ok(Self {
            registry,
            executions_total,
            executions_confirmed,
            executions_failed,
            failures_by_category,
            bundle_endpoint_accepted,
            bundle_endpoint_failed,
            confirmation_polls,
            simulations_total,
            executions_in_flight,
            execution_latency,
            broadcast_latency,
            confirmation_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Count an unconfirmed attempt under its error category
    pub fn record_failure(&self, category: &str) {
        self.executions_failed.inc();
        self.failures_by_category
            .with_label_values(&[category])
            .inc();
    }

    /// Prometheus text exposition of every registered metric
    pub fn export(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_registry_exports_every_family() {
        let m = Metrics::new().unwrap();
        m.executions_total.inc();
        m.record_failure("timeout");
        m.broadcast_latency.observe(0.02);

        let text = m.export().unwrap();
        assert!(text.contains("executions_total 1"));
        assert!(text.contains("executions_failed 1"));
        assert!(text.contains("execution_failures{category=\"timeout\"} 1"));
        assert!(text.contains("broadcast_latency_seconds_bucket"));
    }

    #[test]
    fn test_global_instance_is_shared() {
        let before = metrics().confirmation_polls.get();
        metrics().confirmation_polls.inc();
        assert!(metrics().confirmation_polls.get() > before);
    }

    #[test]
    fn test_timer_observes_into_histogram() {
        let m = Metrics::new().unwrap();
        let timer = Timer::new();
        timer.observe_duration(&m.execution_latency);
        assert_eq!(m.execution_latency.get_sample_count(), 1);
    }
}
