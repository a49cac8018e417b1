//! Prometheus collectors for the pull-based `/metrics` export
//!
//! Collectors live in an owned `Registry` rather than the process-global one,
//! so each `MetricsRecorder` (and each test) gets an independent set.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::core::constants::METRICS_NAMESPACE;

pub struct PrometheusExporter {
    registry: Registry,
    pub requests_total: IntCounterVec,
    pub errors_total: IntCounter,
    pub request_duration_seconds: HistogramVec,
    pub cache_operations_total: IntCounterVec,
    pub cache_connected: IntGauge,
    pub upstream_status_total: IntCounterVec,
}

impl PrometheusExporter {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some(METRICS_NAMESPACE.to_string()), None)?;

        let requests_total = IntCounterVec::new(
            Opts::new("requests_total", "Total number of requests, labeled by endpoint."),
            &["endpoint"],
        )?;
        let errors_total =
            IntCounter::new("errors_total", "Total number of requests that failed.")?;
        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "request_duration_seconds",
                "Request latency in seconds, labeled by endpoint.",
            ),
            &["endpoint"],
        )?;
        let cache_operations_total = IntCounterVec::new(
            Opts::new(
                "cache_operations_total",
                "Cache operations, labeled by operation (get, set) and result.",
            ),
            &["operation", "result"],
        )?;
        let cache_connected = IntGauge::new(
            "cache_connected",
            "Whether the cache backend answered its last health check (1 or 0).",
        )?;
        let upstream_status_total = IntCounterVec::new(
            Opts::new(
                "upstream_status_total",
                "Upstream responses, labeled by HTTP status code.",
            ),
            &["status_code"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(cache_operations_total.clone()))?;
        registry.register(Box::new(cache_connected.clone()))?;
        registry.register(Box::new(upstream_status_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            errors_total,
            request_duration_seconds,
            cache_operations_total,
            cache_connected,
            upstream_status_total,
        })
    }

    /// Content type of the text exposition format
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Encode all collectors in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}
