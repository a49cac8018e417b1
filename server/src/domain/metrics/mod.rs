//! Metrics Recorder
//!
//! Process-wide request accounting, owned by `AppState` and shared by handle
//! with every request task. Two views are kept in step:
//! - `MetricsState` behind a mutex, feeding the `/health` snapshot
//! - Prometheus collectors, feeding the pull-based `/metrics` export
//!
//! Counters only ever grow; the latency window is bounded and drops its oldest
//! sample once full.

mod exporter;
mod latency;

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

pub use exporter::PrometheusExporter;
pub use latency::{LatencyStats, LatencyWindow};

use crate::core::constants::LATENCY_WINDOW_SIZE;

/// Cache operation results tracked in the snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
}

/// Aggregate view returned by `MetricsRecorder::snapshot`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub requests_by_endpoint: BTreeMap<String, u64>,
    pub request_duration: LatencyStats,
    pub upstream_status_codes: BTreeMap<u16, u64>,
    pub cache: CacheCounters,
}

#[derive(Debug)]
struct MetricsState {
    total_requests: u64,
    total_errors: u64,
    requests_by_endpoint: BTreeMap<String, u64>,
    latencies: LatencyWindow,
    upstream_status_codes: BTreeMap<u16, u64>,
    cache: CacheCounters,
}

impl MetricsState {
    fn new(window: usize) -> Self {
        Self {
            total_requests: 0,
            total_errors: 0,
            requests_by_endpoint: BTreeMap::new(),
            latencies: LatencyWindow::new(window),
            upstream_status_codes: BTreeMap::new(),
            cache: CacheCounters::default(),
        }
    }
}

pub struct MetricsRecorder {
    state: Mutex<MetricsState>,
    exporter: PrometheusExporter,
}

impl std::fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRecorder")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_window(LATENCY_WINDOW_SIZE)
    }

    /// Create a recorder whose latency window holds at most `window` samples
    pub fn with_window(window: usize) -> Result<Self, prometheus::Error> {
        Ok(Self {
            state: Mutex::new(MetricsState::new(window)),
            exporter: PrometheusExporter::new()?,
        })
    }

    pub fn record_request(&self, endpoint: &str) {
        {
            let mut state = self.state.lock();
            state.total_requests += 1;
            *state
                .requests_by_endpoint
                .entry(endpoint.to_string())
                .or_default() += 1;
        }
        self.exporter
            .requests_total
            .with_label_values(&[endpoint])
            .inc();
    }

    pub fn record_error(&self) {
        self.state.lock().total_errors += 1;
        self.exporter.errors_total.inc();
    }

    pub fn record_duration(&self, endpoint: &str, elapsed: Duration) {
        self.state.lock().latencies.push(elapsed.as_secs_f64() * 1000.0);
        self.exporter
            .request_duration_seconds
            .with_label_values(&[endpoint])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_upstream_status(&self, status: u16) {
        *self
            .state
            .lock()
            .upstream_status_codes
            .entry(status)
            .or_default() += 1;
        let label = status.to_string();
        self.exporter
            .upstream_status_total
            .with_label_values(&[label.as_str()])
            .inc();
    }

    /// Record a cache operation (`get` or `set`) and its result label
    pub fn record_cache_operation(&self, operation: &str, result: &str) {
        if operation == "get" {
            let mut state = self.state.lock();
            match result {
                "hit" => state.cache.hits += 1,
                "miss" => state.cache.misses += 1,
                _ => state.cache.errors += 1,
            }
        } else if result == "error" {
            self.state.lock().cache.errors += 1;
        }
        self.exporter
            .cache_operations_total
            .with_label_values(&[operation, result])
            .inc();
    }

    pub fn set_cache_connected(&self, connected: bool) {
        self.exporter.cache_connected.set(i64::from(connected));
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.lock();
        MetricsSnapshot {
            total_requests: state.total_requests,
            total_errors: state.total_errors,
            requests_by_endpoint: state.requests_by_endpoint.clone(),
            request_duration: state.latencies.stats(),
            upstream_status_codes: state.upstream_status_codes.clone(),
            cache: state.cache,
        }
    }

    /// Prometheus text exposition of every collector
    pub fn export(&self) -> Result<String, prometheus::Error> {
        self.exporter.encode()
    }

    pub fn content_type(&self) -> String {
        self.exporter.content_type()
    }
}
