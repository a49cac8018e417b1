//! Service info and health check endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::core::constants::SERVICE_NAME;
use crate::data::cache::CacheService;
use crate::domain::metrics::{MetricsRecorder, MetricsSnapshot};

#[derive(Clone)]
pub struct HealthApiState {
    pub cache: Arc<CacheService>,
    pub metrics: Arc<MetricsRecorder>,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CacheHealth {
    pub backend: &'static str,
    /// `connected`, `disconnected` or `not_configured`
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when the cache cannot be reached
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub cache: CacheHealth,
    pub metrics: MetricsSnapshot,
}

pub fn routes(cache: Arc<CacheService>, metrics: Arc<MetricsRecorder>) -> Router<()> {
    let state = HealthApiState { cache, metrics };
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: SERVICE_NAME,
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Ping the cache and refresh the `cache_connected` gauge
pub async fn probe_cache(cache: &CacheService, metrics: &MetricsRecorder) -> CacheHealth {
    let backend = cache.backend_name();
    if !cache.is_enabled() {
        metrics.set_cache_connected(false);
        return CacheHealth {
            backend,
            status: "not_configured",
            error: None,
        };
    }

    match cache.health_check().await {
        Ok(()) => {
            metrics.set_cache_connected(true);
            CacheHealth {
                backend,
                status: "connected",
                error: None,
            }
        }
        Err(e) => {
            metrics.set_cache_connected(false);
            tracing::warn!(backend, error = %e, "Cache health check failed");
            CacheHealth {
                backend,
                status: "disconnected",
                error: Some(e.to_string()),
            }
        }
    }
}

/// Health check; a cache outage degrades the status but still answers 200
pub async fn health(State(state): State<HealthApiState>) -> Json<HealthResponse> {
    let cache = probe_cache(&state.cache, &state.metrics).await;
    let status = if cache.status == "disconnected" {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status,
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        cache,
        metrics: state.metrics.snapshot(),
    })
}
