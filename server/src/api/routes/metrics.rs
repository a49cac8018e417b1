//! Prometheus scrape endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use super::health::probe_cache;
use crate::api::types::ApiError;
use crate::data::cache::CacheService;
use crate::domain::metrics::MetricsRecorder;

#[derive(Clone)]
pub struct MetricsApiState {
    pub cache: Arc<CacheService>,
    pub metrics: Arc<MetricsRecorder>,
}

pub fn routes(cache: Arc<CacheService>, metrics: Arc<MetricsRecorder>) -> Router<()> {
    let state = MetricsApiState { cache, metrics };
    Router::new()
        .route("/metrics", get(export))
        .with_state(state)
}

/// Text exposition of every collector
pub async fn export(State(state): State<MetricsApiState>) -> Result<impl IntoResponse, ApiError> {
    probe_cache(&state.cache, &state.metrics).await;

    let body = state.metrics.export().map_err(|e| {
        tracing::error!(error = %e, "Failed to encode metrics");
        ApiError::internal("Failed to encode metrics")
    })?;
    Ok(([(header::CONTENT_TYPE, state.metrics.content_type())], body))
}
