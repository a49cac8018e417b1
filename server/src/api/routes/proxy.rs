//! Generic proxy endpoint

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::Response;
use axum::routing::{MethodFilter, on};
use axum::Router;

use crate::api::extractors::ApiQuery;
use crate::api::types::ApiError;
use crate::core::constants::CACHE_STATUS_HEADER;
use crate::domain::gateway::{InboundProxyRequest, ProxyOutcome, ProxyService};

/// Upstream headers describing the original framing, not replayed to clients
///
/// Bodies are stored decoded, so a `content-encoding` would misdescribe them.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "transfer-encoding",
    "keep-alive",
    "content-length",
    "content-encoding",
];

#[derive(Clone)]
pub struct ProxyApiState {
    pub proxy: Arc<ProxyService>,
}

pub fn routes(proxy: Arc<ProxyService>) -> Router<()> {
    let state = ProxyApiState { proxy };
    let methods = MethodFilter::GET
        .or(MethodFilter::POST)
        .or(MethodFilter::PUT)
        .or(MethodFilter::DELETE)
        .or(MethodFilter::PATCH);
    Router::new()
        .route("/proxy/", on(methods, proxy_root))
        .route("/proxy/{*path}", on(methods, proxy_path))
        .with_state(state)
}

type ProxyQuery = ApiQuery<Vec<(String, String)>>;

pub async fn proxy_root(
    State(state): State<ProxyApiState>,
    method: Method,
    ApiQuery(query): ProxyQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    forward(&state, method, String::new(), query, headers, body).await
}

pub async fn proxy_path(
    State(state): State<ProxyApiState>,
    method: Method,
    Path(path): Path<String>,
    ApiQuery(query): ProxyQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    forward(&state, method, path, query, headers, body).await
}

async fn forward(
    state: &ProxyApiState,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let outcome = state
        .proxy
        .forward(InboundProxyRequest {
            method,
            path,
            headers,
            query,
            body: body.to_vec(),
        })
        .await?;
    into_response(outcome)
}

/// Replay the upstream status, headers and body
fn into_response(outcome: ProxyOutcome) -> Result<Response, ApiError> {
    let ProxyOutcome {
        response,
        cache_status,
    } = outcome;

    let status = StatusCode::from_u16(response.status_code).map_err(|_| {
        ApiError::bad_gateway(format!(
            "Upstream returned invalid status {}",
            response.status_code
        ))
    })?;

    let mut resp = Response::new(Body::from(response.body));
    *resp.status_mut() = status;

    let headers = resp.headers_mut();
    for (name, value) in &response.headers {
        if HOP_BY_HOP_HEADERS.contains(&name.as_str()) {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::debug!(header = %name, "Dropping unrepresentable upstream header"),
        }
    }
    if let Some(cache_status) = cache_status {
        headers.insert(
            CACHE_STATUS_HEADER,
            HeaderValue::from_static(cache_status.header_value()),
        );
    }

    Ok(resp)
}
