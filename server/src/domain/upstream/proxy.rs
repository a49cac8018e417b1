//! Single-call pass-through to an arbitrary upstream target

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use super::error::{UpstreamError, UpstreamStage};
use crate::domain::metrics::MetricsRecorder;

/// Headers scoped to the inbound hop, never forwarded upstream
///
/// `content-length` and `transfer-encoding` are recomputed by the client from
/// the forwarded body. `accept-encoding` is negotiated by the client itself,
/// which decodes the response body.
const STRIPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "accept-encoding",
];

/// Response headers that describe the encoded upstream body, not the decoded one
const ENCODING_RESPONSE_HEADERS: &[&str] = &["content-encoding", "content-length"];

/// Prefix `https://` onto targets given without a scheme
pub fn normalize_target_url(target: &str) -> String {
    if target.starts_with("http") {
        target.to_string()
    } else {
        format!("https://{target}")
    }
}

/// Whether the method carries a forwarded body
pub fn method_has_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Outbound request as the client sent it, minus hop-scoped headers
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub target_url: String,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl ProxyRequest {
    pub fn new(
        method: Method,
        target_url: String,
        mut headers: HeaderMap,
        query: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Self {
        for name in STRIPPED_REQUEST_HEADERS {
            headers.remove(*name);
        }
        let body = method_has_body(&method).then_some(body);
        Self {
            method,
            target_url,
            headers,
            query,
            body,
        }
    }
}

/// Upstream response, also the cached envelope for proxy entries
///
/// Repeated response headers collapse to the last value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxiedResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Outbound transport seam for the proxy path
///
/// Non-2xx responses are returned as `Ok`; only a failure to get any response
/// at all is an error.
#[async_trait]
pub trait ProxyTransport: Send + Sync {
    async fn send(&self, request: ProxyRequest) -> Result<ProxiedResponse, UpstreamError>;
}

pub struct HttpProxyTransport {
    client: reqwest::Client,
    metrics: Arc<MetricsRecorder>,
}

impl HttpProxyTransport {
    pub fn new(client: reqwest::Client, metrics: Arc<MetricsRecorder>) -> Self {
        Self { client, metrics }
    }
}

#[async_trait]
impl ProxyTransport for HttpProxyTransport {
    async fn send(&self, request: ProxyRequest) -> Result<ProxiedResponse, UpstreamError> {
        let transport_err = |e: reqwest::Error| UpstreamError::Transport {
            stage: UpstreamStage::Proxy,
            message: e.to_string(),
        };

        let mut builder = self
            .client
            .request(request.method, &request.target_url)
            .headers(request.headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await.map_err(transport_err)?;
        let status_code = resp.status().as_u16();
        self.metrics.record_upstream_status(status_code);

        let headers = resp
            .headers()
            .iter()
            .filter(|(name, _)| !ENCODING_RESPONSE_HEADERS.contains(&name.as_str()))
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = resp.text().await.map_err(transport_err)?;

        Ok(ProxiedResponse {
            status_code,
            headers,
            body,
        })
    }
}
