//! Generic proxy: GET responses cached, every other method passed straight through

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::HeaderMap;

use super::{CacheAside, GatewayError};
use crate::data::cache::CacheKey;
use crate::domain::upstream::{
    ProxiedResponse, ProxyRequest, ProxyTransport, normalize_target_url,
};

/// Whether a GET response came from the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// Value of the `X-Cache` response header
    pub fn header_value(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }
}

/// Proxy call as received from the client
#[derive(Debug, Clone)]
pub struct InboundProxyRequest {
    pub method: Method,
    /// Tail of the `/proxy/` route; only part of the cache key
    pub path: String,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl InboundProxyRequest {
    /// The `url` query parameter, if given and non-blank
    fn target(&self) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == "url")
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct ProxyOutcome {
    pub response: ProxiedResponse,
    /// `None` for methods that bypass the cache
    pub cache_status: Option<CacheStatus>,
}

pub struct ProxyService {
    transport: Arc<dyn ProxyTransport>,
    cache: CacheAside,
    ttl: Duration,
}

impl ProxyService {
    pub fn new(transport: Arc<dyn ProxyTransport>, cache: CacheAside, ttl: Duration) -> Self {
        Self {
            transport,
            cache,
            ttl,
        }
    }

    /// Forward one request to its target
    ///
    /// The upstream is tried once. Non-2xx upstream responses are returned as
    /// successes; only a failure to reach the target is an error.
    pub async fn forward(&self, request: InboundProxyRequest) -> Result<ProxyOutcome, GatewayError> {
        let method = request.method.clone();
        let result = self.proxy(request).await;
        if let Err(e) = &result {
            self.cache.metrics().record_error();
            tracing::warn!(method = %method, error = %e, "Proxy request failed");
        }
        result
    }

    async fn proxy(&self, request: InboundProxyRequest) -> Result<ProxyOutcome, GatewayError> {
        let target_url = request
            .target()
            .map(normalize_target_url)
            .ok_or_else(|| GatewayError::Validation("Missing 'url' query parameter".to_string()))?;

        let cache_key = (request.method == Method::GET)
            .then(|| CacheKey::proxy(&target_url, &request.path));

        if let Some(key) = &cache_key
            && let Some(response) = self.cache.read::<ProxiedResponse>(key).await
        {
            return Ok(ProxyOutcome {
                response,
                cache_status: Some(CacheStatus::Hit),
            });
        }

        let InboundProxyRequest {
            method,
            headers,
            query,
            body,
            ..
        } = request;
        let response = self
            .transport
            .send(ProxyRequest::new(method, target_url, headers, query, body))
            .await?;

        tracing::debug!(status = response.status_code, "Proxied request");

        if let Some(key) = cache_key {
            if response.status_code == 200 {
                self.cache.write_detached(key, response.clone(), self.ttl);
            }
            return Ok(ProxyOutcome {
                response,
                cache_status: Some(CacheStatus::Miss),
            });
        }

        Ok(ProxyOutcome {
            response,
            cache_status: None,
        })
    }
}
