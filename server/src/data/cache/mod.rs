//! Cache module
//!
//! Provides the cache client adapter with pluggable backends:
//! - In-memory (default) - uses moka
//! - Redis (optional) - uses deadpool-redis
//! - Disabled - every lookup misses, every write is a no-op
//!
//! Values are stored as JSON envelopes. Every call is bounded by a timeout and
//! no cache failure is ever allowed to fail the request that triggered it.

mod backend;
mod error;
mod key;
mod memory;
mod redis;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use backend::CacheBackend;
pub use error::CacheError;
pub use key::{CacheKey, normalize_city};
pub use memory::InMemoryCache;

use crate::core::config::{CacheBackendType, CacheConfig};

/// Outcome of a typed cache lookup
///
/// Failures are already logged by the time this is returned; callers treat
/// `Error` exactly like `Miss` and only distinguish it for metrics.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    Hit(T),
    Miss,
    Error,
}

impl<T> CacheLookup<T> {
    /// Metric label for this outcome
    pub fn result_label(&self) -> &'static str {
        match self {
            Self::Hit(_) => "hit",
            Self::Miss => "miss",
            Self::Error => "error",
        }
    }
}

/// Cache service providing typed, failure-absorbing access to a cache backend
pub struct CacheService {
    backend: Option<Arc<dyn CacheBackend>>,
    timeout: Duration,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.backend_name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CacheService {
    /// Create a new cache service from configuration
    pub async fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        let backend: Option<Arc<dyn CacheBackend>> = match config.backend {
            CacheBackendType::Memory => {
                tracing::debug!(
                    max_entries = config.max_entries,
                    "Initializing in-memory cache"
                );
                Some(Arc::new(InMemoryCache::new(config.max_entries)))
            }
            CacheBackendType::Redis => {
                let url = config.redis_url.as_ref().ok_or_else(|| {
                    CacheError::Config("redis_url required for Redis backend".into())
                })?;
                // RedisCache::new logs the sanitized URL itself
                Some(Arc::new(redis::RedisCache::new(url, config.timeout).await?))
            }
            CacheBackendType::Disabled => {
                tracing::info!("Cache disabled, all requests go upstream");
                None
            }
        };

        Ok(Self {
            backend,
            timeout: config.timeout,
        })
    }

    /// Wrap an existing backend
    pub fn from_backend(backend: Arc<dyn CacheBackend>, timeout: Duration) -> Self {
        Self {
            backend: Some(backend),
            timeout,
        }
    }

    /// A cache that never stores anything
    pub fn disabled() -> Self {
        Self {
            backend: None,
            timeout: Duration::ZERO,
        }
    }

    /// Whether a backend is configured
    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Get the backend name
    pub fn backend_name(&self) -> &'static str {
        self.backend
            .as_ref()
            .map(|b| b.backend_name())
            .unwrap_or("disabled")
    }

    /// Run a backend call under the per-call timeout
    async fn bounded<T, F>(&self, fut: F) -> Result<T, CacheError>
    where
        F: std::future::Future<Output = Result<T, CacheError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.timeout.as_millis())),
        }
    }

    // =========================================================================
    // Raw bytes API
    // =========================================================================

    /// Get raw bytes from cache
    pub async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        match &self.backend {
            Some(backend) => self.bounded(backend.get(key)).await,
            None => Ok(None),
        }
    }

    /// Set raw bytes in cache
    pub async fn set_raw(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        match &self.backend {
            Some(backend) => self.bounded(backend.set(key, value, ttl)).await,
            None => Ok(()),
        }
    }

    // =========================================================================
    // Typed API (JSON envelopes)
    // =========================================================================

    /// Look up a typed value
    ///
    /// Connection failures, timeouts and undecodable entries are logged and
    /// reported as `CacheLookup::Error`; they never propagate.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> CacheLookup<T> {
        let bytes = match self.get_raw(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return CacheLookup::Miss,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read error");
                return CacheLookup::Error;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => CacheLookup::Hit(value),
            Err(e) => {
                let e = CacheError::Serialization(e.to_string());
                tracing::warn!(key = %key, error = %e, "Cache entry could not be decoded");
                CacheLookup::Error
            }
        }
    }

    /// Store a typed value with a TTL
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.set_raw(key, bytes, ttl).await
    }

    // =========================================================================
    // Other operations
    // =========================================================================

    /// Health check (a disabled cache is trivially healthy)
    pub async fn health_check(&self) -> Result<(), CacheError> {
        match &self.backend {
            Some(backend) => self.bounded(backend.health_check()).await,
            None => Ok(()),
        }
    }
}
