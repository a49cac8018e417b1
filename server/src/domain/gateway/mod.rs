//! Cache-Aside Orchestrators
//!
//! - `WeatherService` - weather lookups, upstream wrapped in retry
//! - `ProxyService` - pass-through proxy, single attempt, GET-only caching
//!
//! Both share `CacheAside` for the read and the fire-and-forget write; they
//! differ in how the upstream is driven on a miss.

mod error;
mod proxy;
mod weather;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::task::TaskTracker;

pub use error::GatewayError;
pub use proxy::{CacheStatus, InboundProxyRequest, ProxyOutcome, ProxyService};
pub use weather::{WeatherResponse, WeatherService};

use crate::data::cache::{CacheLookup, CacheService};
use crate::domain::metrics::MetricsRecorder;

/// Cache read plus detached cache write, with cache metrics
///
/// Writes run on `writes` so shutdown can wait for them; a failed write is
/// logged and otherwise ignored.
#[derive(Clone)]
pub struct CacheAside {
    cache: Arc<CacheService>,
    metrics: Arc<MetricsRecorder>,
    writes: TaskTracker,
}

impl CacheAside {
    pub fn new(cache: Arc<CacheService>, metrics: Arc<MetricsRecorder>, writes: TaskTracker) -> Self {
        Self {
            cache,
            metrics,
            writes,
        }
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    /// Read `key`; misses and cache failures both come back as `None`
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.cache.is_enabled() {
            return None;
        }

        let lookup = self.cache.lookup::<T>(key).await;
        self.metrics
            .record_cache_operation("get", lookup.result_label());
        match lookup {
            CacheLookup::Hit(value) => {
                tracing::info!(key = %key, "Cache hit");
                Some(value)
            }
            CacheLookup::Miss => {
                tracing::debug!(key = %key, "Cache miss");
                None
            }
            CacheLookup::Error => None,
        }
    }

    /// Store `value` under `key` without waiting for the write
    pub fn write_detached<T>(&self, key: String, value: T, ttl: Duration)
    where
        T: Serialize + Send + Sync + 'static,
    {
        if !self.cache.is_enabled() {
            return;
        }

        let cache = Arc::clone(&self.cache);
        let metrics = Arc::clone(&self.metrics);
        self.writes.spawn(async move {
            match cache.set(&key, &value, ttl).await {
                Ok(()) => {
                    metrics.record_cache_operation("set", "ok");
                    tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "Cached response");
                }
                Err(e) => {
                    metrics.record_cache_operation("set", "error");
                    tracing::warn!(key = %key, error = %e, "Cache write error");
                }
            }
        });
    }

    /// Wait for every write spawned so far
    #[cfg(test)]
    pub async fn settle(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::data::cache::CacheBackend;

    pub fn cache_aside(backend: Arc<dyn CacheBackend>) -> (CacheAside, Arc<MetricsRecorder>) {
        let metrics = Arc::new(MetricsRecorder::new().unwrap());
        let cache = Arc::new(CacheService::from_backend(backend, Duration::from_secs(5)));
        let aside = CacheAside::new(cache, Arc::clone(&metrics), TaskTracker::new());
        (aside, metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::cache_aside;
    use super::*;
    use crate::data::cache::testing::{FailingCache, RecordingCache};

    #[tokio::test]
    async fn test_read_records_hit_and_miss() {
        let backend = Arc::new(RecordingCache::new());
        let (aside, metrics) = cache_aside(backend.clone());

        assert_eq!(aside.read::<String>("k").await, None);
        aside.write_detached("k".to_string(), "v".to_string(), Duration::from_secs(60));
        aside.settle().await;
        assert_eq!(aside.read::<String>("k").await, Some("v".to_string()));

        let cache = metrics.snapshot().cache;
        assert_eq!((cache.hits, cache.misses, cache.errors), (1, 1, 0));
        assert_eq!(backend.set_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_cache_degrades_to_miss() {
        let (aside, metrics) = cache_aside(Arc::new(FailingCache));

        assert_eq!(aside.read::<String>("k").await, None);
        aside.write_detached("k".to_string(), "v".to_string(), Duration::from_secs(60));
        aside.settle().await;

        assert_eq!(metrics.snapshot().cache.errors, 2);
    }

    #[tokio::test]
    async fn test_disabled_cache_records_nothing() {
        let metrics = Arc::new(MetricsRecorder::new().unwrap());
        let aside = CacheAside::new(
            Arc::new(CacheService::disabled()),
            Arc::clone(&metrics),
            TaskTracker::new(),
        );

        assert_eq!(aside.read::<String>("k").await, None);
        aside.write_detached("k".to_string(), "v".to_string(), Duration::from_secs(60));
        aside.settle().await;

        let cache = metrics.snapshot().cache;
        assert_eq!((cache.hits, cache.misses, cache.errors), (0, 0, 0));
    }
}
