//! Redis-compatible cache implementation using deadpool-redis
//!
//! Works with Redis, Valkey and Dragonfly.
//!
//! # URL Format
//!
//! ```text
//! redis://[user:password@]host:port[/db]
//! rediss://[user:password@]host:port[/db]  (TLS)
//! ```

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config, Pool, Runtime};

use super::backend::CacheBackend;
use super::error::CacheError;

/// Redis-compatible cache implementation
///
/// Uses connection pooling via deadpool-redis. Connections are created lazily,
/// so an unreachable server only degrades individual calls.
pub struct RedisCache {
    pool: Pool,
}

impl RedisCache {
    /// Create a new Redis-compatible cache with the given URL
    ///
    /// `timeout` bounds waiting for, creating and recycling pooled connections.
    /// A failed startup PING is logged but does not fail construction: the
    /// gateway keeps serving uncached and picks the store up once it is back.
    pub async fn new(redis_url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let sanitized_url = sanitize_redis_url(redis_url);

        let mut config = Config::from_url(redis_url);
        config.pool = Some(deadpool_redis::PoolConfig {
            max_size: 32,
            timeouts: deadpool_redis::Timeouts {
                wait: Some(timeout),
                create: Some(timeout),
                recycle: Some(timeout),
            },
            ..Default::default()
        });
        let pool = config.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
            CacheError::Connection(format!(
                "Failed to create Redis pool for {sanitized_url}: {e}"
            ))
        })?;

        let cache = Self { pool };
        match cache.health_check().await {
            Ok(()) => tracing::info!(url = %sanitized_url, "Connected to Redis"),
            Err(e) => tracing::warn!(
                url = %sanitized_url,
                error = %e,
                "Redis connection failed, running without cache until it recovers"
            ),
        }

        Ok(cache)
    }
}

/// Sanitize Redis URL for logging (removes password)
fn sanitize_redis_url(url: &str) -> String {
    // rfind so passwords containing '@' are still masked
    if let Some(at_pos) = url.rfind('@') {
        let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
        if let Some(colon_pos) = url[scheme_end..at_pos].find(':') {
            let abs_colon = scheme_end + colon_pos;
            let prefix = &url[..abs_colon + 1];
            let suffix = &url[at_pos..];
            return format!("{prefix}***{suffix}");
        }
    }
    url.to_string()
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.pool.get().await?;
        let result: Option<Vec<u8>> = conn.get(key).await?;
        Ok(result)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        // SETEX 0 is rejected by Redis, so sub-second TTLs round up
        let ttl_secs = ttl.as_secs().max(1);
        let _: () = deadpool_redis::redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_secs)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        deadpool_redis::redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
