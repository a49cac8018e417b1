use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::utils::retry::RetryPolicy;

use super::cli::CliConfig;
use super::constants::{
    CONFIG_FILE_NAME, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TIMEOUT_SECS,
    DEFAULT_FORECAST_URL, DEFAULT_GEOCODING_URL, DEFAULT_HOST, DEFAULT_PORT,
    DEFAULT_PROXY_TTL_SECS, DEFAULT_RETRY_INITIAL_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS,
    DEFAULT_RETRY_MAX_DELAY_MS, DEFAULT_SHUTDOWN_GRACE_SECS, DEFAULT_UPSTREAM_TIMEOUT_SECS,
    DEFAULT_WEATHER_TTL_SECS, ENV_REDIS_DB, ENV_REDIS_HOST, ENV_REDIS_PASSWORD, ENV_REDIS_PORT,
};

// =============================================================================
// Cache Backend Enum
// =============================================================================

/// Cache backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendType {
    #[default]
    Memory,
    Redis,
    /// No cache at all: every lookup is a miss, every write a no-op
    Disabled,
}

impl fmt::Display for CacheBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheBackendType::Memory => write!(f, "memory"),
            CacheBackendType::Redis => write!(f, "redis"),
            CacheBackendType::Disabled => write!(f, "disabled"),
        }
    }
}

// =============================================================================
// Log Format Enum
// =============================================================================

/// Log output format, chosen on the command line before any config is read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

// =============================================================================
// File Config Structs (all fields optional for merging)
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CacheFileConfig {
    pub backend: Option<CacheBackendType>,
    pub redis_url: Option<String>,
    pub max_entries: Option<u64>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpstreamFileConfig {
    pub geocoding_url: Option<String>,
    pub forecast_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetryFileConfig {
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TtlFileConfig {
    pub weather_secs: Option<u64>,
    pub proxy_secs: Option<u64>,
}

/// Root config file structure
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub cache: Option<CacheFileConfig>,
    pub upstream: Option<UpstreamFileConfig>,
    pub retry: Option<RetryFileConfig>,
    pub ttl: Option<TtlFileConfig>,
    pub shutdown_grace_secs: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Cache configuration (used by CacheService)
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackendType,
    /// Maximum entries (memory backend)
    pub max_entries: u64,
    /// Redis URL (redis backend)
    pub redis_url: Option<String>,
    /// Bound on every single cache call
    pub timeout: Duration,
}

/// Outbound HTTP configuration
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub geocoding_url: String,
    pub forecast_url: String,
    pub timeout: Duration,
}

/// Cache entry lifetimes
#[derive(Debug, Clone, Copy)]
pub struct TtlConfig {
    pub weather: Duration,
    pub proxy: Duration,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub upstream: UpstreamConfig,
    pub retry: RetryPolicy,
    pub ttl: TtlConfig,
    pub shutdown_grace: Duration,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Local directory config OR CLI-specified config path
    /// 3. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let path = if let Some(ref path) = cli.config {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Some(path.clone())
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        let file_config = match path {
            Some(path) => {
                let config = FileConfig::load_from_file(&path)?;
                config.warn_unknown_fields();
                config
            }
            None => FileConfig::default(),
        };

        let legacy_redis_url = legacy_redis_url(|name| std::env::var(name).ok());
        Self::from_sources(cli, file_config, legacy_redis_url)
    }

    /// Layer defaults, file config and CLI/env overrides
    fn from_sources(
        cli: &CliConfig,
        file_config: FileConfig,
        legacy_redis_url: Option<String>,
    ) -> Result<Self> {
        let file_server = file_config.server.unwrap_or_default();
        let file_cache = file_config.cache.unwrap_or_default();
        let file_upstream = file_config.upstream.unwrap_or_default();
        let file_retry = file_config.retry.unwrap_or_default();
        let file_ttl = file_config.ttl.unwrap_or_default();

        let server = ServerConfig {
            host: cli
                .host
                .clone()
                .or(file_server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT),
        };

        // An explicit URL wins over the legacy REDIS_* variables
        let redis_url = cli
            .cache_redis_url
            .clone()
            .or(file_cache.redis_url)
            .or(legacy_redis_url);

        // Without an explicit backend, a configured Redis URL selects Redis
        let backend = cli
            .cache_backend
            .or(file_cache.backend)
            .unwrap_or(if redis_url.is_some() {
                CacheBackendType::Redis
            } else {
                CacheBackendType::Memory
            });

        if backend == CacheBackendType::Redis && redis_url.is_none() {
            anyhow::bail!(
                "Redis cache backend selected but no Redis URL configured \
                 (set --cache-redis-url or REDIS_HOST)"
            );
        }

        let cache = CacheConfig {
            backend,
            max_entries: cli
                .cache_max_entries
                .or(file_cache.max_entries)
                .unwrap_or(DEFAULT_CACHE_MAX_ENTRIES),
            redis_url,
            timeout: Duration::from_secs(
                cli.cache_timeout_secs
                    .or(file_cache.timeout_secs)
                    .unwrap_or(DEFAULT_CACHE_TIMEOUT_SECS),
            ),
        };

        let upstream = UpstreamConfig {
            geocoding_url: cli
                .geocoding_url
                .clone()
                .or(file_upstream.geocoding_url)
                .unwrap_or_else(|| DEFAULT_GEOCODING_URL.to_string()),
            forecast_url: cli
                .forecast_url
                .clone()
                .or(file_upstream.forecast_url)
                .unwrap_or_else(|| DEFAULT_FORECAST_URL.to_string()),
            timeout: Duration::from_secs(
                cli.upstream_timeout_secs
                    .or(file_upstream.timeout_secs)
                    .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            ),
        };

        let max_attempts = file_retry
            .max_attempts
            .unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS);
        if max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        let retry = RetryPolicy::new(
            max_attempts,
            Duration::from_millis(
                file_retry
                    .initial_delay_ms
                    .unwrap_or(DEFAULT_RETRY_INITIAL_DELAY_MS),
            ),
            Duration::from_millis(
                file_retry
                    .max_delay_ms
                    .unwrap_or(DEFAULT_RETRY_MAX_DELAY_MS),
            ),
        );

        let ttl = TtlConfig {
            weather: Duration::from_secs(
                file_ttl.weather_secs.unwrap_or(DEFAULT_WEATHER_TTL_SECS),
            ),
            proxy: Duration::from_secs(file_ttl.proxy_secs.unwrap_or(DEFAULT_PROXY_TTL_SECS)),
        };

        let config = Self {
            server,
            cache,
            upstream,
            retry,
            ttl,
            shutdown_grace: Duration::from_secs(
                cli.shutdown_grace_secs
                    .or(file_config.shutdown_grace_secs)
                    .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
            ),
        };

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            cache_backend = %config.cache.backend,
            "Configuration loaded"
        );

        Ok(config)
    }
}

/// Build a Redis URL from the legacy `REDIS_HOST`/`REDIS_PORT`/`REDIS_DB`/`REDIS_PASSWORD`
/// variables. Returns `None` unless `REDIS_HOST` is set.
fn legacy_redis_url<F>(var: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let host = var(ENV_REDIS_HOST).filter(|h| !h.is_empty())?;
    let port = var(ENV_REDIS_PORT).unwrap_or_else(|| "6379".to_string());
    let db = var(ENV_REDIS_DB).unwrap_or_else(|| "0".to_string());
    let auth = match var(ENV_REDIS_PASSWORD).filter(|p| !p.is_empty()) {
        Some(password) => format!(":{}@", password),
        None => String::new(),
    };
    Some(format!("redis://{}{}:{}/{}", auth, host, port, db))
}
