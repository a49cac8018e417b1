use clap::Parser;

use std::path::PathBuf;

use super::config::{CacheBackendType, LogFormat};
use super::constants::{
    ENV_CACHE_BACKEND, ENV_CACHE_MAX_ENTRIES, ENV_CACHE_REDIS_URL, ENV_CACHE_TIMEOUT_SECS,
    ENV_CONFIG, ENV_FORECAST_URL, ENV_GEOCODING_URL, ENV_HOST, ENV_LOG_FORMAT, ENV_PORT,
    ENV_SHUTDOWN_GRACE_SECS, ENV_UPSTREAM_TIMEOUT_SECS,
};

#[derive(Parser)]
#[command(name = "weather-proxy")]
#[command(version, about = "Caching HTTP gateway for weather lookups and generic proxying", long_about = None)]
pub struct Cli {
    /// Server host address
    #[arg(long, short = 'H', env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Log output format (compact or json)
    #[arg(long, env = ENV_LOG_FORMAT, value_parser = parse_log_format)]
    pub log_format: Option<LogFormat>,

    /// Seconds to wait for in-flight work during shutdown
    #[arg(long, env = ENV_SHUTDOWN_GRACE_SECS)]
    pub shutdown_grace_secs: Option<u64>,

    // Cache options
    /// Cache backend (memory, redis or disabled)
    #[arg(long, env = ENV_CACHE_BACKEND, value_parser = parse_cache_backend_type)]
    pub cache_backend: Option<CacheBackendType>,

    /// Redis-compatible cache URL (redis://[user:password@]host:port[/db])
    #[arg(long, env = ENV_CACHE_REDIS_URL)]
    pub cache_redis_url: Option<String>,

    /// Maximum number of entries for the in-memory cache
    #[arg(long, env = ENV_CACHE_MAX_ENTRIES)]
    pub cache_max_entries: Option<u64>,

    /// Timeout in seconds for a single cache operation
    #[arg(long, env = ENV_CACHE_TIMEOUT_SECS)]
    pub cache_timeout_secs: Option<u64>,

    // Upstream options
    /// Geocoding endpoint URL
    #[arg(long, env = ENV_GEOCODING_URL)]
    pub geocoding_url: Option<String>,

    /// Forecast endpoint URL
    #[arg(long, env = ENV_FORECAST_URL)]
    pub forecast_url: Option<String>,

    /// Timeout in seconds for a single outbound HTTP call
    #[arg(long, env = ENV_UPSTREAM_TIMEOUT_SECS)]
    pub upstream_timeout_secs: Option<u64>,
}

/// Parse cache backend type from CLI/env string
fn parse_cache_backend_type(s: &str) -> Result<CacheBackendType, String> {
    match s.to_lowercase().as_str() {
        "memory" => Ok(CacheBackendType::Memory),
        "redis" => Ok(CacheBackendType::Redis),
        "disabled" | "none" => Ok(CacheBackendType::Disabled),
        _ => Err(format!(
            "Invalid cache backend '{}'. Valid options: memory, redis, disabled",
            s
        )),
    }
}

/// Parse log format from CLI/env string
fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    match s.to_lowercase().as_str() {
        "compact" | "text" => Ok(LogFormat::Compact),
        "json" => Ok(LogFormat::Json),
        _ => Err(format!(
            "Invalid log format '{}'. Valid options: compact, json",
            s
        )),
    }
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub log_format: Option<LogFormat>,
    pub shutdown_grace_secs: Option<u64>,
    pub cache_backend: Option<CacheBackendType>,
    pub cache_redis_url: Option<String>,
    pub cache_max_entries: Option<u64>,
    pub cache_timeout_secs: Option<u64>,
    pub geocoding_url: Option<String>,
    pub forecast_url: Option<String>,
    pub upstream_timeout_secs: Option<u64>,
}

/// Parse CLI arguments
pub fn parse() -> CliConfig {
    let cli = Cli::parse();
    CliConfig {
        host: cli.host,
        port: cli.port,
        config: cli.config,
        log_format: cli.log_format,
        shutdown_grace_secs: cli.shutdown_grace_secs,
        cache_backend: cli.cache_backend,
        cache_redis_url: cli.cache_redis_url,
        cache_max_entries: cli.cache_max_entries,
        cache_timeout_secs: cli.cache_timeout_secs,
        geocoding_url: cli.geocoding_url,
        forecast_url: cli.forecast_url,
        upstream_timeout_secs: cli.upstream_timeout_secs,
    }
}
