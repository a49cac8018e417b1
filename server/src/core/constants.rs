// =============================================================================
// Application Identity
// =============================================================================

/// Service name reported by `/` and `/health`
pub const SERVICE_NAME: &str = "weather-proxy";

/// Crate name in lowercase (for log filters)
pub const APP_NAME_LOWER: &str = "weather_proxy_server";

/// Prefix for every exported Prometheus metric
pub const METRICS_NAMESPACE: &str = "weather_proxy";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "weather-proxy.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "WEATHER_PROXY_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "WEATHER_PROXY_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "WEATHER_PROXY_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "WEATHER_PROXY_LOG";

/// Environment variable for log output format (compact or json)
pub const ENV_LOG_FORMAT: &str = "WEATHER_PROXY_LOG_FORMAT";

/// Environment variable for the shutdown grace period
pub const ENV_SHUTDOWN_GRACE_SECS: &str = "WEATHER_PROXY_SHUTDOWN_GRACE_SECS";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port
pub const DEFAULT_PORT: u16 = 8000;

/// Default time to wait for in-flight work on shutdown
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

/// Maximum accepted request body for proxied requests (10 MB)
pub const PROXY_BODY_LIMIT: usize = 10 * 1024 * 1024;

// =============================================================================
// Environment Variables - Cache
// =============================================================================

/// Environment variable for cache backend (memory, redis, disabled)
pub const ENV_CACHE_BACKEND: &str = "WEATHER_PROXY_CACHE_BACKEND";

/// Environment variable for Redis connection URL
pub const ENV_CACHE_REDIS_URL: &str = "WEATHER_PROXY_REDIS_URL";

/// Environment variable for in-memory cache capacity
pub const ENV_CACHE_MAX_ENTRIES: &str = "WEATHER_PROXY_CACHE_MAX_ENTRIES";

/// Environment variable for per-call cache timeout
pub const ENV_CACHE_TIMEOUT_SECS: &str = "WEATHER_PROXY_CACHE_TIMEOUT_SECS";

/// Legacy Redis connection variables (used to build a URL when none is given)
pub const ENV_REDIS_HOST: &str = "REDIS_HOST";
pub const ENV_REDIS_PORT: &str = "REDIS_PORT";
pub const ENV_REDIS_DB: &str = "REDIS_DB";
pub const ENV_REDIS_PASSWORD: &str = "REDIS_PASSWORD";

// =============================================================================
// Cache Defaults
// =============================================================================

/// Default maximum entries for the in-memory cache
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 10_000;

/// Default per-call cache timeout (connect + operation)
pub const DEFAULT_CACHE_TIMEOUT_SECS: u64 = 5;

/// TTL for resolved weather entries
pub const DEFAULT_WEATHER_TTL_SECS: u64 = 600;

/// TTL for proxied GET responses
pub const DEFAULT_PROXY_TTL_SECS: u64 = 300;

// =============================================================================
// Environment Variables - Upstream
// =============================================================================

/// Environment variable for the geocoding endpoint
pub const ENV_GEOCODING_URL: &str = "WEATHER_PROXY_GEOCODING_URL";

/// Environment variable for the forecast endpoint
pub const ENV_FORECAST_URL: &str = "WEATHER_PROXY_FORECAST_URL";

/// Environment variable for the outbound HTTP client timeout
pub const ENV_UPSTREAM_TIMEOUT_SECS: &str = "WEATHER_PROXY_UPSTREAM_TIMEOUT_SECS";

// =============================================================================
// Upstream Defaults
// =============================================================================

/// Open-Meteo geocoding search endpoint
pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

/// Open-Meteo forecast endpoint
pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Overall timeout for a single outbound HTTP call
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Retry Defaults
// =============================================================================

/// Total attempts for the weather pipeline (first try included)
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Backoff before the second attempt
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 1_000;

/// Upper bound for a single backoff
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;

// =============================================================================
// Metrics
// =============================================================================

/// Maximum number of latency samples kept for the rolling window
pub const LATENCY_WINDOW_SIZE: usize = 1_000;

// =============================================================================
// HTTP Headers
// =============================================================================

/// Request correlation header (read from the client, echoed on the response)
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Cache status header on proxied responses
pub const CACHE_STATUS_HEADER: &str = "x-cache";
