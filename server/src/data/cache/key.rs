//! Type-safe cache key builder
//!
//! Keys are namespaced by request kind so weather and proxy entries can never
//! collide. Logically equivalent requests must map to the same key.

/// Type-safe cache key builder
pub struct CacheKey;

impl CacheKey {
    // =========================================================================
    // Weather
    // =========================================================================

    /// Cache key for a resolved weather lookup
    ///
    /// City names differing only in case or surrounding whitespace share a key.
    pub fn weather(city: &str) -> String {
        format!("weather:{}", normalize_city(city))
    }

    // =========================================================================
    // Proxy
    // =========================================================================

    /// Cache key for a proxied GET response
    ///
    /// Only safe (GET) requests are ever cached under this key.
    pub fn proxy(target_url: &str, path: &str) -> String {
        format!("proxy:{}:{}", target_url, path)
    }
}

/// Normalize a city name for cache lookups (trimmed, lowercase)
pub fn normalize_city(city: &str) -> String {
    city.trim().to_lowercase()
}
