//! Weather lookups: cache first, then geocode + forecast under retry

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::{CacheAside, GatewayError};
use crate::data::cache::CacheKey;
use crate::domain::upstream::{ResolvedWeather, UpstreamError, WeatherApi, resolve_weather};
use crate::utils::retry::{RetryPolicy, retry_with_backoff_async};

/// Weather result as returned to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherResponse {
    #[serde(flatten)]
    pub weather: ResolvedWeather,
    pub cached: bool,
    pub request_id: String,
}

pub struct WeatherService {
    api: Arc<dyn WeatherApi>,
    cache: CacheAside,
    retry: RetryPolicy,
    ttl: Duration,
}

impl WeatherService {
    pub fn new(
        api: Arc<dyn WeatherApi>,
        cache: CacheAside,
        retry: RetryPolicy,
        ttl: Duration,
    ) -> Self {
        Self {
            api,
            cache,
            retry,
            ttl,
        }
    }

    /// Resolve current weather for `city`
    ///
    /// Every failure is counted once in the error metrics before it is
    /// returned.
    pub async fn get_weather(
        &self,
        city: &str,
        request_id: &str,
    ) -> Result<WeatherResponse, GatewayError> {
        let result = self.lookup(city, request_id).await;
        if let Err(e) = &result {
            self.cache.metrics().record_error();
            tracing::warn!(city = %city, error = %e, "Weather lookup failed");
        }
        result
    }

    async fn lookup(&self, city: &str, request_id: &str) -> Result<WeatherResponse, GatewayError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(GatewayError::Validation(
                "Query parameter 'city' is required".to_string(),
            ));
        }

        let key = CacheKey::weather(city);
        if let Some(weather) = self.cache.read::<ResolvedWeather>(&key).await {
            return Ok(WeatherResponse {
                weather,
                cached: true,
                request_id: request_id.to_string(),
            });
        }

        let api = self.api.as_ref();
        let fetched = retry_with_backoff_async(&self.retry, UpstreamError::is_retryable, |attempt| {
            tracing::debug!(city = %city, attempt, "Fetching weather from upstream");
            resolve_weather(api, city)
        })
        .await;

        let weather = match fetched {
            Ok((weather, attempts)) => {
                tracing::info!(city = %city, attempts, "Fetched weather from upstream");
                weather
            }
            Err((e, attempts)) => {
                tracing::debug!(city = %city, attempts, error = %e, "Giving up on weather fetch");
                return Err(e.into());
            }
        };

        self.cache.write_detached(key, weather.clone(), self.ttl);

        Ok(WeatherResponse {
            weather,
            cached: false,
            request_id: request_id.to_string(),
        })
    }
}
