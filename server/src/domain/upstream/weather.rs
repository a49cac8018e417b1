//! Two-stage weather resolution: geocode a city, then fetch its forecast

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::{UpstreamError, UpstreamStage};
use crate::core::config::UpstreamConfig;
use crate::domain::metrics::MetricsRecorder;

/// First geocoding match for a city
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    // Open-Meteo omits `results` entirely when nothing matches
    #[serde(default)]
    results: Vec<GeoLocation>,
}

/// Forecast payload, `current_weather` kept as the provider sends it
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Forecast {
    pub current_weather: serde_json::Value,
    pub timezone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Weather for a city as stored in the cache
///
/// Per-request fields (`cached`, `request_id`) are never part of this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedWeather {
    pub city: String,
    pub country: Option<String>,
    pub coordinates: Coordinates,
    pub current_weather: serde_json::Value,
    pub timezone: String,
}

impl ResolvedWeather {
    pub fn new(location: GeoLocation, forecast: Forecast) -> Self {
        Self {
            city: location.name,
            country: location.country,
            coordinates: Coordinates {
                latitude: location.latitude,
                longitude: location.longitude,
            },
            current_weather: forecast.current_weather,
            timezone: forecast.timezone,
        }
    }
}

/// Weather provider seam
#[async_trait]
pub trait WeatherApi: Send + Sync {
    /// Best match for `city`, or `None` when the provider knows no such place
    async fn geocode(&self, city: &str) -> Result<Option<GeoLocation>, UpstreamError>;

    async fn forecast(&self, latitude: f64, longitude: f64) -> Result<Forecast, UpstreamError>;
}

/// Run both stages once
///
/// An empty geocoding result is `UpstreamError::NotFound` and the forecast
/// stage is never called.
pub async fn resolve_weather(
    api: &dyn WeatherApi,
    city: &str,
) -> Result<ResolvedWeather, UpstreamError> {
    let location = api
        .geocode(city)
        .await?
        .ok_or_else(|| UpstreamError::NotFound(city.to_string()))?;

    tracing::debug!(
        city = %location.name,
        latitude = location.latitude,
        longitude = location.longitude,
        "Geocoded city"
    );

    let forecast = api.forecast(location.latitude, location.longitude).await?;
    Ok(ResolvedWeather::new(location, forecast))
}

/// Open-Meteo geocoding and forecast client
pub struct OpenMeteoClient {
    client: reqwest::Client,
    geocoding_url: String,
    forecast_url: String,
    metrics: Arc<MetricsRecorder>,
}

impl OpenMeteoClient {
    pub fn new(
        client: reqwest::Client,
        config: &UpstreamConfig,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        tracing::debug!(
            geocoding_url = %config.geocoding_url,
            forecast_url = %config.forecast_url,
            "Open-Meteo client initialized"
        );
        Self {
            client,
            geocoding_url: config.geocoding_url.clone(),
            forecast_url: config.forecast_url.clone(),
            metrics,
        }
    }

    /// Send a GET, record its status and fail on non-2xx
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        stage: UpstreamStage,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(stage, e))?;

        let status = resp.status();
        self.metrics.record_upstream_status(status.as_u16());
        if !status.is_success() {
            return Err(UpstreamError::Status {
                stage,
                status: status.as_u16(),
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| UpstreamError::from_reqwest(stage, e))
    }
}

#[async_trait]
impl WeatherApi for OpenMeteoClient {
    async fn geocode(&self, city: &str) -> Result<Option<GeoLocation>, UpstreamError> {
        let query = [
            ("name", city.to_string()),
            ("count", "1".to_string()),
            ("language", "en".to_string()),
            ("format", "json".to_string()),
        ];
        let body: GeocodeResponse = self
            .get_json(UpstreamStage::Geocode, &self.geocoding_url, &query)
            .await?;
        Ok(body.results.into_iter().next())
    }

    async fn forecast(&self, latitude: f64, longitude: f64) -> Result<Forecast, UpstreamError> {
        let query = [
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current_weather", "true".to_string()),
            ("timezone", "auto".to_string()),
        ];
        self.get_json(UpstreamStage::Forecast, &self.forecast_url, &query)
            .await
    }
}
