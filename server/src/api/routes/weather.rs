//! Weather lookup endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;

use crate::api::extractors::ApiQuery;
use crate::api::middleware::RequestId;
use crate::api::types::ApiError;
use crate::domain::gateway::{WeatherResponse, WeatherService};

#[derive(Clone)]
pub struct WeatherApiState {
    pub weather: Arc<WeatherService>,
}

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub city: Option<String>,
}

pub fn routes(weather: Arc<WeatherService>) -> Router<()> {
    let state = WeatherApiState { weather };
    Router::new()
        .route("/weather", get(get_weather))
        .with_state(state)
}

/// Current weather for `?city=`, served from cache when possible
pub async fn get_weather(
    State(state): State<WeatherApiState>,
    Extension(request_id): Extension<RequestId>,
    ApiQuery(query): ApiQuery<WeatherQuery>,
) -> Result<Json<WeatherResponse>, ApiError> {
    let city = query.city.unwrap_or_default();
    let response = state.weather.get_weather(&city, &request_id.0).await?;
    Ok(Json(response))
}
