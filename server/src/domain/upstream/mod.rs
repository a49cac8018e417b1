//! Upstream Fetcher
//!
//! - `weather` - geocode then forecast against Open-Meteo (`WeatherApi`)
//! - `proxy` - single pass-through call to any target (`ProxyTransport`)
//!
//! Both reqwest implementations share one `reqwest::Client`, built here.

mod error;
mod proxy;
mod weather;

use std::time::Duration;

pub use error::{UpstreamError, UpstreamStage};
pub use proxy::{
    HttpProxyTransport, ProxiedResponse, ProxyRequest, ProxyTransport, method_has_body,
    normalize_target_url,
};
pub use weather::{
    Coordinates, Forecast, GeoLocation, OpenMeteoClient, ResolvedWeather, WeatherApi,
    resolve_weather,
};

#[cfg(test)]
pub(crate) use proxy::testing as proxy_testing;
#[cfg(test)]
pub(crate) use weather::testing as weather_testing;

/// Build the shared outbound HTTP client
///
/// `timeout` bounds each whole request. Redirects are not followed so the
/// proxy hands 3xx responses back to the caller untouched.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(concat!("weather-proxy/", env!("CARGO_PKG_VERSION")))
        .build()
}
