//! API server initialization

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::middleware;
use super::routes::{health, metrics, proxy, weather};
use crate::core::CoreApp;
use crate::core::constants::PROXY_BODY_LIMIT;
use crate::data::cache::CacheService;
use crate::domain::gateway::{ProxyService, WeatherService};
use crate::domain::metrics::MetricsRecorder;

/// Everything the HTTP surface needs
#[derive(Clone)]
pub struct ApiServices {
    pub cache: Arc<CacheService>,
    pub metrics: Arc<MetricsRecorder>,
    pub weather: Arc<WeatherService>,
    pub proxy: Arc<ProxyService>,
}

/// Build the full router with middleware
///
/// Layer order, outermost first: request id span, HTTP trace, request
/// metrics, body limit.
pub fn build_router(services: ApiServices) -> Router {
    let ApiServices {
        cache,
        metrics: recorder,
        weather: weather_service,
        proxy: proxy_service,
    } = services;

    Router::new()
        .merge(health::routes(cache.clone(), recorder.clone()))
        .merge(metrics::routes(cache, recorder.clone()))
        .merge(weather::routes(weather_service))
        .merge(proxy::routes(proxy_service))
        .fallback(middleware::handle_404)
        .layer(DefaultBodyLimit::max(PROXY_BODY_LIMIT))
        .layer(axum::middleware::from_fn_with_state(
            recorder,
            middleware::track_metrics,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(middleware::request_id))
}

pub struct ApiServer {
    app: CoreApp,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        Self { app }
    }

    /// Serve until shutdown is triggered, then hand `CoreApp` back for cleanup
    pub async fn start(self) -> Result<CoreApp> {
        let app = self.app;
        let shutdown = app.shutdown.clone();

        let addr = SocketAddr::new(app.config.server.host.parse()?, app.config.server.port);
        let router = build_router(app.services());

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(address = %addr, "Listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::Value;
    use tokio_util::task::TaskTracker;
    use tower::ServiceExt;

    use super::*;
    use crate::data::cache::CacheBackend;
    use crate::data::cache::testing::{FailingCache, RecordingCache};
    use crate::domain::gateway::CacheAside;
    use crate::domain::upstream::proxy_testing::MockProxyTransport;
    use crate::domain::upstream::weather_testing::MockWeatherApi;
    use crate::utils::retry::RetryPolicy;

    struct Harness {
        router: Router,
        weather_api: Arc<MockWeatherApi>,
        transport: Arc<MockProxyTransport>,
        metrics: Arc<MetricsRecorder>,
        writes: TaskTracker,
    }

    impl Harness {
        fn new(cache: CacheService, transport: MockProxyTransport) -> Self {
            Self::build(cache, MockWeatherApi::london(), transport)
        }

        fn build(
            cache: CacheService,
            weather_api: MockWeatherApi,
            transport: MockProxyTransport,
        ) -> Self {
            let cache = Arc::new(cache);
            let metrics = Arc::new(MetricsRecorder::new().unwrap());
            let writes = TaskTracker::new();
            let aside = CacheAside::new(cache.clone(), metrics.clone(), writes.clone());

            let weather_api = Arc::new(weather_api);
            let transport = Arc::new(transport);
            let retry = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5));

            let services = ApiServices {
                cache,
                metrics: metrics.clone(),
                weather: Arc::new(WeatherService::new(
                    weather_api.clone(),
                    aside.clone(),
                    retry,
                    Duration::from_secs(600),
                )),
                proxy: Arc::new(ProxyService::new(
                    transport.clone(),
                    aside,
                    Duration::from_secs(300),
                )),
            };

            Self {
                router: build_router(services),
                weather_api,
                transport,
                metrics,
                writes,
            }
        }

        fn with_backend(backend: Arc<dyn CacheBackend>) -> Self {
            Self::new(
                CacheService::from_backend(backend, Duration::from_secs(5)),
                MockProxyTransport::responding(200, r#"{"ok":true}"#),
            )
        }

        async fn send(&self, req: Request<Body>) -> Response {
            self.router.clone().oneshot(req).await.unwrap()
        }

        async fn get(&self, uri: &str) -> Response {
            self.send(Request::get(uri).body(Body::empty()).unwrap())
                .await
        }

        async fn settle(&self) {
            self.writes.close();
            self.writes.wait().await;
            self.writes.reopen();
        }
    }

    fn recording_cache() -> CacheService {
        CacheService::from_backend(Arc::new(RecordingCache::new()), Duration::from_secs(5))
    }

    async fn json_body(resp: Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn text_body(resp: Response) -> String {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_root() {
        let h = Harness::with_backend(Arc::new(RecordingCache::new()));
        let resp = h.get("/").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json = json_body(resp).await;
        assert_eq!(json["service"], "weather-proxy");
        assert_eq!(json["status"], "running");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_weather_miss_then_hit() {
        let h = Harness::with_backend(Arc::new(RecordingCache::new()));

        let resp = h.get("/weather?city=London").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let first = json_body(resp).await;
        h.settle().await;

        let resp = h.get("/weather?city=%20london%20").await;
        let second = json_body(resp).await;

        assert_eq!(first["cached"], false);
        assert_eq!(first["city"], "London");
        assert_eq!(first["coordinates"]["latitude"], 51.5074);
        assert_eq!(second["cached"], true);
        assert_eq!(h.weather_api.geocode_calls(), 1);
    }

    #[tokio::test]
    async fn test_weather_request_id_is_echoed() {
        let h = Harness::with_backend(Arc::new(RecordingCache::new()));
        let req = Request::get("/weather?city=London")
            .header("x-request-id", "trace-42")
            .body(Body::empty())
            .unwrap();

        let resp = h.send(req).await;
        assert_eq!(resp.headers()["x-request-id"], "trace-42");
        assert_eq!(json_body(resp).await["request_id"], "trace-42");
    }

    #[tokio::test]
    async fn test_request_id_generated_when_absent() {
        let h = Harness::with_backend(Arc::new(RecordingCache::new()));
        let resp = h.get("/weather?city=London").await;

        let header = resp.headers()["x-request-id"].to_str().unwrap().to_string();
        assert!(uuid::Uuid::parse_str(&header).is_ok());
        assert_eq!(json_body(resp).await["request_id"], header.as_str());
    }

    #[tokio::test]
    async fn test_weather_missing_city_is_400() {
        let h = Harness::with_backend(Arc::new(RecordingCache::new()));
        for uri in ["/weather", "/weather?city=", "/weather?city=%20%20"] {
            let resp = h.get(uri).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(json_body(resp).await["error"], "bad_request");
        }
        assert_eq!(h.weather_api.geocode_calls(), 0);
    }

    #[tokio::test]
    async fn test_weather_malformed_query_is_json_400() {
        let h = Harness::with_backend(Arc::new(RecordingCache::new()));

        let resp = h.get("/weather?city=Paris&city=London").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = json_body(resp).await;
        assert_eq!(json["error"], "bad_request");
        assert_eq!(json["code"], "QUERY_PARSE_ERROR");
        assert_eq!(h.weather_api.geocode_calls(), 0);
    }

    #[tokio::test]
    async fn test_weather_unknown_city_is_404() {
        let h = Harness::build(
            CacheService::disabled(),
            MockWeatherApi::scripted(vec![Ok(None)]),
            MockProxyTransport::responding(200, "ok"),
        );

        let resp = h.get("/weather?city=Atlantis").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let json = json_body(resp).await;
        assert_eq!(json["error"], "not_found");
        assert_eq!(json["message"], "City 'Atlantis' not found");
        assert_eq!(h.weather_api.geocode_calls(), 1);
        assert_eq!(h.weather_api.forecast_calls(), 0);
    }

    #[tokio::test]
    async fn test_proxy_get_sets_x_cache() {
        let h = Harness::with_backend(Arc::new(RecordingCache::new()));

        let resp = h.get("/proxy/users?url=api.example.com&page=2").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-cache"], "MISS");
        assert_eq!(resp.headers()["x-upstream"], "mock");
        assert_eq!(text_body(resp).await, r#"{"ok":true}"#);
        h.settle().await;

        let resp = h.get("/proxy/users?url=api.example.com&page=2").await;
        assert_eq!(resp.headers()["x-cache"], "HIT");
        assert_eq!(h.transport.call_count(), 1);

        let sent = h.transport.last_request().unwrap();
        assert_eq!(sent.target_url, "https://api.example.com");
        assert!(sent.query.contains(&("page".to_string(), "2".to_string())));
    }

    #[tokio::test]
    async fn test_proxy_empty_path() {
        let h = Harness::with_backend(Arc::new(RecordingCache::new()));
        let resp = h.get("/proxy/?url=https://api.example.com").await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_proxy_post_forwards_body_and_skips_cache() {
        let backend = Arc::new(RecordingCache::new());
        let h = Harness::with_backend(backend.clone());

        let req = Request::post("/proxy/items?url=api.example.com")
            .header("content-type", "application/json")
            .header("x-custom", "kept")
            .body(Body::from(r#"{"name":"widget"}"#))
            .unwrap();
        let resp = h.send(req).await;
        h.settle().await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get("x-cache").is_none());
        assert_eq!(backend.get_count(), 0);
        assert_eq!(backend.set_count(), 0);

        let sent = h.transport.last_request().unwrap();
        assert_eq!(sent.body.as_deref(), Some(&br#"{"name":"widget"}"#[..]));
        assert_eq!(sent.headers["x-custom"], "kept");
        assert!(sent.headers.get("host").is_none());
    }

    #[tokio::test]
    async fn test_proxy_passes_upstream_status_through() {
        let h = Harness::new(
            recording_cache(),
            MockProxyTransport::responding(418, "teapot"),
        );

        let resp = h.get("/proxy/brew?url=api.example.com").await;
        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(text_body(resp).await, "teapot");
    }

    #[tokio::test]
    async fn test_proxy_missing_url_is_400() {
        let h = Harness::with_backend(Arc::new(RecordingCache::new()));
        let resp = h.get("/proxy/users").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_proxy_unreachable_is_502() {
        let h = Harness::new(recording_cache(), MockProxyTransport::unreachable());

        let resp = h.get("/proxy/users?url=api.example.com").await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(resp).await["error"], "bad_gateway");
        assert_eq!(h.metrics.snapshot().total_errors, 1);
    }

    #[tokio::test]
    async fn test_unsupported_proxy_method_is_405() {
        let h = Harness::with_backend(Arc::new(RecordingCache::new()));
        let req = Request::options("/proxy/users?url=api.example.com")
            .body(Body::empty())
            .unwrap();
        let resp = h.send(req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(h.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let h = Harness::with_backend(Arc::new(RecordingCache::new()));
        let resp = h.get("/nope").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(h.metrics.snapshot().requests_by_endpoint.contains_key("unmatched"));
    }

    #[tokio::test]
    async fn test_health_healthy() {
        let h = Harness::with_backend(Arc::new(RecordingCache::new()));
        h.get("/weather?city=London").await;

        let json = json_body(h.get("/health").await).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "weather-proxy");
        assert_eq!(json["cache"]["status"], "connected");
        assert_eq!(json["cache"]["backend"], "recording");
        assert_eq!(json["metrics"]["requests_by_endpoint"]["/weather"], 1);
        assert!(json["metrics"]["total_requests"].as_u64().unwrap() >= 2);
    }

    #[tokio::test]
    async fn test_health_degraded_when_cache_down() {
        let h = Harness::with_backend(Arc::new(FailingCache));
        let resp = h.get("/health").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json = json_body(resp).await;
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["cache"]["status"], "disconnected");
        assert!(json["cache"]["error"].is_string());
    }

    #[tokio::test]
    async fn test_health_without_cache() {
        let h = Harness::new(
            CacheService::disabled(),
            MockProxyTransport::responding(200, "ok"),
        );
        let json = json_body(h.get("/health").await).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["cache"]["status"], "not_configured");
        assert!(json["cache"].get("error").is_none());
    }

    #[tokio::test]
    async fn test_weather_served_while_cache_down() {
        let h = Harness::with_backend(Arc::new(FailingCache));
        let resp = h.get("/weather?city=London").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["cached"], false);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let h = Harness::with_backend(Arc::new(RecordingCache::new()));
        h.get("/weather?city=London").await;

        let resp = h.get("/metrics").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(
            resp.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );

        let text = text_body(resp).await;
        assert!(text.contains(r#"weather_proxy_requests_total{endpoint="/weather"} 1"#));
        assert!(text.contains("weather_proxy_request_duration_seconds"));
        assert!(text.contains("weather_proxy_errors_total"));
        assert!(text.contains("weather_proxy_cache_operations_total"));
        assert!(text.contains("weather_proxy_cache_connected 1"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_are_all_counted() {
        let h = Arc::new(Harness::with_backend(Arc::new(RecordingCache::new())));

        let statuses = futures::future::join_all((0..100).map(|_| {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.get("/").await.status() })
        }))
        .await;
        for status in statuses {
            assert_eq!(status.unwrap(), StatusCode::OK);
        }

        assert_eq!(h.metrics.snapshot().requests_by_endpoint["/"], 100);
    }
}
