//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::api::{ApiServer, ApiServices};
use crate::core::cli::{self, CliConfig};
use crate::core::config::{AppConfig, LogFormat};
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::data::cache::CacheService;
use crate::domain::gateway::{CacheAside, ProxyService, WeatherService};
use crate::domain::metrics::MetricsRecorder;
use crate::domain::upstream::{HttpProxyTransport, OpenMeteoClient, build_http_client};

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub cache: Arc<CacheService>,
    pub metrics: Arc<MetricsRecorder>,
    pub weather: Arc<WeatherService>,
    pub proxy: Arc<ProxyService>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();

        let cli_config = cli::parse();
        Self::init_logging(cli_config.log_format.unwrap_or_default());
        tracing::debug!("Application starting");

        let app = Self::init(&cli_config).await?;
        Self::start_server(app).await
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;

        let shutdown = ShutdownService::new(config.shutdown_grace);

        let metrics = Arc::new(
            MetricsRecorder::new().context("Failed to register Prometheus collectors")?,
        );

        let cache = Arc::new(
            CacheService::new(&config.cache)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to initialize cache service: {}", e))?,
        );
        tracing::debug!(backend = cache.backend_name(), "Cache initialized");

        let client = build_http_client(config.upstream.timeout)
            .context("Failed to build outbound HTTP client")?;
        let aside = CacheAside::new(cache.clone(), metrics.clone(), shutdown.tracker());

        let weather_api = Arc::new(OpenMeteoClient::new(
            client.clone(),
            &config.upstream,
            metrics.clone(),
        ));
        let weather = Arc::new(WeatherService::new(
            weather_api,
            aside.clone(),
            config.retry,
            config.ttl.weather,
        ));

        let transport = Arc::new(HttpProxyTransport::new(client, metrics.clone()));
        let proxy = Arc::new(ProxyService::new(transport, aside, config.ttl.proxy));

        Ok(Self {
            shutdown,
            config,
            cache,
            metrics,
            weather,
            proxy,
        })
    }

    /// Services handed to the HTTP layer
    pub fn services(&self) -> ApiServices {
        ApiServices {
            cache: self.cache.clone(),
            metrics: self.metrics.clone(),
            weather: self.weather.clone(),
            proxy: self.proxy.clone(),
        }
    }

    fn init_logging(format: LogFormat) {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        let builder = tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_env_filter(EnvFilter::new(filter));

        match format {
            LogFormat::Compact => builder.with_ansi(true).compact().init(),
            LogFormat::Json => builder.with_ansi(false).json().init(),
        }
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        tracing::info!(
            cache = app.cache.backend_name(),
            weather_ttl_secs = app.config.ttl.weather.as_secs(),
            proxy_ttl_secs = app.config.ttl.proxy.as_secs(),
            "Weather proxy ready"
        );

        let server = ApiServer::new(app);
        let app = server.start().await?;
        if !app.shutdown.shutdown().await {
            tracing::warn!("Some cache writes were abandoned at shutdown");
        }

        tracing::debug!("Releasing cache and HTTP clients");
        drop(app);
        Ok(())
    }
}
