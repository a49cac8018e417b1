//! Domain logic for the gateway
//!
//! - `gateway` - cache-aside weather and proxy services
//! - `metrics` - in-process counters and the Prometheus exporter
//! - `upstream` - outbound HTTP clients (Open-Meteo, proxy targets)

pub mod gateway;
pub mod metrics;
pub mod upstream;
