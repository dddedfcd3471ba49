//! Forwardarr Telemetry - Metrics and status endpoints
//!
//! Provides:
//! - `MetricsRegistry`: Prometheus counters and gauges for port synchronization
//! - `StatusServer`: HTTP server exposing `/health`, `/ready`, `/status` and `/metrics`

pub mod metrics;
pub mod server;

pub use metrics::MetricsRegistry;
pub use server::StatusServer;
