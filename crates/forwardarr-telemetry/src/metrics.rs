//! Prometheus metrics registry for Forwardarr
//!
//! One explicitly constructed registry is shared (behind an `Arc`) by the
//! sync engine, which writes it, and the status server, which scrapes it.
//! Prometheus metric types are atomic, so both sides may touch them
//! concurrently.

use chrono::Utc;
use prometheus::{Encoder, IntCounter, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

/// Central metrics registry holding all Prometheus metrics.
pub struct MetricsRegistry {
    registry: Registry,
    /// Gauge: forwarded port most recently applied to the torrent client
    pub current_port: IntGauge,
    /// Counter: successful port updates
    pub sync_total: IntCounter,
    /// Counter: failed port updates
    pub sync_errors: IntCounter,
    /// Gauge: unix timestamp of the last successful update
    pub last_sync_timestamp: IntGauge,
    /// Gauge: always 1, labelled with the build version
    pub build_info: IntGaugeVec,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with all metrics registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("forwardarr".to_string()), None)?;

        let current_port = IntGauge::with_opts(Opts::new(
            "current_port",
            "The current forwarded port being synchronized",
        ))?;
        registry.register(Box::new(current_port.clone()))?;

        let sync_total = IntCounter::with_opts(Opts::new(
            "sync_total",
            "Total number of successful port sync operations",
        ))?;
        registry.register(Box::new(sync_total.clone()))?;

        let sync_errors = IntCounter::with_opts(Opts::new(
            "sync_errors",
            "Total number of failed port sync operations",
        ))?;
        registry.register(Box::new(sync_errors.clone()))?;

        let last_sync_timestamp = IntGauge::with_opts(Opts::new(
            "last_sync_timestamp",
            "Unix timestamp of the last successful sync",
        ))?;
        registry.register(Box::new(last_sync_timestamp.clone()))?;

        let build_info = IntGaugeVec::new(
            Opts::new("info", "Information about the Forwardarr build"),
            &["version"],
        )?;
        registry.register(Box::new(build_info.clone()))?;
        build_info
            .with_label_values(&[env!("CARGO_PKG_VERSION")])
            .set(1);

        Ok(Self {
            registry,
            current_port,
            sync_total,
            sync_errors,
            last_sync_timestamp,
            build_info,
        })
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    /// Set the gauge for the port now applied to the torrent client.
    pub fn set_current_port(&self, port: u16) {
        self.current_port.set(i64::from(port));
    }

    /// Record a successful port update and stamp the time.
    pub fn record_sync_success(&self) {
        self.sync_total.inc();
        self.last_sync_timestamp.set(Utc::now().timestamp());
    }

    /// Record a failed port update.
    pub fn record_sync_error(&self) {
        self.sync_errors.inc();
    }

    /// Port last applied, if any update has happened in this process.
    pub fn current_port_value(&self) -> Option<u16> {
        u16::try_from(self.current_port.get())
            .ok()
            .filter(|port| *port > 0)
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
