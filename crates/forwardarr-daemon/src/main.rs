//! Forwardarr Daemon - Keeps qBittorrent listening on the VPN forwarded port
//!
//! This binary runs next to a VPN container (typically gluetun) and handles:
//! - Connecting to the qBittorrent WebUI, retrying while it boots
//! - Watching the forwarded port file and reconciling on change
//! - Periodic reconciliation as a safety net
//! - Health, readiness, status and metrics endpoints
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! After the startup connection succeeds, the status server runs as a
//! background task and the sync engine runs on the main task. Both are
//! controlled by a `CancellationToken` that is triggered on receipt of
//! SIGTERM or SIGINT; dropping the file watcher is what stops the engine.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use forwardarr_core::config::{Config, LoggingConfig};
use forwardarr_core::ports::{IPortNotifier, ITorrentClient};
use forwardarr_qbit::SessionClient;
use forwardarr_sync::{
    connect_with_retry, PortFileWatcher, PortSource, StartupSettings, SyncEngine, SyncError,
};
use forwardarr_telemetry::{MetricsRegistry, StatusServer};
use forwardarr_webhook::WebhookClient;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// CLI
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "forwardarrd", version, about)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "FORWARDARR_CONFIG")]
    config: Option<PathBuf>,
}

// ============================================================================
// DaemonService
// ============================================================================

/// Owns the configuration and the shutdown token for one daemon run
struct DaemonService {
    config: Config,
    shutdown: CancellationToken,
}

impl DaemonService {
    fn new(config: Config, shutdown: CancellationToken) -> Self {
        Self { config, shutdown }
    }

    /// Runs the daemon until shutdown or a fatal error
    ///
    /// 1. Connects to the torrent client within the startup window
    /// 2. Starts the status server
    /// 3. Starts watching the port file and runs the sync engine
    /// 4. On shutdown, stops the watcher and waits for the server
    async fn run(&self) -> Result<()> {
        let settings = startup_settings(&self.config);
        let tc = &self.config.torrent_client;

        info!(
            port_file = %self.config.source.port_file.display(),
            torrent_client_url = %tc.url,
            sync_interval_secs = self.config.sync.interval,
            startup_retry_delay_secs = settings.retry_delay.as_secs(),
            startup_timeout_secs = settings.timeout.as_secs(),
            max_attempts = settings.max_attempts(),
            webhook_enabled = self.config.webhook.enabled(),
            metrics_port = self.config.server.port,
            "Starting forwardarr"
        );

        let metrics = Arc::new(MetricsRegistry::new().context("Failed to create metrics registry")?);

        let request_timeout = Duration::from_secs(tc.request_timeout);
        let connect = connect_with_retry(settings, &tc.url, move || {
            SessionClient::connect(
                tc.url.clone(),
                tc.username.clone(),
                tc.password.clone(),
                request_timeout,
            )
        });
        let session = tokio::select! {
            result = connect => result.context("Torrent client never became reachable")?,
            _ = self.shutdown.cancelled() => {
                info!("Shutdown requested before the torrent client was reachable");
                return Ok(());
            }
        };
        let client: Arc<dyn ITorrentClient> = Arc::new(session);

        // Status server
        let server = StatusServer::new(
            Arc::clone(&metrics),
            Arc::clone(&client),
            &server_endpoint(&self.config),
        )
        .context("Invalid status server address")?;
        let running = server.running_flag();
        let server_token = self.shutdown.clone();
        let server_task = tokio::spawn(async move { server.run(server_token).await });

        // Sync engine
        let mut engine = SyncEngine::new(
            PortSource::new(&self.config.source.port_file),
            Arc::clone(&client),
            Arc::clone(&metrics),
        )
        .with_sync_interval(self.config.sync.interval());
        if let Some(notifier) = build_notifier(&self.config)? {
            engine = engine.with_notifier(notifier);
        }

        let (watcher, streams) = PortFileWatcher::new(&self.config.source.port_file)
            .context("Failed to start port file watcher")?;

        let engine_run = engine.run(streams);
        tokio::pin!(engine_run);

        let result = tokio::select! {
            result = &mut engine_run => {
                error!("Sync engine stopped unexpectedly");
                self.shutdown.cancel();
                result.context("Sync engine failed")
            }
            _ = self.shutdown.cancelled() => {
                info!("Stopping sync engine");
                running.store(false, Ordering::SeqCst);
                drop(watcher);
                match engine_run.await {
                    Ok(()) | Err(SyncError::ChannelClosed(_)) => Ok(()),
                    Err(e) => Err(e).context("Sync engine failed during shutdown"),
                }
            }
        };

        match server_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %format!("{e:#}"), "Status server exited with error"),
            Err(e) => warn!(error = %e, "Status server task panicked"),
        }

        result
    }
}

/// Startup retry window from configuration, with zero values defaulted
fn startup_settings(config: &Config) -> StartupSettings {
    StartupSettings {
        retry_delay: config.startup.retry_delay(),
        timeout: config.startup.timeout(),
    }
}

/// Listen address for the status server
fn server_endpoint(config: &Config) -> String {
    format!("0.0.0.0:{}", config.server.port)
}

/// Webhook notifier, when a URL is configured
fn build_notifier(config: &Config) -> Result<Option<Arc<dyn IPortNotifier>>> {
    let webhook = &config.webhook;
    let Some(url) = webhook.url.as_deref().filter(|_| webhook.enabled()) else {
        return Ok(None);
    };

    let client = WebhookClient::new(
        url,
        Duration::from_secs(webhook.timeout),
        webhook.events.clone(),
    )
    .context("Failed to create webhook client")?;
    info!(url = %client.url(), events = ?webhook.events, "Webhook notifications enabled");

    let notifier: Arc<dyn IPortNotifier> = Arc::new(client);
    Ok(Some(notifier))
}

// ============================================================================
// Logging
// ============================================================================

/// Initialise the global subscriber; `RUST_LOG` wins over the config level
fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    match logging.format.as_str() {
        "pretty" => builder.pretty().init(),
        _ => builder.json().init(),
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

/// Load the config file (or defaults) and apply environment overrides
fn load_config(args: &Args) -> Result<(Config, PathBuf)> {
    let path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = match &args.config {
        Some(explicit) => Config::load(explicit)?,
        None => Config::load_or_default(&path)?,
    };
    config.apply_env();
    Ok((config, path))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (config, config_path) = load_config(&args)?;

    init_tracing(&config.logging);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config_path = %config_path.display(),
        "Forwardarr daemon starting (forwardarrd)"
    );

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!(field = %e.field, message = %e.message, "Invalid configuration");
        }
        anyhow::bail!("configuration has {} error(s)", errors.len());
    }

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token);
    let result = service.run().await;

    match &result {
        Ok(()) => info!("Forwardarr daemon shut down gracefully"),
        Err(e) => error!(error = %format!("{e:#}"), "Forwardarr daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
