//! Port reconciliation engine
//!
//! The [`SyncEngine`] keeps the torrent client's listening port equal to the
//! port in the VPN's port file.
//!
//! ## Reconciliation
//!
//! 1. Read the port file
//! 2. Ask the torrent client for its current listening port
//! 3. If they match, do nothing
//! 4. Otherwise set the new port, update metrics, then notify
//!
//! Both sides are re-read on every pass; the cached `last_port` is only
//! reported, never trusted.
//!
//! ## Triggers
//!
//! [`SyncEngine::run`] reconciles once at start, then on every port file
//! event, on every tick of the optional sync interval, and logs watcher
//! errors. Passes run one at a time on the calling task.

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use forwardarr_core::domain::ForwardedPort;
use forwardarr_core::ports::{IPortNotifier, ITorrentClient, NotifyOutcome};
use forwardarr_telemetry::MetricsRegistry;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::source::PortSource;
use crate::watcher::{is_port_file_update, WatchStreams};
use crate::SyncError;

/// Result of a successful reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The torrent client already listened on the forwarded port
    InSync(ForwardedPort),
    /// The torrent client was moved from `old` to `new`
    Updated {
        old: u16,
        new: ForwardedPort,
        notification: NotificationStatus,
    },
}

/// What became of the port change notification after an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    /// No notifier is configured
    Disabled,
    Delivered,
    /// The notifier chose not to send this event
    Skipped,
    /// Delivery failed; logged only
    Failed,
}

/// Reconciles the torrent client's listening port with the port file
pub struct SyncEngine {
    source: PortSource,
    client: Arc<dyn ITorrentClient>,
    notifier: Option<Arc<dyn IPortNotifier>>,
    metrics: Arc<MetricsRegistry>,
    /// Periodic re-check; `None` disables the ticker
    sync_interval: Option<Duration>,
    /// Last port this engine applied
    last_port: Option<ForwardedPort>,
}

impl SyncEngine {
    pub fn new(
        source: PortSource,
        client: Arc<dyn ITorrentClient>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            source,
            client,
            notifier: None,
            metrics,
            sync_interval: None,
            last_port: None,
        }
    }

    /// Notify on every applied port change.
    pub fn with_notifier(mut self, notifier: Arc<dyn IPortNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Re-check on a fixed period in addition to file events.
    ///
    /// `None` or a zero duration disables the periodic check.
    pub fn with_sync_interval(mut self, interval: Option<Duration>) -> Self {
        self.sync_interval = interval.filter(|period| !period.is_zero());
        self
    }

    /// Last port applied by this engine, if any.
    pub fn last_port(&self) -> Option<ForwardedPort> {
        self.last_port
    }

    // ========================================================================
    // Single pass
    // ========================================================================

    /// Run one reconciliation pass.
    ///
    /// A failed `set_port` increments the error counter and leaves
    /// `last_port`, the port gauge and the notifier untouched.
    pub async fn reconcile_once(&mut self) -> Result<ReconcileOutcome, SyncError> {
        let wanted = self.source.read().await?;
        let current = self.client.get_port().await.map_err(SyncError::GetPort)?;

        if wanted == current {
            debug!(port = %wanted, "Torrent client port already in sync");
            return Ok(ReconcileOutcome::InSync(wanted));
        }

        info!(
            old_port = current,
            new_port = %wanted,
            "Port mismatch detected, updating torrent client"
        );

        if let Err(e) = self.client.set_port(wanted).await {
            self.metrics.record_sync_error();
            return Err(SyncError::SetPort(e));
        }

        self.last_port = Some(wanted);
        self.metrics.set_current_port(wanted.get());
        self.metrics.record_sync_success();
        info!(old_port = current, new_port = %wanted, "Port updated");

        let notification = match &self.notifier {
            None => NotificationStatus::Disabled,
            Some(notifier) => match notifier.notify_port_changed(current, wanted).await {
                Ok(NotifyOutcome::Delivered) => {
                    debug!(old_port = current, new_port = %wanted, "Port change notified");
                    NotificationStatus::Delivered
                }
                Ok(NotifyOutcome::Skipped) => {
                    debug!(
                        old_port = current,
                        new_port = %wanted,
                        "Port change notification skipped, event not subscribed"
                    );
                    NotificationStatus::Skipped
                }
                Err(e) => {
                    warn!(
                        old_port = current,
                        new_port = %wanted,
                        error = %format!("{e:#}"),
                        "Failed to send port change notification"
                    );
                    NotificationStatus::Failed
                }
            },
        };

        Ok(ReconcileOutcome::Updated {
            old: current,
            new: wanted,
            notification,
        })
    }

    /// Reconcile and log the result; errors never leave this function.
    async fn reconcile_logged(&mut self, trigger: &'static str) {
        match self.reconcile_once().await {
            Ok(ReconcileOutcome::InSync(_)) => {}
            Ok(ReconcileOutcome::Updated { .. }) => debug!(trigger, "Reconciliation applied"),
            Err(e) => error!(trigger, error = %e, "Port sync failed"),
        }
    }

    // ========================================================================
    // Event loop
    // ========================================================================

    /// Reconcile at start, then on every trigger until a watcher channel
    /// closes.
    ///
    /// Only channel closure ends the loop; reconciliation errors are logged
    /// and the loop keeps going. Closure is always reported as an error, so
    /// callers that closed the channels on purpose should treat it as a
    /// clean stop.
    pub async fn run(&mut self, streams: WatchStreams) -> Result<(), SyncError> {
        let WatchStreams {
            mut events,
            mut errors,
        } = streams;
        let file_name: OsString = self
            .source
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();

        let mut ticker = self.sync_interval.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        info!(
            port_file = %self.source.path().display(),
            sync_interval_secs = self.sync_interval.map(|d| d.as_secs()),
            "Sync engine started"
        );

        self.reconcile_logged("startup").await;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        return Err(SyncError::ChannelClosed("event"));
                    };
                    if is_port_file_update(&event, &file_name) {
                        debug!(?event, "Port file changed");
                        self.reconcile_logged("file_change").await;
                    }
                }
                err = errors.recv() => {
                    let Some(err) = err else {
                        return Err(SyncError::ChannelClosed("error"));
                    };
                    error!(error = %err, "File watcher error");
                }
                _ = next_tick(&mut ticker) => {
                    debug!("Periodic sync triggered");
                    self.reconcile_logged("interval").await;
                }
            }
        }
    }
}

/// Wait for the next tick, or forever when the ticker is disabled.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
