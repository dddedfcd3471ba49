//! Notification port (driven/secondary port)
//!
//! Notifications are best-effort: the engine logs a failed delivery and
//! moves on. Nothing an implementation returns can undo a port update that
//! has already been applied.

use crate::domain::ForwardedPort;

/// Event name carried by port change notifications
pub const PORT_CHANGED_EVENT: &str = "port_changed";

/// What happened to a notification that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// The destination accepted the notification
    Delivered,
    /// Nothing was sent because the destination does not want this event
    Skipped,
}

/// Port trait for announcing listening-port changes to the outside world
#[async_trait::async_trait]
pub trait IPortNotifier: Send + Sync {
    /// Announces that the torrent client moved from `old_port` to `new_port`
    ///
    /// Implementations make a single, time-bounded delivery attempt, or
    /// return [`NotifyOutcome::Skipped`] without sending anything.
    async fn notify_port_changed(
        &self,
        old_port: u16,
        new_port: ForwardedPort,
    ) -> anyhow::Result<NotifyOutcome>;
}
