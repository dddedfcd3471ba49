//! Forwardarr Sync - Keeps the torrent client's listening port in line with
//! the VPN's forwarded port
//!
//! Provides:
//! - Exponential backoff for the startup connection window
//! - Reading the port file published by the VPN container
//! - Watching that file for replacement or rewrite
//! - The reconciliation loop driven by file events and a periodic ticker
//!
//! ## Modules
//!
//! - [`backoff`] - Pure delay and attempt-count arithmetic
//! - [`startup`] - Deadline-bounded connection retry
//! - [`source`] - Port file reader
//! - [`watcher`] - `notify` wrapper that reports port file events
//! - [`engine`] - Reconciliation engine

pub mod backoff;
pub mod engine;
pub mod source;
pub mod startup;
pub mod watcher;

use std::path::PathBuf;

use thiserror::Error;

pub use engine::{NotificationStatus, ReconcileOutcome, SyncEngine};
pub use source::{PortFileError, PortSource};
pub use startup::{connect_with_retry, StartupError, StartupSettings};
pub use watcher::{ChangeEvent, PortFileWatcher, WatchStreams};

/// Errors that can occur while reconciling or watching
#[derive(Debug, Error)]
pub enum SyncError {
    /// The port file could not be read or did not hold a valid port
    #[error(transparent)]
    Source(#[from] PortFileError),

    /// Querying the torrent client's current port failed
    #[error("failed to get torrent client port: {0:#}")]
    GetPort(#[source] anyhow::Error),

    /// Writing the new port to the torrent client failed
    #[error("failed to set torrent client port: {0:#}")]
    SetPort(#[source] anyhow::Error),

    /// The OS watcher could not be created or attached
    #[error("failed to watch {}: {source}", .path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// A watcher channel closed while the engine was still running
    #[error("file watcher {0} channel closed")]
    ChannelClosed(&'static str),
}
