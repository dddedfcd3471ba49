//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the sync engine depends on; their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ITorrentClient`] - Listening-port read/write and liveness of the torrent client
//! - [`IPortNotifier`] - Outbound "port changed" notifications

pub mod notification;
pub mod torrent_client;

pub use notification::{IPortNotifier, NotifyOutcome, PORT_CHANGED_EVENT};
pub use torrent_client::ITorrentClient;
