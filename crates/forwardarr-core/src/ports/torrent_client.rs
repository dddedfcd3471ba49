//! Torrent client port (driven/secondary port)
//!
//! The sync engine only needs three things from a torrent client: read the
//! listening port, write it, and answer whether the client is reachable.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific.
//! - Implementations own their session handling; a caller never sees an
//!   authorization failure that the adapter was able to recover from.

use crate::domain::ForwardedPort;

/// Port trait for the torrent client's control API
#[async_trait::async_trait]
pub trait ITorrentClient: Send + Sync {
    /// Returns the listening port currently configured in the client
    ///
    /// The raw value is returned as-is; a client may report `0` when it
    /// picks a random port itself.
    async fn get_port(&self) -> anyhow::Result<u16>;

    /// Sets the client's listening port
    async fn set_port(&self, port: ForwardedPort) -> anyhow::Result<()>;

    /// Lightweight liveness check used by the readiness endpoint
    async fn ping(&self) -> anyhow::Result<()>;
}
