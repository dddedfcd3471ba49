//! Forwardarr Webhook - Port change notifications over HTTP
//!
//! [`WebhookClient`] posts a small JSON document to a configured URL every
//! time the forwarded port is applied to the torrent client:
//!
//! ```json
//! {
//!   "event": "port_changed",
//!   "timestamp": "2024-05-01T12:00:00Z",
//!   "old_port": 6881,
//!   "new_port": 51413,
//!   "message": "Port changed from 6881 to 51413"
//! }
//! ```
//!
//! Delivery is a single attempt bounded by the configured timeout. Any 2xx
//! response counts as delivered.

pub mod client;

use thiserror::Error;

pub use client::{WebhookClient, WebhookPayload};

/// Errors that can occur delivering a webhook
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The configured URL is not a valid absolute URL
    #[error("invalid webhook URL: {0}")]
    InvalidUrl(String),

    /// Transport failure, including timeouts
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status
    #[error("webhook returned status {status}")]
    Status { status: u16 },
}
