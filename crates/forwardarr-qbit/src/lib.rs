//! Forwardarr qBit - qBittorrent WebUI client
//!
//! Provides an async, cookie-authenticated client for the small slice of
//! the qBittorrent WebUI API that Forwardarr needs:
//! - Login with username/password
//! - Reading and writing the `listen_port` preference
//! - A version check used for readiness checks
//!
//! ## Modules
//!
//! - [`client`] - [`SessionClient`](client::SessionClient) and its session state machine

pub mod client;

pub use client::{RetryPolicy, SessionClient, SessionState};

use thiserror::Error;

/// Errors that can occur when talking to the qBittorrent WebUI
#[derive(Debug, Error)]
pub enum SessionError {
    /// The base URL could not be parsed
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// The login endpoint did not answer `200 Ok.`
    #[error("Login failed: status {status}, body: {body}")]
    LoginRejected {
        /// HTTP status returned by the login endpoint
        status: u16,
        /// Response body, usually `Fails.`
        body: String,
    },

    /// The session cookie is no longer accepted (HTTP 403)
    #[error("Session rejected by torrent client (403 Forbidden)")]
    Forbidden,

    /// A 403 triggered a re-login, and the re-login failed
    #[error("Re-authentication failed: {0}")]
    ReauthFailed(#[source] Box<SessionError>),

    /// Any status other than the one the endpoint promises on success
    #[error("Unexpected status code: {status}, body: {body}")]
    UnexpectedStatus {
        /// HTTP status returned
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// The preferences document could not be decoded
    #[error("Failed to decode preferences: {0}")]
    Decode(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Every attempt of the bounded retry loop failed
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Name of the operation, e.g. `get_port`
        operation: &'static str,
        /// Number of attempts made
        attempts: u32,
        /// Error from the final attempt
        #[source]
        source: Box<SessionError>,
    },
}
