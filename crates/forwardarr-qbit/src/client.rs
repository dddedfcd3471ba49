//! qBittorrent WebUI session client
//!
//! [`SessionClient`] owns a cookie-based session against the WebUI API.
//! Authentication is modelled as a two-state machine:
//!
//! ```text
//!                 login() ok
//!   Unauthenticated ─────────→ Authenticated
//!         ↑                          │
//!         └──────── 403 Forbidden ───┘
//! ```
//!
//! Every API call that comes back `403` moves the session to
//! `Unauthenticated` and logs in again straight away. A successful re-login
//! re-issues the original request exactly once; a failed re-login fails the
//! call. On top of that, [`get_port`](SessionClient::get_port) and
//! [`set_port`](SessionClient::set_port) run inside a small bounded retry
//! loop with a fixed delay to ride out transient network errors.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use forwardarr_qbit::client::SessionClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client =
//!     SessionClient::connect("http://localhost:8080", "admin", "adminadmin", Duration::from_secs(10))
//!         .await?;
//! println!("listening on {}", client.get_port().await?);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use forwardarr_core::domain::ForwardedPort;
use forwardarr_core::ports::ITorrentClient;
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::SessionError;

const LOGIN_PATH: &str = "/api/v2/auth/login";
const PREFERENCES_PATH: &str = "/api/v2/app/preferences";
const SET_PREFERENCES_PATH: &str = "/api/v2/app/setPreferences";
const VERSION_PATH: &str = "/api/v2/app/version";

/// Body the login endpoint returns on success
const LOGIN_OK_BODY: &str = "Ok.";

/// Default number of attempts for get/set port
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between attempts
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

// ============================================================================
// Wire types
// ============================================================================

/// Subset of `GET /api/v2/app/preferences`
#[derive(Debug, Deserialize)]
struct Preferences {
    listen_port: i64,
}

/// Payload for the `json` form field of `setPreferences`
#[derive(Debug, Serialize)]
struct PreferencesUpdate {
    listen_port: u16,
}

// ============================================================================
// Session state
// ============================================================================

/// Authentication state of a [`SessionClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The last login succeeded and no request has been rejected since
    Authenticated,
    /// No valid session: never logged in, rejected with 403, or re-login failed
    Unauthenticated,
}

/// Bounded retry applied to get/set port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one (at least 1)
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

// ============================================================================
// SessionClient
// ============================================================================

/// Authenticated client for the qBittorrent WebUI API
///
/// The session cookie lives in `reqwest`'s cookie store, which is internally
/// synchronised, so a re-login never corrupts a request that is already in
/// flight on another task.
pub struct SessionClient {
    /// HTTP client with cookie store and per-request timeout
    http: Client,
    /// Base URL without trailing slash
    base_url: String,
    username: String,
    password: String,
    state: Mutex<SessionState>,
    retry: RetryPolicy,
}

impl SessionClient {
    /// Creates an unauthenticated client
    ///
    /// # Arguments
    /// * `base_url` - WebUI root, e.g. `http://localhost:8080`
    /// * `username` / `password` - WebUI credentials
    /// * `request_timeout` - Upper bound for every individual HTTP request
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, SessionError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| SessionError::InvalidBaseUrl(format!("{base_url}: {e}")))?;

        let http = Client::builder()
            .cookie_store(true)
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url,
            username: username.into(),
            password: password.into(),
            state: Mutex::new(SessionState::Unauthenticated),
            retry: RetryPolicy::default(),
        })
    }

    /// Creates a client and performs the initial login
    pub async fn connect(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, SessionError> {
        let client = Self::new(base_url, username, password, request_timeout)?;
        client.login().await?;
        Ok(client)
    }

    /// Replaces the bounded retry policy used by get/set port
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = RetryPolicy {
            max_attempts: policy.max_attempts.max(1),
            delay: policy.delay,
        };
        self
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the current authentication state
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: SessionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ========================================================================
    // Public operations
    // ========================================================================

    /// Posts the credentials and stores the session cookie
    ///
    /// Success means status 200 with the exact body `Ok.`. Never retried
    /// here; the startup loop decides whether to try again.
    pub async fn login(&self) -> Result<(), SessionError> {
        let response = self
            .http
            .post(self.url(LOGIN_PATH))
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                self.set_state(SessionState::Unauthenticated);
                SessionError::Network(e)
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status != StatusCode::OK || body != LOGIN_OK_BODY {
            self.set_state(SessionState::Unauthenticated);
            warn!(status = status.as_u16(), body = %body, "Login to torrent client rejected");
            return Err(SessionError::LoginRejected {
                status: status.as_u16(),
                body,
            });
        }

        self.set_state(SessionState::Authenticated);
        debug!(base_url = %self.base_url, "Authenticated with torrent client");
        Ok(())
    }

    /// Returns the client's configured listening port
    pub async fn get_port(&self) -> Result<u16, SessionError> {
        self.with_retry("get_port", move || {
            self.authorized("get_port", move || self.fetch_listen_port())
        })
        .await
    }

    /// Sets the client's listening port
    pub async fn set_port(&self, port: ForwardedPort) -> Result<(), SessionError> {
        self.with_retry("set_port", move || {
            self.authorized("set_port", move || self.write_listen_port(port))
        })
        .await?;

        info!(port = port.get(), "Updated torrent client listening port");
        Ok(())
    }

    /// Liveness check against the version endpoint
    ///
    /// A 403 re-authenticates and re-issues the request once, exactly like
    /// get/set port; it has no outer retry loop.
    pub async fn ping(&self) -> Result<(), SessionError> {
        self.authorized("ping", move || self.request_version()).await
    }

    // ========================================================================
    // Session and retry plumbing
    // ========================================================================

    /// Runs `call`, and on a 403 logs in again and runs it one more time
    async fn authorized<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T, SessionError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, SessionError>>,
    {
        match call().await {
            Err(SessionError::Forbidden) => {
                self.set_state(SessionState::Unauthenticated);
                warn!(operation, "Received 403, re-authenticating");

                if let Err(err) = self.login().await {
                    warn!(operation, error = %err, "Re-authentication failed");
                    return Err(SessionError::ReauthFailed(Box::new(err)));
                }

                info!(operation, "Re-authenticated with torrent client");
                call().await
            }
            other => other,
        }
    }

    /// Runs `call` up to `max_attempts` times with a fixed delay in between
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T, SessionError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, SessionError>>,
    {
        let max_attempts = self.retry.max_attempts;
        let mut attempt = 1;

        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation, attempt, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if attempt < max_attempts => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        retry_delay_ms = self.retry.delay.as_millis() as u64,
                        error = %err,
                        "Torrent client request failed, retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(SessionError::RetriesExhausted {
                        operation,
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
            }
        }
    }

    // ========================================================================
    // Single requests
    // ========================================================================

    async fn fetch_listen_port(&self) -> Result<u16, SessionError> {
        let response = self.http.get(self.url(PREFERENCES_PATH)).send().await?;

        match response.status() {
            StatusCode::FORBIDDEN => Err(SessionError::Forbidden),
            StatusCode::OK => {
                let prefs: Preferences = response
                    .json()
                    .await
                    .map_err(|e| SessionError::Decode(e.to_string()))?;
                u16::try_from(prefs.listen_port).map_err(|_| {
                    SessionError::Decode(format!("listen_port out of range: {}", prefs.listen_port))
                })
            }
            status => Err(unexpected_status(status, response).await),
        }
    }

    async fn write_listen_port(&self, port: ForwardedPort) -> Result<(), SessionError> {
        let payload = serde_json::to_string(&PreferencesUpdate {
            listen_port: port.get(),
        })
        .map_err(|e| SessionError::Decode(e.to_string()))?;

        let response = self
            .http
            .post(self.url(SET_PREFERENCES_PATH))
            .form(&[("json", payload)])
            .send()
            .await?;

        match response.status() {
            StatusCode::FORBIDDEN => Err(SessionError::Forbidden),
            StatusCode::OK => {
                // A body that cannot be read counts as a failed write.
                response.bytes().await?;
                Ok(())
            }
            status => Err(unexpected_status(status, response).await),
        }
    }

    async fn request_version(&self) -> Result<(), SessionError> {
        let response = self.http.get(self.url(VERSION_PATH)).send().await?;

        match response.status() {
            StatusCode::FORBIDDEN => Err(SessionError::Forbidden),
            StatusCode::OK => Ok(()),
            status => Err(unexpected_status(status, response).await),
        }
    }
}

async fn unexpected_status(status: StatusCode, response: Response) -> SessionError {
    SessionError::UnexpectedStatus {
        status: status.as_u16(),
        body: response.text().await.unwrap_or_default(),
    }
}

// ============================================================================
// ITorrentClient adapter
// ============================================================================

#[async_trait::async_trait]
impl ITorrentClient for SessionClient {
    async fn get_port(&self) -> anyhow::Result<u16> {
        Ok(SessionClient::get_port(self).await?)
    }

    async fn set_port(&self, port: ForwardedPort) -> anyhow::Result<()> {
        Ok(SessionClient::set_port(self, port).await?)
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(SessionClient::ping(self).await?)
    }
}
