//! Deadline-bounded connection retry used while the torrent client boots
//!
//! The VPN sidecar and the torrent client usually start together, so the
//! first few connection attempts are expected to fail. [`connect_with_retry`]
//! keeps trying inside a fixed window, sleeping according to
//! [`exponential_backoff_delay`] between attempts.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::backoff::{exponential_backoff_delay, max_attempts};

/// Startup retry window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupSettings {
    /// Delay after the first failed attempt; doubles afterwards
    pub retry_delay: Duration,
    /// Total time allowed for connecting
    pub timeout: Duration,
}

impl StartupSettings {
    /// Attempts that fit in the window, for logging.
    pub fn max_attempts(&self) -> u32 {
        max_attempts(self.retry_delay, self.timeout)
    }
}

/// Failure to connect within the startup window
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to connect after {attempts} attempts in {elapsed:?} (timeout {timeout:?})")]
    Timeout {
        attempts: u32,
        elapsed: Duration,
        timeout: Duration,
        #[source]
        last_error: anyhow::Error,
    },
}

/// Call `connect` until it succeeds or the window in `settings` runs out.
///
/// At least one attempt is always made, and no attempt starts at or after
/// the deadline. `endpoint` is only used for logging.
pub async fn connect_with_retry<T, E, F, Fut>(
    settings: StartupSettings,
    endpoint: &str,
    mut connect: F,
) -> Result<T, StartupError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<anyhow::Error>,
{
    let max_attempts = settings.max_attempts();
    let started = Instant::now();
    let deadline = started + settings.timeout;
    let mut attempt = 0;

    loop {
        attempt += 1;
        info!(endpoint, attempt, max_attempts, "Connecting to torrent client");

        let err = match connect().await {
            Ok(client) => {
                info!(
                    endpoint,
                    attempt,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Connected to torrent client"
                );
                return Ok(client);
            }
            Err(err) => err.into(),
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        let sleep = exponential_backoff_delay(attempt, settings.retry_delay, remaining);
        warn!(
            endpoint,
            attempt,
            max_attempts,
            retry_delay_ms = sleep.as_millis() as u64,
            remaining_ms = remaining.as_millis() as u64,
            error = %format!("{err:#}"),
            "Torrent client not ready"
        );

        if !sleep.is_zero() {
            tokio::time::sleep(sleep).await;
        }
        if sleep.is_zero() || Instant::now() >= deadline {
            return Err(StartupError::Timeout {
                attempts: attempt,
                elapsed: started.elapsed(),
                timeout: settings.timeout,
                last_error: err,
            });
        }
    }
}
