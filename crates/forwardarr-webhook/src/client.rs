//! HTTP webhook client

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forwardarr_core::domain::ForwardedPort;
use forwardarr_core::ports::{IPortNotifier, NotifyOutcome, PORT_CHANGED_EVENT};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::{debug, info};

use crate::WebhookError;

const USER_AGENT_VALUE: &str = concat!("Forwardarr-Webhook/", env!("CARGO_PKG_VERSION"));

/// JSON body posted to the webhook endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookPayload {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub old_port: u16,
    pub new_port: u16,
    pub message: String,
}

impl WebhookPayload {
    /// Payload announcing a listening port change, stamped now.
    pub fn port_changed(old_port: u16, new_port: ForwardedPort) -> Self {
        Self {
            event: PORT_CHANGED_EVENT.to_string(),
            timestamp: Utc::now(),
            old_port,
            new_port: new_port.get(),
            message: format!("Port changed from {old_port} to {new_port}"),
        }
    }
}

/// Posts [`WebhookPayload`]s to a single URL
pub struct WebhookClient {
    http: Client,
    url: Url,
    /// Event names this endpoint is subscribed to
    events: Vec<String>,
}

impl WebhookClient {
    /// Create a client for `url` with a per-delivery `timeout`.
    ///
    /// An empty `events` list subscribes to every event.
    pub fn new(url: &str, timeout: Duration, events: Vec<String>) -> Result<Self, WebhookError> {
        let url = Url::parse(url).map_err(|e| WebhookError::InvalidUrl(format!("{url}: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { http, url, events })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether deliveries for `event` are sent.
    pub fn is_subscribed(&self, event: &str) -> bool {
        self.events.is_empty() || self.events.iter().any(|e| e == event)
    }

    /// Deliver `payload` once.
    ///
    /// Returns [`NotifyOutcome::Skipped`] without sending anything when the
    /// endpoint is not subscribed to the payload's event.
    pub async fn send(&self, payload: &WebhookPayload) -> Result<NotifyOutcome, WebhookError> {
        if !self.is_subscribed(&payload.event) {
            debug!(event = %payload.event, "Webhook not subscribed to event, skipping");
            return Ok(NotifyOutcome::Skipped);
        }

        let response = self
            .http
            .post(self.url.clone())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebhookError::Status {
                status: status.as_u16(),
            });
        }

        info!(
            event = %payload.event,
            status = status.as_u16(),
            "Webhook delivered"
        );
        Ok(NotifyOutcome::Delivered)
    }
}

#[async_trait]
impl IPortNotifier for WebhookClient {
    async fn notify_port_changed(
        &self,
        old_port: u16,
        new_port: ForwardedPort,
    ) -> anyhow::Result<NotifyOutcome> {
        Ok(self
            .send(&WebhookPayload::port_changed(old_port, new_port))
            .await?)
    }
}
