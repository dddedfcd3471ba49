//! Webhook delivery against a mock endpoint

use std::time::Duration;

use forwardarr_core::domain::ForwardedPort;
use forwardarr_core::ports::{IPortNotifier, NotifyOutcome};
use forwardarr_webhook::{WebhookClient, WebhookError, WebhookPayload};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, timeout: Duration, events: &[&str]) -> WebhookClient {
    WebhookClient::new(
        &format!("{}/hook", server.uri()),
        timeout,
        events.iter().map(|e| e.to_string()).collect(),
    )
    .unwrap()
}

fn port(p: i64) -> ForwardedPort {
    ForwardedPort::new(p).unwrap()
}

#[tokio::test]
async fn test_delivers_port_changed_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(serde_json::json!({
            "event": "port_changed",
            "old_port": 6881,
            "new_port": 51413,
            "message": "Port changed from 6881 to 51413"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, Duration::from_secs(5), &["port_changed"]);
    let outcome = client.notify_port_changed(6881, port(51413)).await.unwrap();
    assert_eq!(outcome, NotifyOutcome::Delivered);
}

#[tokio::test]
async fn test_sends_user_agent() {
    let server = MockServer::start().await;
    let ua = format!("Forwardarr-Webhook/{}", env!("CARGO_PKG_VERSION"));
    Mock::given(method("POST"))
        .and(header("user-agent", ua.as_str()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, Duration::from_secs(5), &[]);
    let outcome = client
        .send(&WebhookPayload::port_changed(1, port(2)))
        .await
        .unwrap();
    assert_eq!(outcome, NotifyOutcome::Delivered);
}

#[tokio::test]
async fn test_non_2xx_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, Duration::from_secs(5), &["port_changed"]);
    let err = client
        .send(&WebhookPayload::port_changed(1, port(2)))
        .await
        .unwrap_err();
    assert!(matches!(err, WebhookError::Status { status: 500 }));
}

#[tokio::test]
async fn test_single_attempt_on_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, Duration::from_secs(5), &["port_changed"]);
    assert!(client.notify_port_changed(1, port(2)).await.is_err());
}

#[tokio::test]
async fn test_timeout_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client = client(&server, Duration::from_millis(100), &["port_changed"]);
    let err = client
        .send(&WebhookPayload::port_changed(1, port(2)))
        .await
        .unwrap_err();
    match err {
        WebhookError::Request(e) => assert!(e.is_timeout()),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unsubscribed_event_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server, Duration::from_secs(5), &["sync_failed"]);
    let outcome = client.notify_port_changed(1, port(2)).await.unwrap();
    assert_eq!(outcome, NotifyOutcome::Skipped);
}
