//! Login and session-cookie behaviour

use std::time::Duration;

use forwardarr_qbit::{SessionClient, SessionError, SessionState};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_connect_success_authenticates() {
    let (_server, client) = common::setup_session_mock().await;
    assert_eq!(client.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn test_connect_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(common::LOGIN))
        .respond_with(ResponseTemplate::new(200).set_body_string("Fails."))
        .mount(&server)
        .await;

    let result =
        SessionClient::connect(server.uri(), "admin", "wrong", Duration::from_secs(5)).await;

    match result {
        Err(SessionError::LoginRejected { status, body }) => {
            assert_eq!(status, 200);
            assert_eq!(body, "Fails.");
        }
        Err(other) => panic!("expected LoginRejected, got {other}"),
        Ok(_) => panic!("expected login to fail"),
    }
}

#[tokio::test]
async fn test_login_requires_status_200() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(common::LOGIN))
        .respond_with(ResponseTemplate::new(403).set_body_string("Ok."))
        .mount(&server)
        .await;

    let client =
        SessionClient::new(server.uri(), "admin", "adminadmin", Duration::from_secs(5)).unwrap();
    let err = client.login().await.unwrap_err();

    assert!(matches!(err, SessionError::LoginRejected { status: 403, .. }));
    assert_eq!(client.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_login_unreachable_server() {
    // Nothing listens on the discard port of localhost in test environments.
    let client =
        SessionClient::new("http://127.0.0.1:9", "admin", "adminadmin", Duration::from_secs(2))
            .unwrap();
    let err = client.login().await.unwrap_err();
    assert!(matches!(err, SessionError::Network(_)));
}

#[tokio::test]
async fn test_session_cookie_sent_after_login() {
    let (server, client) = common::setup_session_mock().await;

    Mock::given(method("GET"))
        .and(path(common::PREFERENCES))
        .and(header("cookie", "SID=test-session"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "listen_port": 6881 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(client.get_port().await.unwrap(), 6881);
}
