//! get_port / set_port: re-authentication and bounded retry

use forwardarr_core::domain::ForwardedPort;
use forwardarr_qbit::{SessionError, SessionState};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_get_port_returns_listen_port() {
    let (server, client) = common::setup_session_mock().await;
    common::mount_preferences(&server, 51413).await;

    assert_eq!(client.get_port().await.unwrap(), 51413);
}

#[tokio::test]
async fn test_get_port_reauthenticates_once_on_403() {
    let server = wiremock::MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(common::LOGIN))
        .respond_with(ResponseTemplate::new(200).set_body_string("Ok."))
        .expect(2) // initial login + one re-login
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(common::PREFERENCES))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    common::mount_preferences(&server, 40000).await;

    let client = forwardarr_qbit::SessionClient::connect(
        server.uri(),
        "admin",
        "adminadmin",
        std::time::Duration::from_secs(5),
    )
    .await
    .unwrap()
    .with_retry_policy(common::fast_retry(1));

    // A single attempt is enough: the 403 is absorbed by the re-login.
    assert_eq!(client.get_port().await.unwrap(), 40000);
    assert_eq!(client.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn test_get_port_reauth_failure_is_reported() {
    let server = wiremock::MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(common::LOGIN))
        .respond_with(ResponseTemplate::new(200).set_body_string("Ok."))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(common::LOGIN))
        .respond_with(ResponseTemplate::new(200).set_body_string("Fails."))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(common::PREFERENCES))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = forwardarr_qbit::SessionClient::connect(
        server.uri(),
        "admin",
        "adminadmin",
        std::time::Duration::from_secs(5),
    )
    .await
    .unwrap()
    .with_retry_policy(common::fast_retry(1));

    let err = client.get_port().await.unwrap_err();
    match err {
        SessionError::RetriesExhausted { source, attempts, .. } => {
            assert_eq!(attempts, 1);
            assert!(matches!(*source, SessionError::ReauthFailed(_)));
        }
        other => panic!("expected RetriesExhausted, got {other}"),
    }
    assert_eq!(client.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_get_port_retries_transient_errors() {
    let (server, client) = common::setup_session_mock().await;

    Mock::given(method("GET"))
        .and(path(common::PREFERENCES))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    common::mount_preferences(&server, 12345).await;

    assert_eq!(client.get_port().await.unwrap(), 12345);
}

#[tokio::test]
async fn test_get_port_exhausts_attempts() {
    let (server, client) = common::setup_session_mock().await;

    Mock::given(method("GET"))
        .and(path(common::PREFERENCES))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client.get_port().await.unwrap_err();
    match err {
        SessionError::RetriesExhausted {
            operation,
            attempts,
            source,
        } => {
            assert_eq!(operation, "get_port");
            assert_eq!(attempts, 3);
            assert!(matches!(
                *source,
                SessionError::UnexpectedStatus { status: 500, .. }
            ));
        }
        other => panic!("expected RetriesExhausted, got {other}"),
    }
}

#[tokio::test]
async fn test_get_port_malformed_body_is_decode_error() {
    let (server, client) = common::setup_session_mock().await;
    Mock::given(method("GET"))
        .and(path(common::PREFERENCES))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client.get_port().await.unwrap_err();
    match err {
        SessionError::RetriesExhausted { source, .. } => {
            assert!(matches!(*source, SessionError::Decode(_)));
        }
        other => panic!("expected RetriesExhausted, got {other}"),
    }
}

#[tokio::test]
async fn test_set_port_posts_json_form_field() {
    let (server, client) = common::setup_session_mock().await;

    Mock::given(method("POST"))
        .and(path(common::SET_PREFERENCES))
        .and(body_string_contains("json="))
        .and(body_string_contains("listen_port%22%3A51413"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client
        .set_port(ForwardedPort::new(51413).unwrap())
        .await
        .expect("set_port failed");
}

#[tokio::test]
async fn test_set_port_reauthenticates_once_on_403() {
    let server = wiremock::MockServer::start().await;
    common::mount_login_ok_times(&server, 2).await; // initial login + one re-login

    Mock::given(method("POST"))
        .and(path(common::SET_PREFERENCES))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(common::SET_PREFERENCES))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::connect(&server)
        .await
        .with_retry_policy(common::fast_retry(1));

    // A single attempt is enough: the 403 is absorbed by the re-login.
    client
        .set_port(ForwardedPort::new(6881).unwrap())
        .await
        .expect("set_port should succeed after re-login");
    assert_eq!(client.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn test_set_port_non_200_fails_every_attempt() {
    let (server, client) = common::setup_session_mock().await;

    Mock::given(method("POST"))
        .and(path(common::SET_PREFERENCES))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client
        .set_port(ForwardedPort::new(6881).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::RetriesExhausted {
            operation: "set_port",
            attempts: 3,
            ..
        }
    ));
}
