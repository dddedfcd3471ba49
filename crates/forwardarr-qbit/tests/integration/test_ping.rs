//! Readiness check

use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_ping_ok() {
    let (server, client) = common::setup_session_mock().await;
    Mock::given(method("GET"))
        .and(path(common::VERSION))
        .respond_with(ResponseTemplate::new(200).set_body_string("v4.6.2"))
        .mount(&server)
        .await;

    client.ping().await.expect("ping failed");
}

#[tokio::test]
async fn test_ping_reissues_version_request_after_reauth() {
    let (server, client) = common::setup_session_mock().await;

    Mock::given(method("GET"))
        .and(path(common::VERSION))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(common::VERSION))
        .respond_with(ResponseTemplate::new(200).set_body_string("v4.6.2"))
        .expect(1)
        .mount(&server)
        .await;

    client.ping().await.expect("ping should succeed after re-login");
}

#[tokio::test]
async fn test_ping_still_forbidden_after_reauth_fails() {
    let (server, client) = common::setup_session_mock().await;

    Mock::given(method("GET"))
        .and(path(common::VERSION))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&server)
        .await;

    assert!(client.ping().await.is_err());
}

#[tokio::test]
async fn test_ping_server_error() {
    let (server, client) = common::setup_session_mock().await;
    Mock::given(method("GET"))
        .and(path(common::VERSION))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(client.ping().await.is_err());
}
