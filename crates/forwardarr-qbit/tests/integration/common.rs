//! Shared test helpers for WebUI integration tests
//!
//! Each helper mounts the mock endpoints a test needs. Mocks mounted first
//! take precedence, so `up_to_n_times(1)` mocks are used to script a
//! response that changes after the first call.

use std::time::Duration;

use forwardarr_qbit::{RetryPolicy, SessionClient};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LOGIN: &str = "/api/v2/auth/login";
pub const PREFERENCES: &str = "/api/v2/app/preferences";
pub const SET_PREFERENCES: &str = "/api/v2/app/setPreferences";
pub const VERSION: &str = "/api/v2/app/version";

/// Retry policy that keeps tests fast
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        delay: Duration::from_millis(10),
    }
}

/// Mounts a login endpoint that accepts `admin`/`adminadmin` and sets a cookie
pub async fn mount_login_ok(server: &MockServer) {
    login_ok().mount(server).await;
}

/// Like [`mount_login_ok`], but verifies the number of logins on drop
pub async fn mount_login_ok_times(server: &MockServer, times: u64) {
    login_ok().expect(times).mount(server).await;
}

fn login_ok() -> Mock {
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .and(body_string_contains("username=admin"))
        .and(body_string_contains("password=adminadmin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("Ok.")
                .append_header("set-cookie", "SID=test-session; path=/"),
        )
}

/// Mounts `GET /preferences` returning the given listen port
pub async fn mount_preferences(server: &MockServer, listen_port: i64) {
    Mock::given(method("GET"))
        .and(path(PREFERENCES))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "listen_port": listen_port,
            "upnp": false,
            "random_port": false
        })))
        .mount(server)
        .await;
}

/// Starts a mock server with a working login and returns a connected client
pub async fn setup_session_mock() -> (MockServer, SessionClient) {
    let server = MockServer::start().await;
    mount_login_ok(&server).await;
    let client = connect(&server).await;
    (server, client)
}

/// Logs in against `server` with the test credentials and a fast retry policy
pub async fn connect(server: &MockServer) -> SessionClient {
    SessionClient::connect(
        server.uri(),
        "admin",
        "adminadmin",
        Duration::from_secs(5),
    )
    .await
    .expect("initial login failed")
    .with_retry_policy(fast_retry(3))
}
