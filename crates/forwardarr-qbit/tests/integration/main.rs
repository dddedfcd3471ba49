//! Integration tests for forwardarr-qbit
//!
//! Uses wiremock to simulate the qBittorrent WebUI and verifies login,
//! transparent re-authentication and the bounded retry loop.

mod common;

mod test_login;
mod test_ping;
mod test_preferences;
