//! Integration tests for forwardarr-webhook using wiremock

mod test_delivery;
