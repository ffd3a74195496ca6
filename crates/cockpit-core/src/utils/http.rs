//! HTTP client construction.

use std::time::Duration;

use reqwest::Client;

/// Default timeout for catalog and project lookups.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Create HTTP client with the given overall timeout.
pub fn create_client(timeout_secs: u64) -> Result<Client, String> {
    base_builder(timeout_secs).build().map_err(|e| format!("HTTP client builder failed: {e}"))
}

/// Shared builder with keepalive settings.
fn base_builder(timeout_secs: u64) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .tcp_nodelay(true)
        .http2_keep_alive_interval(Duration::from_secs(25))
        .http2_keep_alive_timeout(Duration::from_secs(10))
        .http2_keep_alive_while_idle(true)
}
