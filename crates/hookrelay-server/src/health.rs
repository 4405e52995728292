//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Currently connected streaming clients.
    pub clients: usize,
    /// Live subscriptions across all channels.
    pub subscriptions: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, clients: usize, subscriptions: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        clients,
        subscriptions,
    }
}
