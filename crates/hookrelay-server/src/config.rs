//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Max wait per delivery write, in seconds.
    pub write_timeout_secs: u64,
    /// Consecutive failed writes before a client is forcefully disconnected.
    pub tolerance: u32,
    /// Seconds between keepalive pings.
    pub ping_interval_secs: u64,
    /// Global cap on concurrent subscriptions.
    pub max_subscriptions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 4000,
            write_timeout_secs: 10,
            tolerance: 3,
            ping_interval_secs: 30,
            max_subscriptions: 500,
        }
    }
}

impl ServerConfig {
    /// The per-write delivery timeout.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// The keepalive ping interval.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// The `host:port` string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Apply `HOOKRELAY_*` environment variable overrides.
///
/// Each variable has strict parsing rules; invalid values are logged and
/// ignored, falling back to whatever the config already holds.
pub fn apply_env_overrides(config: &mut ServerConfig) {
    if let Some(v) = read_env_string("HOOKRELAY_HOST") {
        config.host = v;
    }
    if let Some(v) = read_env_u16("HOOKRELAY_PORT", 1, 65535) {
        config.port = v;
    }
    if let Some(v) = read_env_u64("HOOKRELAY_WRITE_TIMEOUT_SECS", 1, 300) {
        config.write_timeout_secs = v;
    }
    if let Some(v) = read_env_u32("HOOKRELAY_TOLERANCE", 1, 100) {
        config.tolerance = v;
    }
    if let Some(v) = read_env_u64("HOOKRELAY_PING_INTERVAL_SECS", 1, 3600) {
        config.ping_interval_secs = v;
    }
    if let Some(v) = read_env_usize("HOOKRELAY_MAX_SUBSCRIPTIONS", 1, 100_000) {
        config.max_subscriptions = v;
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u32(name: &str, min: u32, max: u32) -> Option<u32> {
    let val = std::env::var(name).ok()?;
    let result = parse_u32_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u32 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}
