//! # hookrelayd
//!
//! Webhook relay server binary — builds the broker, subscription registry,
//! and HTTP server from config, then serves until a shutdown signal.

#![deny(unsafe_code)]

mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use hookrelay_server::config::{self, ServerConfig};
use hookrelay_server::{shutdown, RelayServer};

/// Webhook relay server.
#[derive(Parser, Debug)]
#[command(name = "hookrelayd", about = "Webhook relay server")]
struct Cli {
    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Max wait per delivery write, in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Consecutive failed writes before a client is forcefully disconnected.
    #[arg(long)]
    tolerance: Option<u32>,

    /// Seconds between keepalive pings.
    #[arg(long)]
    ping_interval_secs: Option<u64>,

    /// Global cap on concurrent subscriptions.
    #[arg(long)]
    max_subscriptions: Option<usize>,

    /// Minimum log level (overridden by `RUST_LOG`).
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    /// Layer explicit flags over the (env-overridden) config.
    fn apply(&self, cfg: &mut ServerConfig) {
        if let Some(host) = &self.host {
            cfg.host = host.clone();
        }
        if let Some(port) = self.port {
            cfg.port = port;
        }
        if let Some(secs) = self.timeout_secs {
            cfg.write_timeout_secs = secs;
        }
        if let Some(tolerance) = self.tolerance {
            cfg.tolerance = tolerance;
        }
        if let Some(secs) = self.ping_interval_secs {
            cfg.ping_interval_secs = secs;
        }
        if let Some(max) = self.max_subscriptions {
            cfg.max_subscriptions = max;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_subscriber(&cli.log_level);

    let mut cfg = ServerConfig::default();
    config::apply_env_overrides(&mut cfg);
    cli.apply(&mut cfg);

    let listener = TcpListener::bind(cfg.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr()))?;

    let server = RelayServer::new(cfg);
    let token = CancellationToken::new();
    let _signals = tokio::spawn(shutdown::watch_signals(token.clone()));

    server.serve(listener, token).await.context("server error")?;
    Ok(())
}
