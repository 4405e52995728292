//! # hookrelay-forward
//!
//! Consumes a relay's SSE stream and re-posts each webhook callback to a
//! local destination, so the callbacks can be exercised against a service
//! that has no public endpoint.

#![deny(unsafe_code)]

mod relay;
mod sse;

use std::pin::pin;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use futures::StreamExt;
use uuid::Uuid;

/// Forward relayed webhooks to a local destination.
#[derive(Parser, Debug)]
#[command(
    name = "hookrelay-forward",
    about = "Forward relayed webhooks to a local destination"
)]
struct Cli {
    /// Webhook SSE source, e.g. `https://relay.example.com/webhook/my-channel`.
    #[arg(long, short = 's')]
    src: Option<String>,

    /// Relay base URL used to mint a fresh channel when `--src` is absent.
    #[arg(long, default_value = "http://localhost:4000")]
    relay: String,

    /// Destination to POST webhooks to, e.g. `http://localhost:3000/hooks`.
    dest: String,

    /// Minimum log level (overridden by `RUST_LOG`).
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    /// The SSE source URL, minting a fresh channel when none was given.
    fn source(&self) -> String {
        self.src.clone().unwrap_or_else(|| {
            format!(
                "{}/webhook/{}",
                self.relay.trim_end_matches('/'),
                Uuid::now_v7()
            )
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_subscriber(&cli.log_level);

    let src = cli.source();
    println!("Forwarding SSE from \"{src}\" to \"{}\"", cli.dest);
    println!("Trigger it with:");
    println!("curl -X POST -d 'test=123' \"{src}\"");

    // The streaming request stays open indefinitely; only the re-posts get
    // a request timeout.
    let stream_client = reqwest::Client::builder()
        .build()
        .context("failed to build http client")?;
    let post_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("failed to build http client")?;

    let resp = stream_client
        .get(&src)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
        .with_context(|| format!("failed to connect to {src}"))?;
    ensure!(
        resp.status().is_success(),
        "relay returned {} for {src}",
        resp.status()
    );

    let mut frames = pin!(sse::parse_sse_stream(resp.bytes_stream()));
    while let Some(frame) = frames.next().await {
        let client = post_client.clone();
        let dest = cli.dest.clone();
        let _ = tokio::spawn(async move {
            relay::forward_frame(&client, &dest, frame).await;
        });
    }

    tracing::info!("stream closed by the relay");
    Ok(())
}

/// Initialize the global tracing subscriber with stderr output.
fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
