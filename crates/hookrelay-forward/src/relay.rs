//! Re-posting relayed webhooks to the local destination.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, info, warn};

use hookrelay_relay::WebhookPayload;

use crate::sse::SseFrame;

/// Forward one SSE frame to `dest`.
///
/// Pings are skipped; webhook frames are decoded and re-posted with their
/// original headers and body. Failures are logged and never fatal.
pub async fn forward_frame(client: &reqwest::Client, dest: &str, frame: SseFrame) {
    match frame.event.as_str() {
        "ping" => debug!("ping"),
        "webhook" => {
            let payload: WebhookPayload = match serde_json::from_str(&frame.data) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(error = %err, "unable to decode webhook json");
                    return;
                }
            };
            post_webhook(client, dest, payload).await;
        }
        other => warn!(event = other, "event not supported"),
    }
}

async fn post_webhook(client: &reqwest::Client, dest: &str, payload: WebhookPayload) {
    info!(dest, bytes = payload.body.len(), "forwarding webhook");

    let headers = header_map(&payload);
    let response = client
        .post(dest)
        .headers(headers)
        .body(payload.body)
        .send()
        .await;

    match response {
        Ok(resp) if resp.status().is_client_error() || resp.status().is_server_error() => {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(%status, body, "destination rejected the webhook");
        }
        Ok(resp) => debug!(status = %resp.status(), "webhook forwarded"),
        Err(err) => warn!(error = %err, "failed to forward webhook"),
    }
}

/// Rebuild the callback's headers, skipping the connection-specific ones
/// the client computes itself.
fn header_map(payload: &WebhookPayload) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, values) in &payload.header {
        if name.eq_ignore_ascii_case("host") || name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        for value in values {
            let Ok(value) = HeaderValue::from_str(value) else {
                continue;
            };
            headers.append(name.clone(), value);
        }
    }
    headers
}
