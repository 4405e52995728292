//! Webhook intake: verification handshake, subscribe, and forward.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use tracing::{debug, info, warn};

use hookrelay_relay::{run_keepalive, RelayError};

use crate::server::AppState;

/// Query parameters of the connect route.
///
/// The handshake fields are only present when the webhook provider is
/// verifying the callback URL.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// `hub.mode` — `subscribe` selects the verification handshake.
    #[serde(rename = "hub.mode")]
    pub hub_mode: Option<String>,
    /// `hub.challenge` — echoed back verbatim on success.
    #[serde(rename = "hub.challenge")]
    pub hub_challenge: Option<String>,
    /// `hub.verify_token` — must equal the channel name.
    #[serde(rename = "hub.verify_token")]
    pub hub_verify_token: Option<String>,
}

/// `GET /webhook/{channel}`.
///
/// With `hub.mode=subscribe` this is the provider's verification handshake.
/// Otherwise a new subscription is created, its keepalive loop started, and
/// the caller redirected to the streaming endpoint.
pub async fn connect(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Query(params): Query<ConnectParams>,
) -> Response {
    if params.hub_mode.as_deref() == Some("subscribe") {
        return verify(&channel, &params);
    }

    match state.registry.subscribe(&channel) {
        Ok(client_id) => {
            if let Some(cancel) = state.registry.cancel_token(&client_id) {
                let registry = state.registry.clone();
                let id = client_id.clone();
                let interval = state.config.ping_interval();
                let _ = tokio::spawn(run_keepalive(registry, id, interval, cancel));
            }
            info!(client_id = %client_id, channel, "subscriber connected");
            Redirect::to(&format!("/events?id={client_id}")).into_response()
        }
        Err(err) => {
            warn!(channel, error = %err, "subscription rejected");
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
    }
}

/// The challenge/response verification handshake.
///
/// The shared verify token is the channel name itself; a missing challenge
/// or a token mismatch is a client error.
fn verify(channel: &str, params: &ConnectParams) -> Response {
    let Some(challenge) = params.hub_challenge.as_deref() else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if params.hub_verify_token.as_deref() != Some(channel) {
        return StatusCode::BAD_REQUEST.into_response();
    }
    debug!(channel, "verification handshake accepted");
    challenge.to_string().into_response()
}

/// `POST /webhook/{channel}` — relay the callback to every subscriber.
pub async fn forward(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Response {
    match state.registry.forward(&channel, header_pairs(&headers), body).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(RelayError::NoSubscriber { .. }) => {
            debug!(channel, "callback with no subscriber");
            StatusCode::BAD_REQUEST.into_response()
        }
        Err(err) => {
            warn!(channel, error = %err, "forward failed");
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
    }
}

/// Collect the request headers into the relayed multi-value form.
///
/// Values that are not valid UTF-8 are skipped.
fn header_pairs(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else { continue };
        out.entry(name.as_str().to_string())
            .or_default()
            .push(value.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn verify_echoes_the_challenge() {
        let params = ConnectParams {
            hub_mode: Some("subscribe".into()),
            hub_challenge: Some("1158201444".into()),
            hub_verify_token: Some("fb-callback".into()),
        };
        let resp = verify("fb-callback", &params);
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn verify_rejects_missing_challenge() {
        let params = ConnectParams {
            hub_mode: Some("subscribe".into()),
            hub_challenge: None,
            hub_verify_token: Some("fb-callback".into()),
        };
        let resp = verify("fb-callback", &params);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn verify_rejects_token_mismatch() {
        let params = ConnectParams {
            hub_mode: Some("subscribe".into()),
            hub_challenge: Some("c".into()),
            hub_verify_token: Some("other-channel".into()),
        };
        let resp = verify("fb-callback", &params);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn header_pairs_groups_repeated_values() {
        let mut headers = HeaderMap::new();
        headers.append("x-tag", HeaderValue::from_static("one"));
        headers.append("x-tag", HeaderValue::from_static("two"));
        headers.insert("content-type", HeaderValue::from_static("text/plain"));

        let pairs = header_pairs(&headers);
        assert_eq!(pairs["x-tag"], vec!["one".to_string(), "two".to_string()]);
        assert_eq!(pairs["content-type"], vec!["text/plain".to_string()]);
    }

    #[test]
    fn header_pairs_skips_invalid_utf8() {
        let mut headers = HeaderMap::new();
        headers.insert("x-bin", HeaderValue::from_bytes(b"\xff\xfe").unwrap());
        headers.insert("x-ok", HeaderValue::from_static("fine"));

        let pairs = header_pairs(&headers);
        assert!(!pairs.contains_key("x-bin"));
        assert!(pairs.contains_key("x-ok"));
    }
}
