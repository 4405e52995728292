//! The SSE streaming endpoint.

use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, warn};

use hookrelay_relay::SubscriptionRegistry;
use hookrelay_sse::{Broker, Client};

use crate::server::AppState;

/// Query parameters of the streaming endpoint.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// The client id issued by a prior subscribe.
    pub id: String,
}

/// Removes the connection's registry and broker entries exactly once,
/// whether the read loop ends on its own or the response body is dropped
/// mid-flight by a closed connection.
struct ConnectionGuard {
    client_id: String,
    registry: Arc<SubscriptionRegistry>,
    broker: Arc<Broker>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        debug!(client_id = %self.client_id, "streaming connection closed");
        let _ = self.registry.unsubscribe(&self.client_id);
        self.broker.remove(&self.client_id);
    }
}

/// `GET /events?id=` — bind the HTTP response to a client's delivery channel.
///
/// Each received event is rendered to its wire form and flushed as one body
/// frame. The subscription's cancellation token and the connection's own
/// close both end the stream; redundant teardown from the racing keepalive
/// loop is absorbed by idempotent removal.
pub async fn events(State(state): State<AppState>, Query(query): Query<EventsQuery>) -> Response {
    // A streaming connection cannot be opened before a subscription exists.
    let Some(cancel) = state.registry.cancel_token(&query.id) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let client = Client::new(
        query.id.clone(),
        state.config.write_timeout(),
        state.config.tolerance,
    );
    let Some(mut receiver) = client.take_receiver() else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    if let Err(err) = state.broker.register(client) {
        warn!(client_id = %query.id, error = %err, "stream connection rejected");
        return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
    }
    debug!(client_id = %query.id, "streaming connection open");

    let guard = ConnectionGuard {
        client_id: query.id.clone(),
        registry: state.registry.clone(),
        broker: state.broker.clone(),
    };

    let body = stream! {
        let _guard = guard;
        loop {
            // An event already handed over is still flushed before a
            // cancellation is honored.
            let event = tokio::select! {
                biased;
                event = receiver.recv() => event,
                () = cancel.cancelled() => None,
            };
            let Some(event) = event else { break };
            yield Ok::<Bytes, Infallible>(event.to_wire());
        }
    };

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
