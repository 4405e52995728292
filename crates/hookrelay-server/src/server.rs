//! `RelayServer` — router assembly and serving.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use hookrelay_relay::SubscriptionRegistry;
use hookrelay_sse::Broker;

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::routes;
use crate::stream;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broker of connected streaming clients.
    pub broker: Arc<Broker>,
    /// Channel subscription registry.
    pub registry: Arc<SubscriptionRegistry>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
}

/// The relay server.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    broker: Arc<Broker>,
    registry: Arc<SubscriptionRegistry>,
    start_time: Instant,
}

impl RelayServer {
    /// Create a server with a fresh broker and subscription registry.
    pub fn new(config: ServerConfig) -> Self {
        let broker = Arc::new(Broker::new());
        let registry = Arc::new(SubscriptionRegistry::new(
            broker.clone(),
            config.max_subscriptions,
        ));
        Self {
            config: Arc::new(config),
            broker,
            registry,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            broker: self.broker.clone(),
            registry: self.registry.clone(),
            config: self.config.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route(
                "/webhook/{channel}",
                get(routes::connect).post(routes::forward),
            )
            .route("/events", get(stream::events))
            .route("/health", get(health_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// The broker of connected clients.
    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// The subscription registry.
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires, then drain gracefully.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> std::io::Result<()> {
        info!(addr = %listener.local_addr()?, "listening");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.broker.len(),
        state.registry.subscription_count(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn make_server() -> RelayServer {
        RelayServer::new(ServerConfig::default())
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_reports_counters() {
        let server = make_server();
        let _id = server.registry().subscribe("chan").unwrap();

        let resp = server.router().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["subscriptions"], 1);
        assert_eq!(json["clients"], 0);
    }

    #[tokio::test]
    async fn connect_redirects_to_events() {
        let server = make_server();
        let resp = server
            .router()
            .oneshot(get_request("/webhook/abc123"))
            .await
            .unwrap();

        assert!(resp.status().is_redirection());
        let location = resp.headers().get("location").unwrap().to_str().unwrap();
        assert!(location.starts_with("/events?id="));
        assert_eq!(server.registry().subscription_count(), 1);
    }

    #[tokio::test]
    async fn connect_rejects_past_capacity() {
        let server = RelayServer::new(ServerConfig {
            max_subscriptions: 1,
            ..ServerConfig::default()
        });
        let _first = server
            .router()
            .oneshot(get_request("/webhook/a"))
            .await
            .unwrap();

        let resp = server
            .router()
            .oneshot(get_request("/webhook/b"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(server.registry().subscription_count(), 1);
    }

    #[tokio::test]
    async fn verification_handshake_roundtrip() {
        let server = make_server();
        let resp = server
            .router()
            .oneshot(get_request(
                "/webhook/fb-callback?hub.mode=subscribe&hub.challenge=1158&hub.verify_token=fb-callback",
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&*body, b"1158");
        // The handshake never creates a subscription.
        assert_eq!(server.registry().subscription_count(), 0);
    }

    #[tokio::test]
    async fn verification_handshake_bad_token() {
        let server = make_server();
        let resp = server
            .router()
            .oneshot(get_request(
                "/webhook/fb-callback?hub.mode=subscribe&hub.challenge=1158&hub.verify_token=wrong",
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn forward_without_subscribers_is_client_error() {
        let server = make_server();
        let req = Request::builder()
            .method("POST")
            .uri("/webhook/lonely")
            .body(Body::from("payload"))
            .unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn events_with_unknown_id_is_client_error() {
        let server = make_server();
        let resp = server
            .router()
            .oneshot(get_request("/events?id=nope"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
