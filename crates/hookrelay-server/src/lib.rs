//! # hookrelay-server
//!
//! Axum HTTP glue around the broker and subscription registry.
//!
//! - `GET /webhook/{channel}`: verification handshake or subscribe + redirect
//! - `POST /webhook/{channel}`: relay an inbound callback to subscribers
//! - `GET /events?id=`: the SSE streaming endpoint
//! - `GET /health`: liveness and counters
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod stream;

pub use config::ServerConfig;
pub use server::{AppState, RelayServer};
