//! # hookrelay-sse
//!
//! Streaming push broker for relayed webhook events.
//!
//! - [`Event`]: immutable (type, payload) pair with a canonical wire rendering
//! - [`Client`]: one streaming connection's delivery channel with rendezvous
//!   writes and consecutive-failure accounting
//! - [`Broker`]: concurrent client registry with targeted and fan-out
//!   broadcast, evicting clients that exceed their failure tolerance

#![deny(unsafe_code)]

pub mod broker;
pub mod client;
pub mod error;
pub mod event;

pub use broker::Broker;
pub use client::Client;
pub use error::{BrokerError, FanoutError};
pub use event::{Event, EventType};
