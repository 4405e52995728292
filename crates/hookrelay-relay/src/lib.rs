//! # hookrelay-relay
//!
//! Subscription registry and webhook fan-out.
//!
//! - [`SubscriptionRegistry`]: maps webhook channel names to subscribed
//!   client ids under a global capacity cap, and owns each subscription's
//!   cancellation token
//! - [`WebhookPayload`]: the JSON wire shape relayed to subscribers
//! - [`run_keepalive`]: per-subscriber ping loop that tears the
//!   subscription down on the first failed ping

#![deny(unsafe_code)]

pub mod error;
pub mod keepalive;
pub mod payload;
pub mod registry;

pub use error::RelayError;
pub use keepalive::{run_keepalive, KeepaliveResult};
pub use payload::WebhookPayload;
pub use registry::SubscriptionRegistry;
