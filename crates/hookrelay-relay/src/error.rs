//! Error types for the subscription registry.

use thiserror::Error;

/// Errors surfaced to callers of the subscription registry.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The global subscription cap is reached; no new subscriptions are
    /// accepted until one is released.
    #[error("subscription limit of {max} reached")]
    CapacityExceeded {
        /// The configured cap.
        max: usize,
    },

    /// A forward was attempted on a channel with no connected consumer.
    #[error("no subscriber connected for channel {channel}")]
    NoSubscriber {
        /// The channel the callback was addressed to.
        channel: String,
    },

    /// The webhook payload could not be encoded to JSON.
    #[error("unable to encode webhook to json: {0}")]
    Encode(#[from] serde_json::Error),
}
