//! The JSON wire shape relayed to subscribers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A webhook callback as delivered inside a `webhook` event's data field.
///
/// Header values are kept multi-valued to round-trip repeated HTTP headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// The callback's HTTP headers.
    pub header: BTreeMap<String, Vec<String>>,
    /// The callback's raw body.
    pub body: String,
}

impl WebhookPayload {
    /// Build a payload from header pairs and a body.
    pub fn new(header: BTreeMap<String, Vec<String>>, body: impl Into<String>) -> Self {
        Self {
            header,
            body: body.into(),
        }
    }
}
