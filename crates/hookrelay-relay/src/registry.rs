//! Channel subscription bookkeeping and webhook fan-out.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use hookrelay_sse::{Broker, Event};

use crate::error::RelayError;
use crate::payload::WebhookPayload;

/// One live subscription: the channel it belongs to and the token that
/// tears down its keepalive loop and streaming connection.
#[derive(Debug)]
struct Subscription {
    channel: String,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Maps {
    /// Channel name → subscriber ids, in subscription order.
    subscribers: HashMap<String, Vec<String>>,
    /// Subscriber id → its subscription record.
    index: HashMap<String, Subscription>,
}

/// Maps webhook channel names to subscribed client ids.
///
/// Both directions of the mapping mutate together under one lock, and the
/// total number of subscriptions across all channels never exceeds the
/// configured cap. Delivery itself goes through the [`Broker`] and is never
/// performed while the lock is held.
pub struct SubscriptionRegistry {
    maps: Mutex<Maps>,
    broker: Arc<Broker>,
    max_subscriptions: usize,
}

impl SubscriptionRegistry {
    /// Create a registry delivering through `broker`, capped at
    /// `max_subscriptions` total subscribers.
    pub fn new(broker: Arc<Broker>, max_subscriptions: usize) -> Self {
        Self {
            maps: Mutex::new(Maps::default()),
            broker,
            max_subscriptions,
        }
    }

    /// The broker this registry delivers through.
    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// Register a new subscriber under `channel` and return its fresh
    /// client id.
    ///
    /// Rejects with [`RelayError::CapacityExceeded`] once the total
    /// subscriber count reaches the cap, without mutating anything.
    pub fn subscribe(&self, channel: &str) -> Result<String, RelayError> {
        let mut maps = self.maps.lock();
        if maps.index.len() >= self.max_subscriptions {
            warn!(
                max = self.max_subscriptions,
                "subscription limit reached, rejecting"
            );
            return Err(RelayError::CapacityExceeded {
                max: self.max_subscriptions,
            });
        }

        let client_id = Uuid::now_v7().to_string();
        maps.subscribers
            .entry(channel.to_string())
            .or_default()
            .push(client_id.clone());
        let _ = maps.index.insert(
            client_id.clone(),
            Subscription {
                channel: channel.to_string(),
                cancel: CancellationToken::new(),
            },
        );
        debug!(client_id = %client_id, channel, "subscribed");
        Ok(client_id)
    }

    /// Remove a subscriber from both mappings and cancel its token.
    ///
    /// Returns `false` when the id is unknown — already removed or never
    /// issued — so racing teardown paths can both call this safely.
    pub fn unsubscribe(&self, client_id: &str) -> bool {
        let mut maps = self.maps.lock();
        let Some(subscription) = maps.index.remove(client_id) else {
            return false;
        };
        subscription.cancel.cancel();

        if let Some(ids) = maps.subscribers.get_mut(&subscription.channel) {
            if let Some(pos) = ids.iter().position(|id| id == client_id) {
                let _ = ids.remove(pos);
            }
            if ids.is_empty() {
                let _ = maps.subscribers.remove(&subscription.channel);
            }
        }
        debug!(client_id, channel = %subscription.channel, "unsubscribed");
        true
    }

    /// The subscriber ids of `channel`, in subscription order.
    ///
    /// Empty when the channel has no subscribers or does not exist.
    pub fn subscribers_of(&self, channel: &str) -> Vec<String> {
        self.maps
            .lock()
            .subscribers
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }

    /// The channel a subscriber id belongs to, if it is live.
    pub fn channel_of(&self, client_id: &str) -> Option<String> {
        self.maps
            .lock()
            .index
            .get(client_id)
            .map(|s| s.channel.clone())
    }

    /// Whether `client_id` names a live subscription.
    pub fn is_subscribed(&self, client_id: &str) -> bool {
        self.maps.lock().index.contains_key(client_id)
    }

    /// The cancellation token of a live subscription.
    ///
    /// The keepalive loop and the streaming endpoint both observe this
    /// token, so teardown from either side stops both.
    pub fn cancel_token(&self, client_id: &str) -> Option<CancellationToken> {
        self.maps
            .lock()
            .index
            .get(client_id)
            .map(|s| s.cancel.clone())
    }

    /// Total live subscriptions across all channels.
    pub fn subscription_count(&self) -> usize {
        self.maps.lock().index.len()
    }

    /// Relay an inbound callback to every subscriber of `channel`.
    ///
    /// Errors only when the channel has no subscribers. Delivery is
    /// attempted for each subscriber independently; a failure toward one
    /// is logged and does not stop the others or surface to the caller.
    pub async fn forward(
        &self,
        channel: &str,
        header: BTreeMap<String, Vec<String>>,
        body: String,
    ) -> Result<(), RelayError> {
        let client_ids = self.subscribers_of(channel);
        if client_ids.is_empty() {
            return Err(RelayError::NoSubscriber {
                channel: channel.to_string(),
            });
        }

        let payload = WebhookPayload::new(header, body);
        let event = Event::webhook(serde_json::to_vec(&payload)?);

        for client_id in client_ids {
            if let Err(err) = self.broker.broadcast_to(&client_id, event.clone()).await {
                warn!(client_id = %client_id, channel, error = %err, "webhook delivery failed");
            }
        }
        Ok(())
    }
}
