//! Registry of connected clients and event fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::client::Client;
use crate::error::{BrokerError, FanoutError};
use crate::event::Event;

/// Concurrent registry of connected clients, keyed by client id.
///
/// The lock guards only the map itself. Every delivery write is awaited on
/// a snapshot taken outside the lock, so one stalled consumer cannot block
/// registration, removal, or delivery to unrelated clients.
pub struct Broker {
    clients: RwLock<HashMap<String, Arc<Client>>>,
}

impl Broker {
    /// Create an empty broker.
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a client.
    ///
    /// Fails with [`BrokerError::DuplicateClient`] if a client with the same
    /// id is already registered.
    pub fn register(&self, client: Client) -> Result<(), BrokerError> {
        let mut clients = self.clients.write();
        if clients.contains_key(client.id()) {
            return Err(BrokerError::DuplicateClient {
                id: client.id().to_string(),
            });
        }
        debug!(client_id = client.id(), "client registered");
        let _ = clients.insert(client.id().to_string(), Arc::new(client));
        Ok(())
    }

    /// Remove a client by id. Removing an absent id is a no-op.
    pub fn remove(&self, id: &str) {
        if self.clients.write().remove(id).is_some() {
            debug!(client_id = id, "client removed");
        }
    }

    /// Whether a client with this id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.clients.read().contains_key(id)
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    /// Whether no clients are registered.
    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    fn get(&self, id: &str) -> Option<Arc<Client>> {
        self.clients.read().get(id).cloned()
    }

    /// Deliver an event to one client, propagating its write result.
    pub async fn broadcast_to(&self, id: &str, event: Event) -> Result<(), BrokerError> {
        let Some(client) = self.get(id) else {
            return Err(BrokerError::UnknownClient { id: id.to_string() });
        };
        client.write(event).await
    }

    /// Deliver an event to every registered client.
    ///
    /// A failing client never aborts the sweep; all per-client failures are
    /// returned together. A client whose failure tolerance is exceeded by
    /// this sweep is removed from the registry before the call returns.
    pub async fn broadcast(&self, event: Event) -> Result<(), FanoutError> {
        let snapshot: Vec<Arc<Client>> = self.clients.read().values().cloned().collect();

        let mut failures = Vec::new();
        for client in snapshot {
            if let Err(err) = client.write(event.clone()).await {
                if client.should_disconnect() {
                    warn!(
                        client_id = client.id(),
                        failures = client.failures(),
                        "tolerance exceeded, disconnecting client"
                    );
                    self.remove(client.id());
                }
                failures.push(err);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(FanoutError { failures })
        }
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use tokio::sync::mpsc;

    const TIMEOUT: Duration = Duration::from_millis(50);

    fn make_client(id: &str) -> (Client, mpsc::Receiver<Event>) {
        let client = Client::new(id, TIMEOUT, 3);
        let rx = client.take_receiver().unwrap();
        (client, rx)
    }

    #[test]
    fn register_and_contains() {
        let broker = Broker::new();
        let (client, _rx) = make_client("e1");
        broker.register(client).unwrap();
        assert!(broker.contains("e1"));
        assert_eq!(broker.len(), 1);
    }

    #[test]
    fn register_duplicate_id_fails() {
        let broker = Broker::new();
        let (first, _rx1) = make_client("e1");
        let (second, _rx2) = make_client("e1");
        broker.register(first).unwrap();
        let err = broker.register(second).unwrap_err();
        assert_matches!(err, BrokerError::DuplicateClient { id } if id == "e1");
        assert_eq!(broker.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let broker = Broker::new();
        let (client, _rx) = make_client("e1");
        broker.register(client).unwrap();
        broker.remove("e1");
        broker.remove("e1");
        assert!(broker.is_empty());
    }

    #[tokio::test]
    async fn broadcast_to_unknown_client() {
        let broker = Broker::new();
        let err = broker.broadcast_to("ghost", Event::ping()).await.unwrap_err();
        assert_matches!(err, BrokerError::UnknownClient { id } if id == "ghost");
    }

    #[tokio::test]
    async fn broadcast_to_delivers_wire_text() {
        let broker = Broker::new();
        let (client, mut rx) = make_client("e1");
        broker.register(client).unwrap();

        broker
            .broadcast_to("e1", Event::webhook("a body"))
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(&*event.to_wire(), b"event:webhook\ndata:a body\n\n");
    }

    #[tokio::test]
    async fn broadcast_reaches_all_clients() {
        let broker = Broker::new();
        let (c1, mut rx1) = make_client("e1");
        let (c2, mut rx2) = make_client("e2");
        broker.register(c1).unwrap();
        broker.register(c2).unwrap();

        broker.broadcast(Event::ping()).await.unwrap();

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_collects_failures_without_aborting() {
        let broker = Broker::new();
        let (live, mut live_rx) = make_client("live");
        let (stuck, _stuck_rx) = make_client("stuck");
        broker.register(live).unwrap();
        broker.register(stuck).unwrap();

        // Occupy the stuck client's single in-flight slot.
        broker.broadcast_to("stuck", Event::ping()).await.unwrap();

        let drain = tokio::spawn(async move {
            let mut seen = 0;
            while live_rx.recv().await.is_some() {
                seen += 1;
            }
            seen
        });

        let err = broker.broadcast(Event::ping()).await.unwrap_err();
        assert_eq!(err.failures.len(), 1);
        assert_matches!(&err.failures[0], BrokerError::WriteTimeout { id } if id == "stuck");
        // The live client still got the event.
        broker.remove("live");
        broker.remove("stuck");
        drop(broker);
        assert!(drain.await.unwrap() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_evicts_client_past_tolerance() {
        let broker = Broker::new();
        let client = Client::new("stuck", TIMEOUT, 2);
        let _rx = client.take_receiver().unwrap();
        broker.register(client).unwrap();

        // First sweep fills the slot, the next two time out.
        broker.broadcast(Event::ping()).await.unwrap();
        assert!(broker.broadcast(Event::ping()).await.is_err());
        assert!(broker.contains("stuck"));
        assert!(broker.broadcast(Event::ping()).await.is_err());
        assert!(!broker.contains("stuck"));
    }

    #[tokio::test]
    async fn broadcast_on_empty_broker_is_ok() {
        let broker = Broker::new();
        broker.broadcast(Event::ping()).await.unwrap();
    }
}
