//! Per-subscriber keepalive ping loop.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use hookrelay_sse::Event;

use crate::registry::SubscriptionRegistry;

/// Outcome of a keepalive loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeepaliveResult {
    /// A ping failed; the subscription was torn down.
    Disconnected,
    /// The subscription's token was cancelled externally.
    Cancelled,
}

/// Ping `client_id` every `interval` until a ping fails or `cancel` fires.
///
/// The first failed ping unsubscribes the client, removes it from the
/// broker, and ends the loop — there is no retry budget on this path; the
/// client's own write tolerance only applies to broadcast sweeps.
pub async fn run_keepalive(
    registry: Arc<SubscriptionRegistry>,
    client_id: String,
    interval: Duration,
    cancel: CancellationToken,
) -> KeepaliveResult {
    loop {
        tokio::select! {
            () = cancel.cancelled() => return KeepaliveResult::Cancelled,
            () = tokio::time::sleep(interval) => {
                if let Err(err) = registry
                    .broker()
                    .broadcast_to(&client_id, Event::ping())
                    .await
                {
                    let channel = registry.channel_of(&client_id);
                    let _ = registry.unsubscribe(&client_id);
                    registry.broker().remove(&client_id);
                    let remaining = channel
                        .as_deref()
                        .map_or(0, |c| registry.subscribers_of(c).len());
                    info!(
                        client_id = %client_id,
                        error = %err,
                        remaining,
                        "ping failed, subscriber disconnected"
                    );
                    return KeepaliveResult::Disconnected;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hookrelay_sse::{Broker, Client};

    const INTERVAL: Duration = Duration::from_secs(30);
    const TIMEOUT: Duration = Duration::from_secs(10);

    fn make_registry() -> Arc<SubscriptionRegistry> {
        Arc::new(SubscriptionRegistry::new(Arc::new(Broker::new()), 10))
    }

    #[tokio::test(start_paused = true)]
    async fn pings_are_delivered_on_the_interval() {
        let registry = make_registry();
        let id = registry.subscribe("chan").unwrap();
        let client = Client::new(id.clone(), TIMEOUT, 3);
        let mut rx = client.take_receiver().unwrap();
        registry.broker().register(client).unwrap();

        let cancel = registry.cancel_token(&id).unwrap();
        let handle = tokio::spawn(run_keepalive(
            registry.clone(),
            id.clone(),
            INTERVAL,
            cancel.clone(),
        ));

        let ping = rx.recv().await.unwrap();
        assert_eq!(&*ping.to_wire(), b"event:ping\ndata:ping\n\n");
        let ping = rx.recv().await.unwrap();
        assert_eq!(&**ping.data(), b"ping");

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), KeepaliveResult::Cancelled);
        // Cancellation alone does not tear the subscription down.
        assert!(registry.is_subscribed(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn first_failed_ping_disconnects() {
        let registry = make_registry();
        let id = registry.subscribe("chan").unwrap();
        // No broker client for this id: the first ping fails immediately.
        let cancel = registry.cancel_token(&id).unwrap();

        let result = run_keepalive(registry.clone(), id.clone(), INTERVAL, cancel).await;

        assert_eq!(result, KeepaliveResult::Disconnected);
        assert!(!registry.is_subscribed(&id));
        assert!(registry.subscribers_of("chan").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_removes_broker_client() {
        let registry = make_registry();
        let id = registry.subscribe("chan").unwrap();
        let client = Client::new(id.clone(), Duration::from_millis(10), 3);
        // Receiver dropped: every write to this client fails.
        drop(client.take_receiver().unwrap());
        registry.broker().register(client).unwrap();

        let cancel = registry.cancel_token(&id).unwrap();
        let result = run_keepalive(registry.clone(), id.clone(), INTERVAL, cancel).await;

        assert_eq!(result, KeepaliveResult::Disconnected);
        assert!(!registry.broker().contains(&id));
    }

    #[tokio::test]
    async fn cancellation_ends_the_loop_promptly() {
        let registry = make_registry();
        let id = registry.subscribe("chan").unwrap();
        let cancel = registry.cancel_token(&id).unwrap();
        cancel.cancel();

        let result = run_keepalive(registry, id, INTERVAL, cancel).await;
        assert_eq!(result, KeepaliveResult::Cancelled);
    }
}
