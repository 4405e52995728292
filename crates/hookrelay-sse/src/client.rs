//! A single streaming connection's delivery channel.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

use crate::error::BrokerError;
use crate::event::Event;

/// Delivery endpoint for one connected streaming client.
///
/// Delivery is a rendezvous, not a queue: the channel holds at most one
/// in-flight event, and a write that is not taken by the consumer within
/// the write timeout fails and counts toward the failure tolerance.
pub struct Client {
    id: String,
    tx: mpsc::Sender<Event>,
    rx: Mutex<Option<mpsc::Receiver<Event>>>,
    timeout: Duration,
    failures: AtomicU32,
    tolerance: u32,
}

impl Client {
    /// Create a client with the given write timeout and failure tolerance.
    pub fn new(id: impl Into<String>, timeout: Duration, tolerance: u32) -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            id: id.into(),
            tx,
            rx: Mutex::new(Some(rx)),
            timeout,
            failures: AtomicU32::new(0),
            tolerance,
        }
    }

    /// The client's unique identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Take the receive half of the delivery channel.
    ///
    /// Returns `None` after the first call. The streaming endpoint consumes
    /// the receiver for the connection's lifetime; ownership of the client
    /// itself stays with the broker.
    pub fn take_receiver(&self) -> Option<mpsc::Receiver<Event>> {
        self.rx.lock().take()
    }

    /// Attempt to hand `event` to the consumer, waiting at most the write
    /// timeout.
    ///
    /// Success resets the consecutive-failure counter; failure increments it.
    pub async fn write(&self, event: Event) -> Result<(), BrokerError> {
        match self.tx.send_timeout(event, self.timeout).await {
            Ok(()) => {
                self.failures.store(0, Ordering::Relaxed);
                Ok(())
            }
            // A dropped receiver fails the same way a consumer that never
            // reads does.
            Err(SendTimeoutError::Timeout(_) | SendTimeoutError::Closed(_)) => {
                let _ = self.failures.fetch_add(1, Ordering::Relaxed);
                Err(BrokerError::WriteTimeout {
                    id: self.id.clone(),
                })
            }
        }
    }

    /// Consecutive failed writes since the last successful delivery.
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Whether the client has had too many consecutive failures and should
    /// be forcefully disconnected.
    ///
    /// The client never removes itself from the registry; the broker acts
    /// on this during a broadcast sweep.
    pub fn should_disconnect(&self) -> bool {
        self.failures.load(Ordering::Relaxed) >= self.tolerance
    }
}
