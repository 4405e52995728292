//! Event type and canonical wire rendering.

use std::fmt;

use bytes::Bytes;

/// The kind of event delivered over a streaming connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// A relayed webhook callback.
    Webhook,
    /// A keepalive ping.
    Ping,
}

impl EventType {
    /// The wire name of this event type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Ping => "ping",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable (type, payload) pair delivered to streaming clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    event_type: EventType,
    data: Bytes,
}

impl Event {
    /// Create an event from a type tag and an opaque payload.
    pub fn new(event_type: EventType, data: impl Into<Bytes>) -> Self {
        Self {
            event_type,
            data: data.into(),
        }
    }

    /// A `webhook` event carrying the given payload.
    pub fn webhook(data: impl Into<Bytes>) -> Self {
        Self::new(EventType::Webhook, data)
    }

    /// The keepalive `ping` event.
    pub fn ping() -> Self {
        Self::new(EventType::Ping, Bytes::from_static(b"ping"))
    }

    /// The event's type tag.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// The event's payload.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Render to the canonical wire form: `event:<type>\ndata:<payload>\n\n`.
    pub fn to_wire(&self) -> Bytes {
        Bytes::from(format!(
            "event:{}\ndata:{}\n\n",
            self.event_type,
            String::from_utf8_lossy(&self.data)
        ))
    }
}
