//! In-process event bus.
//!
//! Fans committed crafting events out to any number of subscribers using a
//! tokio broadcast channel. Plugs into [`ResilientPublisher`] as its
//! [`EventBus`].
//!
//! [`ResilientPublisher`]: crate::publisher::ResilientPublisher

use async_trait::async_trait;
use tokio::sync::broadcast;

use anvil_domain::EventEnvelope;

use crate::error::PublishError;

/// Transport the resilient publisher delivers to.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Deliver one envelope
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), PublishError>;
}

/// Broadcast-channel event bus.
///
/// Delivery fails when nobody is subscribed, so the publisher retries and
/// eventually dead-letters instead of silently dropping the event.
pub struct BroadcastBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl BroadcastBus {
    /// Create a bus buffering up to `capacity` events per slow receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events sent after this call.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver { receiver: self.sender.subscribe() }
    }

    /// Live subscriber count
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl EventBus for BroadcastBus {
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), PublishError> {
        self.sender
            .send(envelope.clone())
            .map(|_| ())
            .map_err(|_| PublishError::Bus("no active subscribers".to_string()))
    }
}

/// Receiver for crafting events.
pub struct EventReceiver {
    receiver: broadcast::Receiver<EventEnvelope>,
}

impl EventReceiver {
    /// Wait for the next envelope.
    ///
    /// `None` once the bus is gone; `Some(Err(_))` when this subscriber fell
    /// behind and envelopes were skipped.
    pub async fn recv(&mut self) -> Option<Result<EventEnvelope, String>> {
        match self.receiver.recv().await {
            Ok(envelope) => Some(Ok(envelope)),
            Err(broadcast::error::RecvError::Closed) => None,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                Some(Err(format!("{} crafting events skipped", skipped)))
            },
        }
    }

    /// Next buffered envelope, if any.
    pub fn try_recv(&mut self) -> Option<EventEnvelope> {
        self.receiver.try_recv().ok()
    }
}
