//! Post-commit event emission.
//!
//! Each committed transformation hands one envelope to the publisher on a
//! task tracked by a [`TaskTracker`]. The task is detached from the request
//! future, so a caller that stops polling does not cancel delivery, and
//! shutdown can wait for in-flight deliveries with a deadline.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use anvil_domain::{CraftingEvent, EventEnvelope};

use crate::error::ShutdownError;
use crate::ports::EventPublisher;

/// Schedules event delivery and drains it on shutdown.
#[derive(Clone)]
pub struct EventEmitter {
    publisher: Option<Arc<dyn EventPublisher>>,
    tracker: TaskTracker,
}

impl EventEmitter {
    /// Emitter that delivers to `publisher`, or drops events when `None`.
    pub fn new(publisher: Option<Arc<dyn EventPublisher>>) -> Self {
        Self { publisher, tracker: TaskTracker::new() }
    }

    /// Wrap `event` and schedule its delivery.
    ///
    /// Returns the envelope when a publisher is configured. Must be called
    /// from within a tokio runtime.
    pub fn emit(&self, event: CraftingEvent) -> Option<EventEnvelope> {
        let publisher = self.publisher.as_ref()?;
        let envelope = EventEnvelope::new(event);

        debug!(
            event_id = %envelope.event_id,
            event_type = envelope.event.event_type(),
            user_id = %envelope.event.user_id(),
            "Scheduling event emission"
        );

        let publisher = Arc::clone(publisher);
        let delivery = envelope.clone();
        self.tracker.spawn(async move {
            publisher.publish_with_retry(delivery).await;
        });

        Some(envelope)
    }

    /// Emission tasks still running
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Close the tracker and wait for in-flight emissions.
    ///
    /// # Errors
    /// `ShutdownError::DeadlineExceeded` if tasks remain after `deadline`.
    /// They keep running on the runtime; nothing is aborted.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), ShutdownError> {
        self.tracker.close();
        info!(pending = self.tracker.len(), ?deadline, "Draining event emissions");

        match tokio::time::timeout(deadline, self.tracker.wait()).await {
            Ok(()) => {
                info!("Event emissions drained");
                Ok(())
            },
            Err(_) => {
                let pending = self.tracker.len();
                warn!(pending, ?deadline, "Shutdown deadline exceeded");
                Err(ShutdownError::DeadlineExceeded { deadline, pending })
            },
        }
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("has_publisher", &self.publisher.is_some())
            .field("pending", &self.tracker.len())
            .finish()
    }
}
