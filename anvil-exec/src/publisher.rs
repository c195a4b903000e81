//! Resilient event publisher.
//!
//! Wraps an [`EventBus`] with bounded retries and a dead-letter sink.
//!
//! # Architecture
//!
//! ```text
//! envelope ─► bus.publish ──ok──► done
//!                 │ err
//!                 ▼
//!        sleep(base × 2^attempt, capped) ─► retry (max_retries times)
//!                 │ exhausted
//!                 ▼
//!        DeadLetterSink.write({timestamp, event, error})
//! ```
//!
//! Failures are logged, never returned: the crafting service does not
//! observe delivery.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};

use anvil_domain::EventEnvelope;

use crate::bus::EventBus;
use crate::error::PublishError;
use crate::ports::EventPublisher;

// =============================================================================
// Retry policy
// =============================================================================

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default base delay for exponential backoff.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Default cap on a single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Exponential backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): `base × 2^attempt`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

// =============================================================================
// Dead letter
// =============================================================================

/// One undeliverable event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    /// When delivery was abandoned
    pub timestamp: DateTime<Utc>,
    /// The event that could not be delivered
    pub event: EventEnvelope,
    /// Last delivery error
    pub error: String,
}

/// Where undeliverable events go.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Persist one record
    async fn write(&self, record: &DeadLetterRecord) -> Result<(), PublishError>;
}

/// Appends records as JSON lines to a file.
///
/// Writes are serialized so concurrent records never interleave.
pub struct JsonlDeadLetterFile {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlDeadLetterFile {
    /// Append to `path`, creating it (and parent directories) on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: tokio::sync::Mutex::new(()) }
    }

    /// Target file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DeadLetterSink for JsonlDeadLetterFile {
    async fn write(&self, record: &DeadLetterRecord) -> Result<(), PublishError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps records in memory (tests, embedding).
#[derive(Debug, Default)]
pub struct MemoryDeadLetter {
    records: Mutex<Vec<DeadLetterRecord>>,
}

impl MemoryDeadLetter {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Records written so far
    pub fn records(&self) -> Vec<DeadLetterRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl DeadLetterSink for MemoryDeadLetter {
    async fn write(&self, record: &DeadLetterRecord) -> Result<(), PublishError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

// =============================================================================
// Publisher
// =============================================================================

/// Retrying publisher with dead-letter fallback.
pub struct ResilientPublisher<B: EventBus> {
    bus: Arc<B>,
    policy: RetryPolicy,
    dead_letter: Arc<dyn DeadLetterSink>,
}

impl<B: EventBus> ResilientPublisher<B> {
    /// Create a publisher over `bus`.
    pub fn new(bus: Arc<B>, policy: RetryPolicy, dead_letter: Arc<dyn DeadLetterSink>) -> Self {
        Self { bus, policy, dead_letter }
    }

    /// Retry schedule in use
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Try to deliver, returning the last error once retries are exhausted.
    async fn deliver(&self, envelope: &EventEnvelope) -> Result<(), PublishError> {
        let mut attempt = 0;
        loop {
            match self.bus.publish(envelope).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    debug!(
                        event_id = %envelope.event_id,
                        attempt,
                        ?delay,
                        error = %e,
                        "Event publish failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<B: EventBus + 'static> EventPublisher for ResilientPublisher<B> {
    async fn publish_with_retry(&self, envelope: EventEnvelope) {
        let Err(e) = self.deliver(&envelope).await else {
            return;
        };

        warn!(
            event_id = %envelope.event_id,
            event_type = envelope.event.event_type(),
            retries = self.policy.max_retries,
            error = %e,
            "Event publish failed, writing to dead letter"
        );

        let record = DeadLetterRecord { timestamp: Utc::now(), event: envelope, error: e.to_string() };
        if let Err(dlq_err) = self.dead_letter.write(&record).await {
            error!(
                event_id = %record.event.event_id,
                error = %dlq_err,
                "Failed to write dead letter record, event lost"
            );
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
