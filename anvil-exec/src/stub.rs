//! Stub collaborators for testing.
//!
//! In-process implementations of every port, with knobs for forcing
//! failures and recording calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use anvil_domain::{EventEnvelope, UserId};
use anvil_engine::BonusKind;

use crate::error::{CraftError, PortError};
use crate::ports::{
    EventPublisher, LevelProvider, ModifierProvider, NamingResolver, Operation, OperationObserver,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Modifiers
// =============================================================================

/// Modifier provider returning a fixed value for every key.
#[derive(Debug)]
pub struct FixedModifier {
    value: f64,
    keys: Mutex<Vec<String>>,
}

impl FixedModifier {
    /// Always answer `value`
    pub fn new(value: f64) -> Self {
        Self { value, keys: Mutex::new(Vec::new()) }
    }

    /// Keys looked up so far, in order
    pub fn keys_seen(&self) -> Vec<String> {
        lock(&self.keys).clone()
    }
}

#[async_trait]
impl ModifierProvider for FixedModifier {
    async fn get_modified_value(&self, key: &str, _base: f64) -> Result<f64, PortError> {
        lock(&self.keys).push(key.to_string());
        Ok(self.value)
    }
}

/// Modifier provider that always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingModifier;

#[async_trait]
impl ModifierProvider for FailingModifier {
    async fn get_modified_value(&self, key: &str, _base: f64) -> Result<f64, PortError> {
        Err(PortError::new(format!("Simulated modifier failure for {}", key)))
    }
}

// =============================================================================
// Naming
// =============================================================================

/// Naming resolver backed by a fixed alias map.
#[derive(Debug, Default)]
pub struct StubNaming {
    aliases: HashMap<String, String>,
}

impl StubNaming {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `public_name` to `internal_name`
    pub fn with_alias(mut self, public_name: &str, internal_name: &str) -> Self {
        self.aliases.insert(public_name.to_string(), internal_name.to_string());
        self
    }
}

#[async_trait]
impl NamingResolver for StubNaming {
    async fn resolve_public_name(&self, public_name: &str) -> Option<String> {
        self.aliases.get(public_name).cloned()
    }
}

// =============================================================================
// Levels
// =============================================================================

/// Level provider backed by a per-user map; unknown users are level 0.
#[derive(Debug, Default)]
pub struct StubLevels {
    levels: Mutex<HashMap<UserId, u32>>,
    fail_next: AtomicBool,
}

impl StubLevels {
    /// Create a provider where everyone is level 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a user's level
    pub fn set_level(&self, user_id: UserId, level: u32) {
        lock(&self.levels).insert(user_id, level);
    }

    /// Configure the next lookup to fail.
    pub fn set_fail_next(&self, fail: bool) {
        self.fail_next.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl LevelProvider for StubLevels {
    async fn get_job_level(&self, user_id: UserId, job_key: &str) -> Result<u32, PortError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PortError::new(format!("Simulated {} level lookup failure", job_key)));
        }
        Ok(lock(&self.levels).get(&user_id).copied().unwrap_or(0))
    }
}

// =============================================================================
// Publisher
// =============================================================================

/// Publisher that records every envelope it is handed.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<EventEnvelope>>,
    delay: Option<Duration>,
}

impl RecordingPublisher {
    /// Record immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep `delay` before recording, to simulate slow delivery
    pub fn with_delay(delay: Duration) -> Self {
        Self { published: Mutex::new(Vec::new()), delay: Some(delay) }
    }

    /// Envelopes recorded so far
    pub fn published(&self) -> Vec<EventEnvelope> {
        lock(&self.published).clone()
    }

    /// Number of envelopes recorded
    pub fn count(&self) -> usize {
        lock(&self.published).len()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish_with_retry(&self, envelope: EventEnvelope) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.published).push(envelope);
    }
}

// =============================================================================
// Observer
// =============================================================================

/// Observer that counts notifications.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    successes: AtomicU64,
    failures: Mutex<Vec<(Operation, &'static str)>>,
    bonuses: AtomicU64,
    fallbacks: AtomicUsize,
}

impl RecordingObserver {
    /// Create a zeroed observer
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful operations seen
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::SeqCst)
    }

    /// Failed operations seen, with their error kind
    pub fn failures(&self) -> Vec<(Operation, &'static str)> {
        lock(&self.failures).clone()
    }

    /// Total bonus triggers seen
    pub fn bonuses(&self) -> u64 {
        self.bonuses.load(Ordering::SeqCst)
    }

    /// Modifier fallbacks seen
    pub fn fallbacks(&self) -> usize {
        self.fallbacks.load(Ordering::SeqCst)
    }
}

impl OperationObserver for RecordingObserver {
    fn on_operation(&self, operation: Operation, error: Option<&CraftError>) {
        match error {
            None => {
                self.successes.fetch_add(1, Ordering::SeqCst);
            },
            Some(e) => lock(&self.failures).push((operation, e.kind())),
        }
    }

    fn on_bonus(&self, _kind: BonusKind, count: u64) {
        self.bonuses.fetch_add(count, Ordering::SeqCst);
    }

    fn on_modifier_fallback(&self, _key: &str) {
        self.fallbacks.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Tests
// =============================================================================
