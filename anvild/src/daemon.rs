//! Daemon: wires the crafting engine to its runtime collaborators.
//!
//! The Daemon ties together:
//! - In-memory store (per-user locks with a bounded wait)
//! - Crafting service (combine / decompose / recipe queries)
//! - Broadcast bus behind a resilient publisher with a JSONL dead letter
//! - Prometheus counters through the operation observer hook
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Initialize components
//! 3. Follow committed events on the bus
//! 4. Graceful shutdown on SIGINT: drain event emissions up to a deadline

use std::sync::Arc;

use tracing::{debug, info, warn};

use anvil_domain::EventEnvelope;
use anvil_exec::{BroadcastBus, CraftingService, JsonlDeadLetterFile, ResilientPublisher};
use anvil_store::MemoryStore;

use crate::config::Config;
use crate::error::DaemonResult;
use crate::metrics::CraftingMetrics;

// =============================================================================
// Daemon
// =============================================================================

/// The main Anvil daemon.
pub struct Daemon {
    /// Configuration
    config: Config,
    /// Inventory and catalog store
    store: Arc<MemoryStore>,
    /// Event bus
    bus: Arc<BroadcastBus>,
    /// Crafting service
    service: Arc<CraftingService<MemoryStore>>,
    /// Operation counters
    metrics: CraftingMetrics,
}

impl Daemon {
    /// Create a daemon over an in-memory store.
    pub fn new_memory(config: Config) -> DaemonResult<Self> {
        let store = Arc::new(MemoryStore::with_lock_timeout(config.store.lock_timeout));
        Self::new(config, store)
    }

    /// Create a daemon over a pre-seeded store.
    pub fn new(config: Config, store: Arc<MemoryStore>) -> DaemonResult<Self> {
        let bus = Arc::new(BroadcastBus::default());
        let dead_letter = Arc::new(JsonlDeadLetterFile::new(&config.events.dead_letter_path));
        let publisher = ResilientPublisher::new(bus.clone(), config.retry_policy(), dead_letter);
        let metrics = CraftingMetrics::new()?;

        let service = CraftingService::new(store.clone(), config.crafting_config())
            .with_publisher(Arc::new(publisher))
            .with_observer(Arc::new(metrics.clone()));

        Ok(Self {
            config,
            store,
            bus,
            service: Arc::new(service),
            metrics,
        })
    }

    /// Crafting service handle
    pub fn service(&self) -> Arc<CraftingService<MemoryStore>> {
        Arc::clone(&self.service)
    }

    /// Store handle
    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }

    /// Event bus handle
    pub fn bus(&self) -> Arc<BroadcastBus> {
        Arc::clone(&self.bus)
    }

    /// Operation counters
    pub fn metrics(&self) -> &CraftingMetrics {
        &self.metrics
    }

    /// Run the daemon.
    ///
    /// This method blocks until shutdown is requested (SIGINT).
    pub async fn run(self) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            dead_letter = %self.config.events.dead_letter_path.display(),
            "Starting Anvil daemon"
        );

        let mut events = self.bus.subscribe();

        info!("Entering main event loop");
        loop {
            tokio::select! {
                Some(event_result) = events.recv() => {
                    match event_result {
                        Ok(envelope) => log_event(&envelope),
                        Err(lag_msg) => {
                            warn!(%lag_msg, "Event receiver lagged");
                        }
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown().await
    }

    /// Graceful shutdown: wait for in-flight event emissions.
    pub async fn shutdown(&self) -> DaemonResult<()> {
        let deadline = self.config.events.shutdown_deadline;
        info!(
            pending = self.service.pending_emissions(),
            ?deadline,
            "Initiating graceful shutdown"
        );

        self.service.shutdown(deadline).await?;

        debug!(metrics = %self.metrics.render(), "Final counters");
        info!("Shutdown complete");
        Ok(())
    }
}

fn log_event(envelope: &EventEnvelope) {
    info!(
        event_id = %envelope.event_id,
        event_type = envelope.event.event_type(),
        user_id = %envelope.event.user_id(),
        "Crafting event"
    );
}

// =============================================================================
// Tests
// =============================================================================
