//! Anvil Daemon Library
//!
//! Runtime host for the Anvil crafting engine.
//!
//! # Architecture
//!
//! ```text
//! Caller → CraftingService → MemoryStore (per-user locks)
//!               │ committed events
//!               ▼
//!        ResilientPublisher → BroadcastBus → Daemon event loop (logging)
//!               └─ dead letter (JSONL)
//! ```
//!
//! # Components
//!
//! - **Daemon**: Wiring and graceful shutdown
//! - **Metrics**: Prometheus counters behind the operation observer
//! - **Config**: Environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use anvild::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::new_memory(config).expect("Failed to build daemon");
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod daemon;
pub mod error;
pub mod metrics;

// Re-exports for convenience
pub use config::{Config, CraftingSettings, Environment, EventsConfig, StoreConfig};
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
pub use metrics::CraftingMetrics;
