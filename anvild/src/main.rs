//! Anvil Daemon
//!
//! Hosts the crafting engine with configuration, logging, metrics and
//! graceful shutdown.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration
//! cargo run -p anvild
//!
//! # Start with custom environment
//! ANVIL_ENV=production ANVIL_LOG_JSON=true cargo run -p anvild
//! ```
//!
//! # Environment Variables
//!
//! - `ANVIL_ENV`: Environment (test, development, production)
//! - `ANVIL_MASTERWORK_CHANCE`: Base Masterwork chance (default: 0.10)
//! - `ANVIL_PERFECT_SALVAGE_CHANCE`: Base Perfect-Salvage chance (default: 0.10)
//! - `ANVIL_MODIFIER_KEY`: Modifier key (default: crafting_success_rate)
//! - `ANVIL_LOCK_TIMEOUT_MS`: Inventory lock wait (default: 5000)
//! - `ANVIL_SHUTDOWN_DEADLINE_MS`: Emission drain deadline (default: 10000)
//! - `ANVIL_PUBLISH_MAX_RETRIES`: Publish retries (default: 5)
//! - `ANVIL_PUBLISH_RETRY_DELAY_MS`: Base backoff (default: 2000)
//! - `ANVIL_DEAD_LETTER_PATH`: Dead letter file (default: logs/event_deadletter.jsonl)
//! - `ANVIL_LOG_JSON`: JSON log lines (default: false)

use anvild::{Config, Daemon};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::from_default_env()
        .add_directive("anvild=info".parse()?)
        .add_directive("anvil_exec=info".parse()?);
    if config.log_json {
        tracing_subscriber::registry().with(fmt::layer().json()).with(filter).init();
    } else {
        tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        lock_timeout_ms = config.store.lock_timeout.as_millis() as u64,
        "Anvil Daemon"
    );

    // Create and run daemon
    let daemon = Daemon::new_memory(config)?;
    daemon.run().await?;

    Ok(())
}
