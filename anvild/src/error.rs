//! Daemon error types.

use anvil_exec::{CraftError, ShutdownError};
use anvil_store::StoreError;
use thiserror::Error;

/// Daemon-level errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Crafting operation error
    #[error("Crafting error: {0}")]
    Craft(#[from] CraftError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Event emissions outlived the shutdown deadline
    #[error("Shutdown error: {0}")]
    Shutdown(#[from] ShutdownError),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
