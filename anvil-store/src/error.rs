//! Storage layer errors

use std::time::Duration;

use anvil_domain::UserId;
use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        /// Type of entity (user, item, recipe)
        entity_type: String,
        /// Entity ID
        id: String,
    },

    /// Per-user lock not acquired within the configured wait
    #[error("Timed out after {waited:?} waiting for inventory lock of user {user_id}")]
    LockTimeout {
        /// User whose inventory was contended
        user_id: UserId,
        /// How long we waited
        waited: Duration,
    },

    /// Write attempted for a user whose inventory was not read under lock
    #[error("Inventory of user {0} was not locked in this transaction")]
    NotLocked(UserId),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Domain error passthrough
    #[error("Domain error: {0}")]
    Domain(#[from] anvil_domain::DomainError),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }
}
