//! Execution layer error types.

use std::fmt;
use std::time::Duration;

use anvil_domain::ItemId;
use anvil_store::StoreError;
use thiserror::Error;

/// Why a recipe is not available to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockReason {
    /// The user has not unlocked the recipe (or its associated recipe)
    NotUnlocked,
    /// The user's job level is below the recipe requirement
    LevelTooLow {
        /// Level the recipe needs
        required: u32,
        /// Level the user has
        actual: u32,
    },
    /// The level provider failed; access is denied
    LevelUnverified(String),
}

impl fmt::Display for LockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockReason::NotUnlocked => write!(f, "recipe is not unlocked"),
            LockReason::LevelTooLow { required, actual } => {
                write!(f, "requires level {} (you are level {})", required, actual)
            },
            LockReason::LevelUnverified(err) => {
                write!(f, "failed to verify job level requirements: {}", err)
            },
        }
    }
}

/// How far an operation got before failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPhase {
    /// Failed before any transaction was open
    NothingHappened,
    /// Failed inside a transaction that was rolled back
    RolledBack,
    /// Commit was attempted and reported failure
    OutcomeUnknown,
}

/// Errors returned by crafting operations.
#[derive(Debug, Error)]
pub enum CraftError {
    /// No user for the platform identity
    #[error("User not found: {platform}/{platform_id}")]
    UserNotFound {
        /// Platform name
        platform: String,
        /// Platform-scoped user id
        platform_id: String,
    },

    /// Item name did not resolve
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// No recipe for the item
    #[error("No recipe found for item: {0}")]
    RecipeNotFound(String),

    /// Recipe exists but the user may not use it
    #[error("Recipe for {item_name} is locked: {reason}")]
    RecipeLocked {
        /// Requested item
        item_name: String,
        /// Why it is locked
        reason: LockReason,
    },

    /// Missing or empty input field
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Platform outside the allow-list
    #[error("Invalid platform: {0}")]
    InvalidPlatform(String),

    /// Quantity was not positive
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(u64),

    /// Not enough stock to perform a single unit
    #[error("Insufficient quantity of item {item_id}: need {needed}, have {available}")]
    InsufficientQuantity {
        /// Limiting item
        item_id: ItemId,
        /// Units required
        needed: u64,
        /// Units held
        available: u64,
    },

    /// Could not open a transaction
    #[error("Failed to begin transaction: {0}")]
    TransactionBeginFailed(#[source] StoreError),

    /// Could not read (or lock) the inventory
    #[error("Failed to read inventory: {0}")]
    TransactionReadFailed(#[source] StoreError),

    /// Could not stage the new inventory
    #[error("Failed to update inventory: {0}")]
    TransactionWriteFailed(#[source] StoreError),

    /// Commit reported failure
    #[error("Failed to commit transaction: {0}")]
    TransactionCommitFailed(#[source] StoreError),

    /// Repository failure while validating
    #[error("Lookup failed: {0}")]
    Lookup(#[from] StoreError),
}

impl CraftError {
    /// How far the operation got
    pub fn phase(&self) -> ErrorPhase {
        match self {
            CraftError::InsufficientQuantity { .. }
            | CraftError::TransactionReadFailed(_)
            | CraftError::TransactionWriteFailed(_) => ErrorPhase::RolledBack,
            CraftError::TransactionCommitFailed(_) => ErrorPhase::OutcomeUnknown,
            _ => ErrorPhase::NothingHappened,
        }
    }

    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            CraftError::UserNotFound { .. } => "user_not_found",
            CraftError::ItemNotFound(_) => "item_not_found",
            CraftError::RecipeNotFound(_) => "recipe_not_found",
            CraftError::RecipeLocked { .. } => "recipe_locked",
            CraftError::InvalidInput(_) => "invalid_input",
            CraftError::InvalidPlatform(_) => "invalid_platform",
            CraftError::InvalidQuantity(_) => "invalid_quantity",
            CraftError::InsufficientQuantity { .. } => "insufficient_quantity",
            CraftError::TransactionBeginFailed(_) => "transaction_begin_failed",
            CraftError::TransactionReadFailed(_) => "transaction_read_failed",
            CraftError::TransactionWriteFailed(_) => "transaction_write_failed",
            CraftError::TransactionCommitFailed(_) => "transaction_commit_failed",
            CraftError::Lookup(_) => "lookup_failed",
        }
    }
}

/// Result type for crafting operations.
pub type CraftResult<T> = Result<T, CraftError>;

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct PortError(pub String);

impl PortError {
    /// Create a port error from any message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Event delivery errors, seen only by the publisher.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Bus rejected the event
    #[error("Bus error: {0}")]
    Bus(String),

    /// Dead-letter write failed
    #[error("Dead-letter write failed: {0}")]
    DeadLetter(#[from] std::io::Error),

    /// Record could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Shutdown did not finish cleanly.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Emission tasks outlived the deadline
    #[error("Shutdown deadline of {deadline:?} exceeded with {pending} emission task(s) pending")]
    DeadlineExceeded {
        /// Deadline that elapsed
        deadline: Duration,
        /// Tasks still running
        pending: usize,
    },
}

impl From<anvil_domain::DomainError> for CraftError {
    fn from(err: anvil_domain::DomainError) -> Self {
        match err {
            anvil_domain::DomainError::InsufficientQuantity { item_id, needed, available } => {
                CraftError::InsufficientQuantity { item_id, needed, available }
            },
            other => CraftError::InvalidInput(other.to_string()),
        }
    }
}
