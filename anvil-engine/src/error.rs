//! Engine error types.

use anvil_domain::ItemId;
use thiserror::Error;

/// Errors produced by pure planning logic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Stock does not cover a single unit of the recipe
    #[error("Insufficient stock: item {limiting_item} covers 0 units")]
    Unaffordable {
        /// First cost line that limited the plan to zero
        limiting_item: ItemId,
    },

    /// Cost list is empty or has a zero per-unit line
    #[error("Malformed recipe costs")]
    MalformedCosts,

    /// Nothing was requested
    #[error("Requested quantity must be positive")]
    NothingRequested,
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
