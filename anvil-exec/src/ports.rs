//! Collaborator port definitions.
//!
//! Ports define the interfaces for services the crafting engine consumes
//! but does not own (modifiers, naming, job levels, event delivery).
//! Every port is optional; the service degrades as documented on each.

use async_trait::async_trait;

use anvil_domain::{EventEnvelope, UserId};
use anvil_engine::BonusKind;

use crate::error::{CraftError, PortError};

// =============================================================================
// Modifier Port
// =============================================================================

/// Source of progression-adjusted values.
///
/// When absent or failing, bonus chances fall back to their base constants.
#[async_trait]
pub trait ModifierProvider: Send + Sync {
    /// Return `base` adjusted by whatever modifiers apply to `key`.
    async fn get_modified_value(&self, key: &str, base: f64) -> Result<f64, PortError>;
}

// =============================================================================
// Naming Port
// =============================================================================

/// Maps public (display) item names to internal names.
///
/// When absent or returning `None`, the input is looked up as an internal name.
#[async_trait]
pub trait NamingResolver: Send + Sync {
    /// Internal name for `public_name`, if known
    async fn resolve_public_name(&self, public_name: &str) -> Option<String>;
}

// =============================================================================
// Level Port
// =============================================================================

/// Job level lookup for level-gated recipes.
///
/// When absent the gate is skipped with a warning; when failing, the recipe
/// is treated as locked.
#[async_trait]
pub trait LevelProvider: Send + Sync {
    /// Current level of `user_id` in `job_key`
    async fn get_job_level(&self, user_id: UserId, job_key: &str) -> Result<u32, PortError>;
}

// =============================================================================
// Publisher Port
// =============================================================================

/// Fire-and-forget event delivery.
///
/// Implementations own retries and dead-lettering; failures never reach
/// the crafting service.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Deliver `envelope`, retrying internally
    async fn publish_with_retry(&self, envelope: EventEnvelope);
}

// =============================================================================
// Observer Hook
// =============================================================================

/// Crafting operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Combine (upgrade)
    Combine,
    /// Decompose (disassemble)
    Decompose,
}

impl Operation {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Combine => "combine",
            Operation::Decompose => "decompose",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Caller-owned hook notified as operations complete.
///
/// Called synchronously on the request path; implementations must be cheap.
pub trait OperationObserver: Send + Sync {
    /// An operation finished, successfully when `error` is `None`
    fn on_operation(&self, operation: Operation, error: Option<&CraftError>);

    /// A bonus triggered `count` times
    fn on_bonus(&self, _kind: BonusKind, _count: u64) {}

    /// The modifier lookup failed and the base chance was used
    fn on_modifier_fallback(&self, _key: &str) {}
}
