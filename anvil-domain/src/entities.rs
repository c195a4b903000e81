//! Domain Entities for Anvil
//!
//! Users and items are configuration/identity data owned by other
//! subsystems; this engine only reads them.

use crate::value_objects::Platform;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Identifiers
// =============================================================================

/// Unique identifier for a User
pub type UserId = Uuid;

/// Unique identifier for an Item definition
pub type ItemId = i64;

/// Unique identifier for a combine or decompose recipe
pub type RecipeId = i64;

// =============================================================================
// User
// =============================================================================

/// A user known to the economy, addressed by a platform-scoped identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub platform: Platform,
    /// Platform-scoped external id (e.g. a Discord snowflake)
    pub platform_id: String,
    pub username: String,
}

impl User {
    /// Create a new user with a fresh id
    pub fn new(platform: Platform, platform_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            platform,
            platform_id: platform_id.into(),
            username: username.into(),
        }
    }
}

/// Caller-supplied identity for an operation, not yet validated.
///
/// Platform is kept as a raw string so that validation can report
/// empty and unknown platforms as distinct errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub platform: String,
    pub platform_id: String,
    pub username: String,
}

impl UserIdentity {
    /// Build an identity from its raw parts
    pub fn new(
        platform: impl Into<String>,
        platform_id: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            platform_id: platform_id.into(),
            username: username.into(),
        }
    }
}

// =============================================================================
// Item
// =============================================================================

/// An item definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    /// Canonical name used by recipes and events (e.g. `lootbox_tier0`)
    pub internal_name: String,
    /// Player-facing alias (e.g. `junkbox`)
    pub public_name: Option<String>,
    pub description: String,
}

impl Item {
    /// Create an item with only an internal name
    pub fn new(id: ItemId, internal_name: impl Into<String>) -> Self {
        Self {
            id,
            internal_name: internal_name.into(),
            public_name: None,
            description: String::new(),
        }
    }

    /// Attach a public alias
    pub fn with_public_name(mut self, public_name: impl Into<String>) -> Self {
        self.public_name = Some(public_name.into());
        self
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}
