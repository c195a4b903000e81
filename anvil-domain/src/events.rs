//! Domain Events for Anvil
//!
//! Emitted after a transformation commits. Each kind carries a typed
//! payload; the envelope carries the schema version.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::UserId;

/// Current event schema version. Only ever incremented.
pub const EVENT_SCHEMA_VERSION: u32 = 1;

/// Source tag attached to every crafting event.
pub const EVENT_SOURCE: &str = "crafting";

/// Crafting events, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CraftingEvent {
    /// Items were combined into a more valuable item
    ItemCombined {
        /// User who owns the inventory
        user_id: UserId,
        /// Produced item name
        item_name: String,
        /// Crafts performed
        quantity: u64,
        /// Recipe key (item name when the recipe has none)
        recipe_key: String,
        /// At least one Masterwork trial succeeded
        is_masterwork: bool,
        /// Successful Masterwork trials
        masterwork_count: u64,
        /// Extra units produced
        bonus_quantity: u64,
    },

    /// An item was broken down into components
    ItemDecomposed {
        /// User who owns the inventory
        user_id: UserId,
        /// Decomposed item name
        item_name: String,
        /// Decompositions performed
        quantity: u64,
        /// Recipe key (item name when the recipe has none)
        recipe_key: String,
        /// At least one Perfect-Salvage trial succeeded
        is_perfect_salvage: bool,
        /// Successful Perfect-Salvage trials
        perfect_salvage_count: u64,
        /// Multiplier applied to bonus units
        multiplier: Decimal,
        /// Output name → units produced
        outputs: BTreeMap<String, u64>,
    },
}

impl CraftingEvent {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            CraftingEvent::ItemCombined { .. } => "item_combined",
            CraftingEvent::ItemDecomposed { .. } => "item_decomposed",
        }
    }

    /// Get the user ID from any event
    pub fn user_id(&self) -> UserId {
        match self {
            CraftingEvent::ItemCombined { user_id, .. }
            | CraftingEvent::ItemDecomposed { user_id, .. } => *user_id,
        }
    }
}

/// Versioned wrapper handed to the publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID (UUIDv7, time-ordered)
    pub event_id: Uuid,
    /// Payload schema version
    pub schema_version: u32,
    /// Emitting subsystem
    pub source: String,
    /// When the transformation committed
    pub occurred_at: DateTime<Utc>,
    /// Kind-tagged payload
    pub event: CraftingEvent,
}

impl EventEnvelope {
    /// Wrap an event with a fresh id, the current schema version and timestamp
    pub fn new(event: CraftingEvent) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            schema_version: EVENT_SCHEMA_VERSION,
            source: EVENT_SOURCE.to_string(),
            occurred_at: Utc::now(),
            event,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
