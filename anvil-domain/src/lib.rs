//! Anvil Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains inventory, recipes, outcomes and crafting events.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod entities;
pub mod events;
pub mod inventory;
pub mod outcomes;
pub mod recipes;
pub mod value_objects;

// Re-export commonly used types
pub use entities::{Item, ItemId, RecipeId, User, UserId, UserIdentity};
pub use events::{CraftingEvent, EventEnvelope, EVENT_SCHEMA_VERSION, EVENT_SOURCE};
pub use inventory::{ConsumedLot, Inventory, Slot};
pub use outcomes::{CombineOutcome, DecomposeOutcome};
pub use recipes::{
    CombineRecipe, DecomposeRecipe, RecipeCost, RecipeInfo, RecipeListing, RecipeOutput,
    UnlockedRecipe,
};
pub use value_objects::{DomainError, Platform, QualityLevel};
