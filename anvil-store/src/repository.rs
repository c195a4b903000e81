//! Repository trait definitions (Ports)
//!
//! These traits define the storage interface the crafting service needs.
//! Implementations can be a SQL database, in-memory, or mock for testing.

use async_trait::async_trait;

use anvil_domain::{
    CombineRecipe, DecomposeRecipe, Inventory, Item, ItemId, Platform, RecipeId, RecipeListing,
    UnlockedRecipe, User, UserId,
};

use crate::error::StoreError;

/// Read access to users, items and recipes, plus transactional inventory access.
#[async_trait]
pub trait CraftingRepository: Send + Sync {
    /// Find a user by platform identity
    async fn get_user_by_platform_id(
        &self,
        platform: Platform,
        platform_id: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Find an item by internal name
    async fn get_item_by_name(&self, name: &str) -> Result<Option<Item>, StoreError>;

    /// Find an item by ID
    async fn get_item_by_id(&self, id: ItemId) -> Result<Option<Item>, StoreError>;

    /// Batch lookup; missing IDs are simply absent from the result
    async fn get_items_by_ids(&self, ids: &[ItemId]) -> Result<Vec<Item>, StoreError>;

    /// Combine recipe producing `item_id`
    async fn get_recipe_by_target_item_id(
        &self,
        item_id: ItemId,
    ) -> Result<Option<CombineRecipe>, StoreError>;

    /// Decompose recipe consuming `item_id`
    async fn get_decompose_recipe_by_source_item_id(
        &self,
        item_id: ItemId,
    ) -> Result<Option<DecomposeRecipe>, StoreError>;

    /// Combine recipe whose unlock gates the given decompose recipe
    async fn get_associated_combine_recipe_id(
        &self,
        decompose_recipe_id: RecipeId,
    ) -> Result<Option<RecipeId>, StoreError>;

    /// Whether the user has unlocked the recipe
    async fn is_recipe_unlocked(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
    ) -> Result<bool, StoreError>;

    /// Combine recipes the user has unlocked
    async fn get_unlocked_recipes_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UnlockedRecipe>, StoreError>;

    /// Every combine recipe with its target item details
    async fn get_all_recipes(&self) -> Result<Vec<RecipeListing>, StoreError>;

    /// Open a transaction for inventory mutation
    async fn begin_transaction(&self) -> Result<Box<dyn InventoryTx>, StoreError>;
}

/// A unit of inventory work.
///
/// The first `read_inventory_locked` for a user acquires that user's
/// exclusive lock; the lock is held until `commit`, `rollback` or drop.
/// Writes are not visible to anyone else until `commit` succeeds, and a
/// dropped transaction discards them.
#[async_trait]
pub trait InventoryTx: Send {
    /// Read a user's inventory, acquiring the per-user lock
    async fn read_inventory_locked(&mut self, user_id: UserId) -> Result<Inventory, StoreError>;

    /// Stage a new inventory for a user locked in this transaction
    async fn write_inventory(
        &mut self,
        user_id: UserId,
        inventory: &Inventory,
    ) -> Result<(), StoreError>;

    /// Apply all staged writes atomically and release locks
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard staged writes and release locks
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
