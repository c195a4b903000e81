//! In-memory store implementation
//!
//! Used for testing and development without a database.
//! Catalog and inventories sit behind RwLocks; inventory mutation goes
//! through [`MemoryTx`], which stages writes and publishes them only on
//! commit.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use anvil_domain::{
    CombineRecipe, DecomposeRecipe, Inventory, Item, ItemId, Platform, RecipeId, RecipeListing,
    UnlockedRecipe, User, UserId,
};

use crate::error::StoreError;
use crate::lock::{LockRegistry, UserLockGuard};
use crate::repository::{CraftingRepository, InventoryTx};

/// Point at which the next operation should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// Next `begin_transaction`
    Begin,
    /// Next `read_inventory_locked`
    Read,
    /// Next `write_inventory`
    Write,
    /// Next `commit` (staged writes are discarded)
    Commit,
    /// Next catalog lookup (users, items, recipes)
    Lookup,
}

#[derive(Debug, Default)]
struct Faults {
    begin: AtomicBool,
    read: AtomicBool,
    write: AtomicBool,
    commit: AtomicBool,
    lookup: AtomicBool,
}

impl Faults {
    fn flag(&self, point: FailPoint) -> &AtomicBool {
        match point {
            FailPoint::Begin => &self.begin,
            FailPoint::Read => &self.read,
            FailPoint::Write => &self.write,
            FailPoint::Commit => &self.commit,
            FailPoint::Lookup => &self.lookup,
        }
    }

    /// Check and reset
    fn should_fail(&self, point: FailPoint) -> bool {
        self.flag(point).swap(false, Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct Catalog {
    users: HashMap<UserId, User>,
    items: BTreeMap<ItemId, Item>,
    combine_recipes: BTreeMap<RecipeId, CombineRecipe>,
    decompose_recipes: BTreeMap<RecipeId, DecomposeRecipe>,
    /// decompose recipe → combine recipe gating it
    associations: HashMap<RecipeId, RecipeId>,
    unlocks: HashSet<(UserId, RecipeId)>,
}

#[derive(Debug)]
struct Shared {
    catalog: RwLock<Catalog>,
    inventories: RwLock<HashMap<UserId, Inventory>>,
    locks: Arc<LockRegistry>,
    faults: Faults,
    begun: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory store for testing
///
/// Cloning is cheap and shares state.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::with_locks(LockRegistry::new())
    }

    /// Create a store whose inventory locks give up after `timeout`
    pub fn with_lock_timeout(timeout: Duration) -> Self {
        Self::with_locks(LockRegistry::with_timeout(timeout))
    }

    fn with_locks(locks: LockRegistry) -> Self {
        Self {
            shared: Arc::new(Shared {
                catalog: RwLock::new(Catalog::default()),
                inventories: RwLock::new(HashMap::new()),
                locks: Arc::new(locks),
                faults: Faults::default(),
                begun: AtomicU64::new(0),
                commits: AtomicU64::new(0),
                rollbacks: AtomicU64::new(0),
            }),
        }
    }

    // ===== Seeding =====

    /// Insert or replace a user
    pub fn insert_user(&self, user: User) {
        write(&self.shared.catalog).users.insert(user.id, user);
    }

    /// Insert or replace an item
    pub fn insert_item(&self, item: Item) {
        write(&self.shared.catalog).items.insert(item.id, item);
    }

    /// Insert or replace a combine recipe
    pub fn insert_combine_recipe(&self, recipe: CombineRecipe) {
        write(&self.shared.catalog).combine_recipes.insert(recipe.id, recipe);
    }

    /// Insert or replace a decompose recipe
    pub fn insert_decompose_recipe(&self, recipe: DecomposeRecipe) {
        write(&self.shared.catalog).decompose_recipes.insert(recipe.id, recipe);
    }

    /// Gate a decompose recipe on a combine recipe's unlock
    pub fn associate(&self, decompose_recipe_id: RecipeId, combine_recipe_id: RecipeId) {
        write(&self.shared.catalog)
            .associations
            .insert(decompose_recipe_id, combine_recipe_id);
    }

    /// Mark a recipe unlocked for a user
    pub fn unlock(&self, user_id: UserId, recipe_id: RecipeId) {
        write(&self.shared.catalog).unlocks.insert((user_id, recipe_id));
    }

    /// Replace a user's committed inventory
    pub fn set_inventory(&self, user_id: UserId, inventory: Inventory) {
        write(&self.shared.inventories).insert(user_id, inventory);
    }

    // ===== Inspection =====

    /// Snapshot of a user's committed inventory
    pub fn inventory(&self, user_id: UserId) -> Inventory {
        read(&self.shared.inventories).get(&user_id).cloned().unwrap_or_default()
    }

    /// Number of transactions begun
    pub fn transaction_count(&self) -> u64 {
        self.shared.begun.load(Ordering::SeqCst)
    }

    /// Number of committed transactions
    pub fn commit_count(&self) -> u64 {
        self.shared.commits.load(Ordering::SeqCst)
    }

    /// Number of transactions rolled back, explicitly or by drop
    pub fn rollback_count(&self) -> u64 {
        self.shared.rollbacks.load(Ordering::SeqCst)
    }

    /// Users with a live lock registry entry
    pub fn tracked_locks(&self) -> usize {
        self.shared.locks.tracked_users()
    }

    /// Configure the next operation at `point` to fail.
    pub fn fail_next(&self, point: FailPoint) {
        self.shared.faults.flag(point).store(true, Ordering::SeqCst);
    }

    /// Clear all data (useful for test setup)
    pub fn clear(&self) {
        *write(&self.shared.catalog) = Catalog::default();
        write(&self.shared.inventories).clear();
    }

    fn check_lookup(&self) -> Result<(), StoreError> {
        if self.shared.faults.should_fail(FailPoint::Lookup) {
            return Err(StoreError::database("injected lookup failure"));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Repository Implementation
// =============================================================================

#[async_trait]
impl CraftingRepository for MemoryStore {
    async fn get_user_by_platform_id(
        &self,
        platform: Platform,
        platform_id: &str,
    ) -> Result<Option<User>, StoreError> {
        self.check_lookup()?;
        let catalog = read(&self.shared.catalog);
        Ok(catalog
            .users
            .values()
            .find(|u| u.platform == platform && u.platform_id == platform_id)
            .cloned())
    }

    async fn get_item_by_name(&self, name: &str) -> Result<Option<Item>, StoreError> {
        self.check_lookup()?;
        let catalog = read(&self.shared.catalog);
        Ok(catalog.items.values().find(|i| i.internal_name == name).cloned())
    }

    async fn get_item_by_id(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        self.check_lookup()?;
        Ok(read(&self.shared.catalog).items.get(&id).cloned())
    }

    async fn get_items_by_ids(&self, ids: &[ItemId]) -> Result<Vec<Item>, StoreError> {
        self.check_lookup()?;
        let catalog = read(&self.shared.catalog);
        Ok(ids.iter().filter_map(|id| catalog.items.get(id).cloned()).collect())
    }

    async fn get_recipe_by_target_item_id(
        &self,
        item_id: ItemId,
    ) -> Result<Option<CombineRecipe>, StoreError> {
        self.check_lookup()?;
        let catalog = read(&self.shared.catalog);
        Ok(catalog
            .combine_recipes
            .values()
            .find(|r| r.target_item_id == item_id)
            .cloned())
    }

    async fn get_decompose_recipe_by_source_item_id(
        &self,
        item_id: ItemId,
    ) -> Result<Option<DecomposeRecipe>, StoreError> {
        self.check_lookup()?;
        let catalog = read(&self.shared.catalog);
        Ok(catalog
            .decompose_recipes
            .values()
            .find(|r| r.source_item_id == item_id)
            .cloned())
    }

    async fn get_associated_combine_recipe_id(
        &self,
        decompose_recipe_id: RecipeId,
    ) -> Result<Option<RecipeId>, StoreError> {
        self.check_lookup()?;
        Ok(read(&self.shared.catalog).associations.get(&decompose_recipe_id).copied())
    }

    async fn is_recipe_unlocked(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
    ) -> Result<bool, StoreError> {
        self.check_lookup()?;
        Ok(read(&self.shared.catalog).unlocks.contains(&(user_id, recipe_id)))
    }

    async fn get_unlocked_recipes_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UnlockedRecipe>, StoreError> {
        self.check_lookup()?;
        let catalog = read(&self.shared.catalog);
        Ok(catalog
            .combine_recipes
            .values()
            .filter(|r| catalog.unlocks.contains(&(user_id, r.id)))
            .filter_map(|r| {
                catalog.items.get(&r.target_item_id).map(|item| UnlockedRecipe {
                    item_id: item.id,
                    item_name: item.internal_name.clone(),
                })
            })
            .collect())
    }

    async fn get_all_recipes(&self) -> Result<Vec<RecipeListing>, StoreError> {
        self.check_lookup()?;
        let catalog = read(&self.shared.catalog);
        Ok(catalog
            .combine_recipes
            .values()
            .filter_map(|r| {
                catalog.items.get(&r.target_item_id).map(|item| RecipeListing {
                    item_id: item.id,
                    item_name: item.internal_name.clone(),
                    description: item.description.clone(),
                    required_level: r.required_level,
                })
            })
            .collect())
    }

    async fn begin_transaction(&self) -> Result<Box<dyn InventoryTx>, StoreError> {
        if self.shared.faults.should_fail(FailPoint::Begin) {
            return Err(StoreError::Connection("injected begin failure".to_string()));
        }
        self.shared.begun.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryTx {
            shared: Arc::clone(&self.shared),
            locks: HashMap::new(),
            staged: HashMap::new(),
            finished: false,
        }))
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Transaction over [`MemoryStore`] inventories.
///
/// Holds per-user lock guards and staged inventories. Dropping it without
/// a successful commit discards the staged writes and releases the locks.
#[derive(Debug)]
pub struct MemoryTx {
    shared: Arc<Shared>,
    locks: HashMap<UserId, UserLockGuard>,
    staged: HashMap<UserId, Inventory>,
    finished: bool,
}

#[async_trait]
impl InventoryTx for MemoryTx {
    async fn read_inventory_locked(&mut self, user_id: UserId) -> Result<Inventory, StoreError> {
        if self.shared.faults.should_fail(FailPoint::Read) {
            return Err(StoreError::database("injected read failure"));
        }

        if !self.locks.contains_key(&user_id) {
            let guard = self.shared.locks.acquire(user_id).await?;
            self.locks.insert(user_id, guard);
        }

        if let Some(staged) = self.staged.get(&user_id) {
            return Ok(staged.clone());
        }
        Ok(read(&self.shared.inventories).get(&user_id).cloned().unwrap_or_default())
    }

    async fn write_inventory(
        &mut self,
        user_id: UserId,
        inventory: &Inventory,
    ) -> Result<(), StoreError> {
        if self.shared.faults.should_fail(FailPoint::Write) {
            return Err(StoreError::database("injected write failure"));
        }
        if !self.locks.contains_key(&user_id) {
            return Err(StoreError::NotLocked(user_id));
        }
        self.staged.insert(user_id, inventory.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = self;
        if this.shared.faults.should_fail(FailPoint::Commit) {
            // Drop discards the staged writes
            return Err(StoreError::database("injected commit failure"));
        }

        {
            let mut inventories = write(&this.shared.inventories);
            for (user_id, inventory) in this.staged.drain() {
                inventories.insert(user_id, inventory);
            }
        }

        this.finished = true;
        this.shared.commits.fetch_add(1, Ordering::SeqCst);
        debug!(users = this.locks.len(), "Transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        debug!(staged = self.staged.len(), "Transaction rolled back");
        Ok(())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
            if !self.staged.is_empty() {
                warn!(staged = self.staged.len(), "Discarding uncommitted inventory writes");
            }
        }
        // Lock guards drop after this, releasing the users
    }
}

// =============================================================================
// Tests
// =============================================================================
