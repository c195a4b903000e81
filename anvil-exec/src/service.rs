//! Crafting service: the transactional executor.
//!
//! Bridges the pure engine (planning, bonuses, quality) and the impure
//! store (locked inventory reads and atomic writes).
//!
//! # Flow
//!
//! ```text
//! resolve & validate ─► chance lookup ─► begin tx
//!   ─► read (lock) ─► plan ─► consume ─► roll ─► quality ─► add outputs
//!   ─► write ─► commit ─► emit event
//!          └──────── any error ────────► rollback
//! ```
//!
//! The transaction handle releases the user lock and discards staged
//! writes on drop, so a cancelled request future rolls back as well.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use anvil_domain::{
    CombineOutcome, CraftingEvent, DecomposeOutcome, Inventory, ItemId, RecipeInfo,
    RecipeListing, UnlockedRecipe, UserId, UserIdentity,
};
use anvil_engine::{
    average_quality, masterwork_yield, plan, roll_successes, salvage_outputs, units_needed,
    BonusRule, EngineError, RandomSource, ThreadRandom,
};
use anvil_store::{CraftingRepository, InventoryTx};

use crate::chance::{resolve_chance, ChanceSource};
use crate::config::CraftingConfig;
use crate::emitter::EventEmitter;
use crate::error::{CraftError, CraftResult, ShutdownError};
use crate::ports::{
    EventPublisher, LevelProvider, ModifierProvider, NamingResolver, Operation, OperationObserver,
};
use crate::resolver::{CombineRequest, DecomposeRequest, RecipeResolver};

// =============================================================================
// Transaction phase
// =============================================================================

/// Progress of one transaction, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPhase {
    /// Transaction open, nothing locked
    Idle,
    /// Inventory read under the user lock
    LockAcquired,
    /// In-memory inventory changed
    Mutated,
    /// Commit succeeded
    Committed,
    /// Rolled back
    RolledBack,
}

impl fmt::Display for TxPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxPhase::Idle => "idle",
            TxPhase::LockAcquired => "lock_acquired",
            TxPhase::Mutated => "mutated",
            TxPhase::Committed => "committed",
            TxPhase::RolledBack => "rolled_back",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Service
// =============================================================================

/// Combine and decompose operations over a crafting repository.
pub struct CraftingService<R: CraftingRepository> {
    repo: Arc<R>,
    resolver: RecipeResolver<R>,
    config: CraftingConfig,
    modifiers: Option<Arc<dyn ModifierProvider>>,
    rng: Arc<dyn RandomSource>,
    emitter: EventEmitter,
    observer: Option<Arc<dyn OperationObserver>>,
}

impl<R: CraftingRepository> CraftingService<R> {
    /// Create a service with no optional collaborators and a thread RNG.
    pub fn new(repo: Arc<R>, config: CraftingConfig) -> Self {
        let mut resolver = RecipeResolver::new(Arc::clone(&repo));
        resolver.set_job_key(config.job_key.clone());
        Self {
            repo,
            resolver,
            config,
            modifiers: None,
            rng: Arc::new(ThreadRandom),
            emitter: EventEmitter::new(None),
            observer: None,
        }
    }

    /// Look up bonus chances through `modifiers`.
    pub fn with_modifiers(mut self, modifiers: Arc<dyn ModifierProvider>) -> Self {
        self.modifiers = Some(modifiers);
        self
    }

    /// Resolve public item names through `naming`.
    pub fn with_naming(mut self, naming: Arc<dyn NamingResolver>) -> Self {
        self.resolver.set_naming(naming);
        self
    }

    /// Enforce recipe level requirements through `levels`.
    pub fn with_levels(mut self, levels: Arc<dyn LevelProvider>) -> Self {
        self.resolver.set_levels(levels);
        self
    }

    /// Emit committed events to `publisher`.
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.emitter = EventEmitter::new(Some(publisher));
        self
    }

    /// Use `rng` for bonus trials.
    pub fn with_random(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    /// Notify `observer` of completed operations.
    pub fn with_observer(mut self, observer: Arc<dyn OperationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &CraftingConfig {
        &self.config
    }

    /// Emission tasks still running
    pub fn pending_emissions(&self) -> usize {
        self.emitter.pending()
    }

    // ===== Transformations =====

    /// Combine inputs into `item_name`, as many units as affordable up to `quantity`.
    pub async fn combine(
        &self,
        identity: &UserIdentity,
        item_name: &str,
        quantity: u64,
    ) -> CraftResult<CombineOutcome> {
        info!(
            platform = %identity.platform,
            platform_id = %identity.platform_id,
            username = %identity.username,
            item = item_name,
            quantity,
            "Combine requested"
        );
        let result = self.run_combine(identity, item_name, quantity).await;
        self.observe(Operation::Combine, result.as_ref().err());
        result
    }

    /// Break `item_name` down into components, up to `quantity` times.
    pub async fn decompose(
        &self,
        identity: &UserIdentity,
        item_name: &str,
        quantity: u64,
    ) -> CraftResult<DecomposeOutcome> {
        info!(
            platform = %identity.platform,
            platform_id = %identity.platform_id,
            username = %identity.username,
            item = item_name,
            quantity,
            "Decompose requested"
        );
        let result = self.run_decompose(identity, item_name, quantity).await;
        self.observe(Operation::Decompose, result.as_ref().err());
        result
    }

    // ===== Queries =====

    /// Recipe for `item_name`; lock status is included when `identity` is given.
    pub async fn get_recipe(
        &self,
        item_name: &str,
        identity: Option<&UserIdentity>,
    ) -> CraftResult<RecipeInfo> {
        info!(item = item_name, with_user = identity.is_some(), "Recipe requested");

        let item = self.resolver.resolve_named_item(item_name).await?;
        let recipe = self
            .repo
            .get_recipe_by_target_item_id(item.id)
            .await?
            .ok_or_else(|| CraftError::RecipeNotFound(item_name.trim().to_string()))?;

        let locked = match identity {
            Some(identity) => {
                let user = self.resolver.resolve_identity(identity).await?;
                Some(!self.repo.is_recipe_unlocked(user.id, recipe.id).await?)
            },
            None => None,
        };

        debug!(item = item_name, ?locked, "Recipe retrieved");
        Ok(RecipeInfo {
            item_name: item_name.trim().to_string(),
            costs: recipe.costs,
            locked,
        })
    }

    /// Combine recipes the user has unlocked.
    pub async fn get_unlocked_recipes(
        &self,
        identity: &UserIdentity,
    ) -> CraftResult<Vec<UnlockedRecipe>> {
        let user = self.resolver.resolve_identity(identity).await?;
        let recipes = self.repo.get_unlocked_recipes_for_user(user.id).await?;
        info!(user_id = %user.id, count = recipes.len(), "Unlocked recipes retrieved");
        Ok(recipes)
    }

    /// Every combine recipe.
    pub async fn get_all_recipes(&self) -> CraftResult<Vec<RecipeListing>> {
        let recipes = self.repo.get_all_recipes().await?;
        debug!(count = recipes.len(), "All recipes retrieved");
        Ok(recipes)
    }

    /// Wait for in-flight event emissions, up to `deadline`.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), ShutdownError> {
        self.emitter.shutdown(deadline).await
    }

    // ===== Combine =====

    async fn run_combine(
        &self,
        identity: &UserIdentity,
        item_name: &str,
        quantity: u64,
    ) -> CraftResult<CombineOutcome> {
        let request = self.resolver.resolve_combine(identity, item_name, quantity).await?;
        let chance = self.chance_for(&self.config.masterwork).await;
        let user_id = request.user.id;

        let mut tx = self.begin(user_id).await?;
        let mut phase = TxPhase::Idle;
        let applied = self.apply_combine(tx.as_mut(), &request, chance, &mut phase).await;
        let outcome = match applied {
            Ok(outcome) => outcome,
            Err(e) => {
                self.rollback(tx, user_id, phase, &e).await;
                return Err(e);
            },
        };
        self.commit(tx, user_id).await?;

        if outcome.bonus_triggered {
            info!(
                %user_id,
                item = %outcome.item_name,
                count = outcome.bonus_count,
                bonus = outcome.bonus_quantity,
                "Masterwork craft triggered"
            );
            self.note_bonus(&self.config.masterwork, outcome.bonus_count);
        }

        self.emitter.emit(CraftingEvent::ItemCombined {
            user_id,
            item_name: outcome.item_name.clone(),
            quantity: outcome.quantity_crafted,
            recipe_key: recipe_key(&request.recipe.key, &request.item_name),
            is_masterwork: outcome.bonus_triggered,
            masterwork_count: outcome.bonus_count,
            bonus_quantity: outcome.bonus_quantity,
        });

        info!(
            %user_id,
            item = %outcome.item_name,
            crafted = outcome.quantity_crafted,
            produced = outcome.quantity_produced,
            quality = %outcome.quality,
            "Items combined"
        );
        Ok(outcome)
    }

    async fn apply_combine(
        &self,
        tx: &mut dyn InventoryTx,
        request: &CombineRequest,
        chance: f64,
        phase: &mut TxPhase,
    ) -> CraftResult<CombineOutcome> {
        let user_id = request.user.id;
        let mut inventory = self.read_locked(tx, user_id, phase).await?;

        let costs = request.recipe.cost_pairs();
        let crafted = plan(&inventory, request.requested, &costs)
            .map_err(|e| unaffordable(e, &inventory, &costs))?;
        if crafted < request.requested {
            debug!(%user_id, requested = request.requested, crafted, "Partial fulfillment");
        }

        let mut lots = Vec::new();
        for (item_id, per_unit) in &costs {
            lots.extend(inventory.consume_tracked(*item_id, units_needed(*per_unit, crafted))?);
        }
        *phase = TxPhase::Mutated;

        let quality = average_quality(&lots);
        let bonus_count = roll_successes(crafted, chance, self.rng.as_ref());
        let yielded = masterwork_yield(crafted, bonus_count, self.config.masterwork.multiplier);
        inventory.add(request.item.id, yielded.produced, quality);

        tx.write_inventory(user_id, &inventory)
            .await
            .map_err(CraftError::TransactionWriteFailed)?;

        Ok(CombineOutcome {
            item_name: request.item_name.clone(),
            quantity_crafted: crafted,
            quantity_produced: yielded.produced,
            bonus_triggered: yielded.bonus_count > 0,
            bonus_count: yielded.bonus_count,
            bonus_quantity: yielded.bonus_quantity,
            quality,
        })
    }

    // ===== Decompose =====

    async fn run_decompose(
        &self,
        identity: &UserIdentity,
        item_name: &str,
        quantity: u64,
    ) -> CraftResult<DecomposeOutcome> {
        let request = self.resolver.resolve_decompose(identity, item_name, quantity).await?;
        let chance = self.chance_for(&self.config.perfect_salvage).await;
        let user_id = request.user.id;

        let mut tx = self.begin(user_id).await?;
        let mut phase = TxPhase::Idle;
        let applied = self.apply_decompose(tx.as_mut(), &request, chance, &mut phase).await;
        let outcome = match applied {
            Ok(outcome) => outcome,
            Err(e) => {
                self.rollback(tx, user_id, phase, &e).await;
                return Err(e);
            },
        };
        self.commit(tx, user_id).await?;

        if outcome.bonus_triggered {
            info!(
                %user_id,
                item = %outcome.item_name,
                count = outcome.bonus_count,
                multiplier = %outcome.multiplier,
                "Perfect salvage triggered"
            );
            self.note_bonus(&self.config.perfect_salvage, outcome.bonus_count);
        }

        self.emitter.emit(CraftingEvent::ItemDecomposed {
            user_id,
            item_name: outcome.item_name.clone(),
            quantity: outcome.quantity_processed,
            recipe_key: recipe_key(&request.recipe.key, &request.item_name),
            is_perfect_salvage: outcome.bonus_triggered,
            perfect_salvage_count: outcome.bonus_count,
            multiplier: outcome.multiplier,
            outputs: outcome.outputs.clone(),
        });

        info!(
            %user_id,
            item = %outcome.item_name,
            processed = outcome.quantity_processed,
            outputs = ?outcome.outputs,
            "Item decomposed"
        );
        Ok(outcome)
    }

    async fn apply_decompose(
        &self,
        tx: &mut dyn InventoryTx,
        request: &DecomposeRequest,
        chance: f64,
        phase: &mut TxPhase,
    ) -> CraftResult<DecomposeOutcome> {
        let user_id = request.user.id;
        let mut inventory = self.read_locked(tx, user_id, phase).await?;

        let per_unit = request.recipe.quantity_consumed_per_unit;
        let costs = [(request.item.id, per_unit)];
        let processed = plan(&inventory, request.requested, &costs)
            .map_err(|e| unaffordable(e, &inventory, &costs))?;

        let consumed = units_needed(per_unit, processed);
        let lots = inventory.consume_tracked(request.item.id, consumed)?;
        *phase = TxPhase::Mutated;

        let quality = average_quality(&lots);
        let bonus_count = roll_successes(processed, chance, self.rng.as_ref());
        let multiplier = self.config.perfect_salvage.multiplier;
        let output_pairs: Vec<(ItemId, u64)> =
            request.recipe.outputs.iter().map(|o| (o.item_id, o.quantity)).collect();

        let mut outputs = BTreeMap::new();
        for (item_id, units) in salvage_outputs(&output_pairs, processed, bonus_count, multiplier) {
            inventory.add(item_id, units, quality);
            let name = request
                .output_name(item_id)
                .map_or_else(|| item_id.to_string(), str::to_string);
            let entry: &mut u64 = outputs.entry(name).or_default();
            *entry = entry.saturating_add(units);
        }

        tx.write_inventory(user_id, &inventory)
            .await
            .map_err(CraftError::TransactionWriteFailed)?;

        Ok(DecomposeOutcome {
            item_name: request.item_name.clone(),
            quantity_processed: processed,
            quantity_consumed: consumed,
            bonus_triggered: bonus_count > 0,
            bonus_count,
            outputs,
            multiplier,
            quality,
        })
    }

    // ===== Transaction helpers =====

    async fn begin(&self, user_id: UserId) -> CraftResult<Box<dyn InventoryTx>> {
        self.repo.begin_transaction().await.map_err(|e| {
            error!(%user_id, error = %e, "Failed to begin transaction");
            CraftError::TransactionBeginFailed(e)
        })
    }

    async fn read_locked(
        &self,
        tx: &mut dyn InventoryTx,
        user_id: UserId,
        phase: &mut TxPhase,
    ) -> CraftResult<Inventory> {
        let inventory = tx
            .read_inventory_locked(user_id)
            .await
            .map_err(CraftError::TransactionReadFailed)?;
        *phase = TxPhase::LockAcquired;
        debug!(%user_id, %phase, slots = inventory.slots().len(), "Inventory locked");
        Ok(inventory)
    }

    async fn commit(&self, tx: Box<dyn InventoryTx>, user_id: UserId) -> CraftResult<()> {
        if let Err(e) = tx.commit().await {
            error!(%user_id, error = %e, "Failed to commit transaction");
            return Err(CraftError::TransactionCommitFailed(e));
        }
        debug!(%user_id, phase = %TxPhase::Committed, "Transaction committed");
        Ok(())
    }

    async fn rollback(
        &self,
        tx: Box<dyn InventoryTx>,
        user_id: UserId,
        phase: TxPhase,
        cause: &CraftError,
    ) {
        warn!(%user_id, %phase, error = %cause, "Rolling back transaction");
        if let Err(e) = tx.rollback().await {
            // The handle is gone either way; drop discards staged writes
            warn!(%user_id, error = %e, "Rollback reported failure");
        }
        debug!(%user_id, phase = %TxPhase::RolledBack, "Transaction rolled back");
    }

    // ===== Bonus helpers =====

    async fn chance_for(&self, rule: &BonusRule) -> f64 {
        let key = &self.config.modifier_key;
        let resolved = resolve_chance(self.modifiers.as_deref(), key, rule.base_chance).await;

        if let ChanceSource::BaseAfterError(err) = &resolved.source {
            warn!(key = %key, bonus = %rule.kind, error = %err, "Modifier lookup failed, using base chance");
            if let Some(observer) = &self.observer {
                observer.on_modifier_fallback(key);
            }
        }
        resolved.chance
    }

    fn note_bonus(&self, rule: &BonusRule, count: u64) {
        if let Some(observer) = &self.observer {
            observer.on_bonus(rule.kind, count);
        }
    }

    fn observe(&self, operation: Operation, error: Option<&CraftError>) {
        if let Some(observer) = &self.observer {
            observer.on_operation(operation, error);
        }
    }
}

/// Recipe key, falling back to the requested item name.
fn recipe_key(key: &str, item_name: &str) -> String {
    if key.is_empty() {
        item_name.to_string()
    } else {
        key.to_string()
    }
}

/// Map a planner refusal to the caller-facing error.
fn unaffordable(err: EngineError, inventory: &Inventory, costs: &[(ItemId, u64)]) -> CraftError {
    match err {
        EngineError::Unaffordable { limiting_item } => CraftError::InsufficientQuantity {
            item_id: limiting_item,
            needed: costs
                .iter()
                .find(|(item_id, _)| *item_id == limiting_item)
                .map_or(0, |(_, per_unit)| *per_unit),
            available: inventory.total_quantity(limiting_item),
        },
        EngineError::NothingRequested => CraftError::InvalidQuantity(0),
        EngineError::MalformedCosts => {
            CraftError::InvalidInput("recipe has no usable costs".to_string())
        },
    }
}

// =============================================================================
// Tests
// =============================================================================
