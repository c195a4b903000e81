//! Recipe Resolver & Validator.
//!
//! Turns raw caller input into resolved entities before any transaction
//! opens. Every failure here leaves nothing to clean up.
//!
//! # Order
//!
//! ```text
//! quantity → platform → item name            (input checks, no I/O)
//!   → name resolution → user → item → recipe → unlock → level
//! ```

use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, warn};

use anvil_domain::{
    CombineRecipe, DecomposeRecipe, DomainError, Item, ItemId, Platform, User, UserIdentity,
};
use anvil_store::CraftingRepository;

use crate::error::{CraftError, CraftResult, LockReason};
use crate::ports::{LevelProvider, NamingResolver};

/// Job whose level gates combine recipes.
pub const DEFAULT_JOB_KEY: &str = "blacksmith";

/// Validated combine request.
#[derive(Debug, Clone)]
pub struct CombineRequest {
    /// Owner of the inventory
    pub user: User,
    /// Item to produce
    pub item: Item,
    /// Name as given by the caller (trimmed)
    pub item_name: String,
    /// Recipe producing `item`
    pub recipe: CombineRecipe,
    /// Units requested
    pub requested: u64,
}

/// Validated decompose request.
#[derive(Debug, Clone)]
pub struct DecomposeRequest {
    /// Owner of the inventory
    pub user: User,
    /// Item to break down
    pub item: Item,
    /// Name as given by the caller (trimmed)
    pub item_name: String,
    /// Recipe consuming `item`
    pub recipe: DecomposeRecipe,
    /// Output items, keyed by id
    pub outputs: Vec<Item>,
    /// Units requested
    pub requested: u64,
}

impl DecomposeRequest {
    /// Internal name of an output item
    pub fn output_name(&self, item_id: ItemId) -> Option<&str> {
        self.outputs
            .iter()
            .find(|item| item.id == item_id)
            .map(|item| item.internal_name.as_str())
    }
}

/// Resolves and validates requests against the repository and collaborators.
pub struct RecipeResolver<R: CraftingRepository> {
    repo: Arc<R>,
    naming: Option<Arc<dyn NamingResolver>>,
    levels: Option<Arc<dyn LevelProvider>>,
    job_key: String,
}

impl<R: CraftingRepository> RecipeResolver<R> {
    /// Create a resolver with no optional collaborators.
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            repo,
            naming: None,
            levels: None,
            job_key: DEFAULT_JOB_KEY.to_string(),
        }
    }

    /// Resolve public names through `naming` first.
    pub fn set_naming(&mut self, naming: Arc<dyn NamingResolver>) {
        self.naming = Some(naming);
    }

    /// Gate level-restricted recipes through `levels`.
    pub fn set_levels(&mut self, levels: Arc<dyn LevelProvider>) {
        self.levels = Some(levels);
    }

    /// Job key used for level checks.
    pub fn set_job_key(&mut self, job_key: impl Into<String>) {
        self.job_key = job_key.into();
    }

    // ===== Operations =====

    /// Validate and resolve a combine request.
    pub async fn resolve_combine(
        &self,
        identity: &UserIdentity,
        item_name: &str,
        quantity: u64,
    ) -> CraftResult<CombineRequest> {
        let (platform, item_name) = validate_input(identity, item_name, quantity)?;
        let (resolved_name, cached) = self.resolve_item_name(item_name).await?;
        let user = self.resolve_user(platform, identity).await?;
        let item = self.resolve_item(&resolved_name, cached).await?;

        let recipe = self
            .repo
            .get_recipe_by_target_item_id(item.id)
            .await?
            .ok_or_else(|| CraftError::RecipeNotFound(item_name.to_string()))?;
        reject_malformed(recipe.validate(), item_name)?;

        self.check_unlocked(&user, Some(recipe.id), item_name).await?;

        if let Some(required) = recipe.required_level {
            self.check_level(&user, required, item_name).await?;
        }

        Ok(CombineRequest {
            user,
            item,
            item_name: item_name.to_string(),
            recipe,
            requested: quantity,
        })
    }

    /// Validate and resolve a decompose request.
    ///
    /// Unlock is checked against the associated combine recipe; a missing
    /// association counts as locked.
    pub async fn resolve_decompose(
        &self,
        identity: &UserIdentity,
        item_name: &str,
        quantity: u64,
    ) -> CraftResult<DecomposeRequest> {
        let (platform, item_name) = validate_input(identity, item_name, quantity)?;
        let (resolved_name, cached) = self.resolve_item_name(item_name).await?;
        let user = self.resolve_user(platform, identity).await?;
        let item = self.resolve_item(&resolved_name, cached).await?;

        let recipe = self
            .repo
            .get_decompose_recipe_by_source_item_id(item.id)
            .await?
            .ok_or_else(|| CraftError::RecipeNotFound(item_name.to_string()))?;
        reject_malformed(recipe.validate(), item_name)?;

        let associated = self.repo.get_associated_combine_recipe_id(recipe.id).await?;
        self.check_unlocked(&user, associated, item_name).await?;

        let output_ids = recipe.output_item_ids();
        let outputs = self.repo.get_items_by_ids(&output_ids).await?;
        if let Some(missing) = output_ids.iter().find(|id| !outputs.iter().any(|i| i.id == **id)) {
            return Err(CraftError::ItemNotFound(format!("output item {}", missing)));
        }

        Ok(DecomposeRequest {
            user,
            item,
            item_name: item_name.to_string(),
            recipe,
            outputs,
            requested: quantity,
        })
    }

    /// Resolve the caller's identity to a user.
    pub async fn resolve_identity(&self, identity: &UserIdentity) -> CraftResult<User> {
        let platform = validate_platform(identity)?;
        self.resolve_user(platform, identity).await
    }

    /// Resolve a name to an item, through the naming resolver when present.
    pub async fn resolve_named_item(&self, item_name: &str) -> CraftResult<Item> {
        let item_name = validate_item_name(item_name)?;
        let (resolved_name, cached) = self.resolve_item_name(item_name).await?;
        self.resolve_item(&resolved_name, cached).await
    }

    // ===== Steps =====

    /// Map a caller-supplied name to an internal name.
    ///
    /// Returns the item too when the fallback path already fetched it.
    async fn resolve_item_name(&self, item_name: &str) -> CraftResult<(String, Option<Item>)> {
        if let Some(naming) = &self.naming {
            if let Some(internal) = naming.resolve_public_name(item_name).await {
                debug!(public = item_name, internal = %internal, "Resolved public item name");
                return Ok((internal, None));
            }
        }

        match self.repo.get_item_by_name(item_name).await? {
            Some(item) => Ok((item_name.to_string(), Some(item))),
            None => Err(CraftError::ItemNotFound(item_name.to_string())),
        }
    }

    async fn resolve_user(&self, platform: Platform, identity: &UserIdentity) -> CraftResult<User> {
        self.repo
            .get_user_by_platform_id(platform, &identity.platform_id)
            .await?
            .ok_or_else(|| CraftError::UserNotFound {
                platform: identity.platform.clone(),
                platform_id: identity.platform_id.clone(),
            })
    }

    async fn resolve_item(&self, resolved_name: &str, cached: Option<Item>) -> CraftResult<Item> {
        if let Some(item) = cached {
            return Ok(item);
        }
        self.repo
            .get_item_by_name(resolved_name)
            .await?
            .ok_or_else(|| CraftError::ItemNotFound(resolved_name.to_string()))
    }

    async fn check_unlocked(
        &self,
        user: &User,
        recipe_id: Option<anvil_domain::RecipeId>,
        item_name: &str,
    ) -> CraftResult<()> {
        let unlocked = match recipe_id {
            Some(recipe_id) => self.repo.is_recipe_unlocked(user.id, recipe_id).await?,
            None => false,
        };

        if !unlocked {
            return Err(CraftError::RecipeLocked {
                item_name: item_name.to_string(),
                reason: LockReason::NotUnlocked,
            });
        }
        Ok(())
    }

    async fn check_level(&self, user: &User, required: u32, item_name: &str) -> CraftResult<()> {
        let Some(levels) = &self.levels else {
            warn!(user_id = %user.id, required, "No level provider configured, skipping level check");
            return Ok(());
        };

        let locked = |reason| CraftError::RecipeLocked { item_name: item_name.to_string(), reason };

        match levels.get_job_level(user.id, &self.job_key).await {
            Ok(actual) if actual >= required => Ok(()),
            Ok(actual) => Err(locked(LockReason::LevelTooLow { required, actual })),
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Failed to check job level");
                Err(locked(LockReason::LevelUnverified(e.to_string())))
            },
        }
    }
}

// =============================================================================
// Input checks
// =============================================================================

/// Check raw input in order: quantity, platform, item name.
fn validate_input<'a>(
    identity: &UserIdentity,
    item_name: &'a str,
    quantity: u64,
) -> CraftResult<(Platform, &'a str)> {
    if quantity == 0 {
        return Err(CraftError::InvalidQuantity(quantity));
    }
    let platform = validate_platform(identity)?;
    let item_name = validate_item_name(item_name)?;
    Ok((platform, item_name))
}

/// A stored recipe that breaks its invariants is refused rather than
/// planned, since it could produce without consuming.
fn reject_malformed(checked: Result<(), DomainError>, item_name: &str) -> CraftResult<()> {
    checked.map_err(|e| {
        warn!(item = item_name, error = %e, "Refusing malformed recipe");
        CraftError::InvalidInput(e.to_string())
    })
}

fn validate_platform(identity: &UserIdentity) -> CraftResult<Platform> {
    if identity.platform.is_empty() || identity.platform_id.is_empty() {
        return Err(CraftError::InvalidInput("platform and platform_id are required".to_string()));
    }
    Platform::from_str(&identity.platform)
        .map_err(|_| CraftError::InvalidPlatform(identity.platform.clone()))
}

fn validate_item_name(item_name: &str) -> CraftResult<&str> {
    let trimmed = item_name.trim();
    if trimmed.is_empty() {
        return Err(CraftError::InvalidInput("item name is required".to_string()));
    }
    Ok(trimmed)
}

// =============================================================================
// Tests
// =============================================================================
