//! Recipe definitions.
//!
//! Recipes are configuration data loaded by an external loader. This
//! crate only validates their shape, both in the constructors and when a
//! recipe is deserialized.

use serde::{Deserialize, Serialize};

use crate::entities::{ItemId, RecipeId};
use crate::value_objects::DomainError;

/// One input line of a combine recipe: `quantity` units of `item_id` per
/// unit produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeCost {
    pub item_id: ItemId,
    pub quantity: u64,
}

/// One output line of a decompose recipe: `quantity` units of `item_id`
/// per unit decomposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeOutput {
    pub item_id: ItemId,
    pub quantity: u64,
}

// =============================================================================
// Combine
// =============================================================================

/// Recipe turning several inputs into one more valuable target item.
///
/// # Invariants
/// - `costs` is non-empty
/// - every cost quantity is > 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CombineRecipeRecord")]
pub struct CombineRecipe {
    pub id: RecipeId,
    pub target_item_id: ItemId,
    pub costs: Vec<RecipeCost>,
    /// Minimum job level needed to use this recipe
    pub required_level: Option<u32>,
    /// Stable configuration key (may be empty for legacy rows)
    pub key: String,
}

impl CombineRecipe {
    /// Create a validated combine recipe
    ///
    /// # Errors
    /// Returns `DomainError::InvalidRecipe` if costs are empty or any cost
    /// quantity is zero.
    pub fn new(
        id: RecipeId,
        target_item_id: ItemId,
        costs: Vec<RecipeCost>,
        key: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let recipe = Self {
            id,
            target_item_id,
            costs,
            required_level: None,
            key: key.into(),
        };
        recipe.validate()?;
        Ok(recipe)
    }

    /// Check the recipe invariants.
    ///
    /// Fields are public, so callers holding a recipe they did not build
    /// should re-check before trusting it.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.costs.is_empty() {
            return Err(DomainError::InvalidRecipe(format!(
                "combine recipe {} has no costs",
                self.id
            )));
        }
        if let Some(cost) = self.costs.iter().find(|c| c.quantity == 0) {
            return Err(DomainError::InvalidRecipe(format!(
                "combine recipe {} has zero cost for item {}",
                self.id, cost.item_id
            )));
        }
        Ok(())
    }

    /// Require a minimum job level
    pub fn with_required_level(mut self, level: u32) -> Self {
        self.required_level = Some(level);
        self
    }

    /// (item, per-unit cost) pairs for affordability planning
    pub fn cost_pairs(&self) -> Vec<(ItemId, u64)> {
        self.costs.iter().map(|c| (c.item_id, c.quantity)).collect()
    }
}

// =============================================================================
// Decompose
// =============================================================================

/// Recipe breaking one source item into component outputs.
///
/// Has no unlock state of its own: unlock is checked against the
/// associated combine recipe.
///
/// # Invariants
/// - `quantity_consumed_per_unit` is > 0
/// - `outputs` is non-empty and every output quantity is > 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DecomposeRecipeRecord")]
pub struct DecomposeRecipe {
    pub id: RecipeId,
    pub source_item_id: ItemId,
    /// Source units consumed per decomposition
    pub quantity_consumed_per_unit: u64,
    pub outputs: Vec<RecipeOutput>,
    pub key: String,
}

impl DecomposeRecipe {
    /// Create a validated decompose recipe
    ///
    /// # Errors
    /// Returns `DomainError::InvalidRecipe` if the consumed quantity is zero,
    /// outputs are empty, or any output quantity is zero.
    pub fn new(
        id: RecipeId,
        source_item_id: ItemId,
        quantity_consumed_per_unit: u64,
        outputs: Vec<RecipeOutput>,
        key: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let recipe = Self {
            id,
            source_item_id,
            quantity_consumed_per_unit,
            outputs,
            key: key.into(),
        };
        recipe.validate()?;
        Ok(recipe)
    }

    /// Check the recipe invariants.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.quantity_consumed_per_unit == 0 {
            return Err(DomainError::InvalidRecipe(format!(
                "decompose recipe {} consumes zero units",
                self.id
            )));
        }
        if self.outputs.is_empty() || self.outputs.iter().any(|o| o.quantity == 0) {
            return Err(DomainError::InvalidRecipe(format!(
                "decompose recipe {} needs positive outputs",
                self.id
            )));
        }
        Ok(())
    }

    /// Output item ids, in recipe order
    pub fn output_item_ids(&self) -> Vec<ItemId> {
        self.outputs.iter().map(|o| o.item_id).collect()
    }
}

// =============================================================================
// Wire records
// =============================================================================

/// Unchecked shape of a serialized combine recipe.
#[derive(Deserialize)]
struct CombineRecipeRecord {
    id: RecipeId,
    target_item_id: ItemId,
    costs: Vec<RecipeCost>,
    #[serde(default)]
    required_level: Option<u32>,
    #[serde(default)]
    key: String,
}

impl TryFrom<CombineRecipeRecord> for CombineRecipe {
    type Error = DomainError;

    fn try_from(record: CombineRecipeRecord) -> Result<Self, Self::Error> {
        let recipe = CombineRecipe::new(record.id, record.target_item_id, record.costs, record.key)?;
        Ok(CombineRecipe { required_level: record.required_level, ..recipe })
    }
}

/// Unchecked shape of a serialized decompose recipe.
#[derive(Deserialize)]
struct DecomposeRecipeRecord {
    id: RecipeId,
    source_item_id: ItemId,
    quantity_consumed_per_unit: u64,
    outputs: Vec<RecipeOutput>,
    #[serde(default)]
    key: String,
}

impl TryFrom<DecomposeRecipeRecord> for DecomposeRecipe {
    type Error = DomainError;

    fn try_from(record: DecomposeRecipeRecord) -> Result<Self, Self::Error> {
        DecomposeRecipe::new(
            record.id,
            record.source_item_id,
            record.quantity_consumed_per_unit,
            record.outputs,
            record.key,
        )
    }
}

// =============================================================================
// Read models
// =============================================================================

/// Recipe lookup result, with lock status when a user was given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeInfo {
    pub item_name: String,
    pub costs: Vec<RecipeCost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
}

/// A recipe a user has unlocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockedRecipe {
    pub item_id: ItemId,
    pub item_name: String,
}

/// Catalogue entry for a combine recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeListing {
    pub item_id: ItemId,
    pub item_name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_level: Option<u32>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_recipe_validation() {
        assert!(CombineRecipe::new(1, 10, vec![], "empty").is_err());
        assert!(
            CombineRecipe::new(1, 10, vec![RecipeCost { item_id: 2, quantity: 0 }], "zero").is_err()
        );

        let recipe =
            CombineRecipe::new(1, 10, vec![RecipeCost { item_id: 2, quantity: 3 }], "ok").unwrap();
        assert_eq!(recipe.cost_pairs(), vec![(2, 3)]);
        assert_eq!(recipe.required_level, None);
        assert_eq!(recipe.with_required_level(5).required_level, Some(5));
    }

    #[test]
    fn test_decompose_recipe_validation() {
        let outputs = vec![RecipeOutput { item_id: 2, quantity: 1 }];
        assert!(DecomposeRecipe::new(1, 10, 0, outputs.clone(), "k").is_err());
        assert!(DecomposeRecipe::new(1, 10, 1, vec![], "k").is_err());

        let recipe = DecomposeRecipe::new(1, 10, 1, outputs, "k").unwrap();
        assert_eq!(recipe.output_item_ids(), vec![2]);
    }

    #[test]
    fn test_deserialized_recipes_are_checked() {
        let no_costs = r#"{"id": 1, "target_item_id": 10, "costs": [], "key": "k"}"#;
        assert!(serde_json::from_str::<CombineRecipe>(no_costs).is_err());

        let zero_cost = r#"{"id": 1, "target_item_id": 10, "costs": [{"item_id": 2, "quantity": 0}]}"#;
        assert!(serde_json::from_str::<CombineRecipe>(zero_cost).is_err());

        let zero_consumed = r#"{
            "id": 2, "source_item_id": 10, "quantity_consumed_per_unit": 0,
            "outputs": [{"item_id": 2, "quantity": 1}], "key": "k"
        }"#;
        assert!(serde_json::from_str::<DecomposeRecipe>(zero_consumed).is_err());

        let no_outputs =
            r#"{"id": 2, "source_item_id": 10, "quantity_consumed_per_unit": 1, "outputs": []}"#;
        assert!(serde_json::from_str::<DecomposeRecipe>(no_outputs).is_err());
    }

    #[test]
    fn test_valid_recipe_survives_serde() {
        let recipe = CombineRecipe::new(1, 10, vec![RecipeCost { item_id: 2, quantity: 3 }], "ok")
            .unwrap()
            .with_required_level(4);
        let json = serde_json::to_string(&recipe).unwrap();
        assert_eq!(serde_json::from_str::<CombineRecipe>(&json).unwrap(), recipe);

        // Legacy rows may omit the key and level
        let legacy = r#"{"id": 1, "target_item_id": 10, "costs": [{"item_id": 2, "quantity": 1}]}"#;
        let parsed: CombineRecipe = serde_json::from_str(legacy).unwrap();
        assert_eq!(parsed.key, "");
        assert_eq!(parsed.required_level, None);
    }

    #[test]
    fn test_validate_catches_mutated_fields() {
        let mut recipe =
            DecomposeRecipe::new(1, 10, 2, vec![RecipeOutput { item_id: 2, quantity: 1 }], "k")
                .unwrap();
        assert!(recipe.validate().is_ok());
        recipe.quantity_consumed_per_unit = 0;
        assert!(matches!(recipe.validate(), Err(DomainError::InvalidRecipe(_))));
    }
}
