//! Crafting service configuration.

use anvil_engine::BonusRule;

use crate::resolver::DEFAULT_JOB_KEY;

/// Modifier key shared by both bonus kinds.
pub const DEFAULT_MODIFIER_KEY: &str = "crafting_success_rate";

/// Tunables for [`CraftingService`](crate::CraftingService).
#[derive(Debug, Clone, PartialEq)]
pub struct CraftingConfig {
    /// Combine bonus
    pub masterwork: BonusRule,
    /// Decompose bonus
    pub perfect_salvage: BonusRule,
    /// Modifier key looked up for bonus chances
    pub modifier_key: String,
    /// Job whose level gates recipes
    pub job_key: String,
}

impl CraftingConfig {
    /// Configuration with both bonus chances forced to zero.
    pub fn without_bonuses() -> Self {
        let defaults = Self::default();
        Self {
            masterwork: defaults.masterwork.with_base_chance(0.0),
            perfect_salvage: defaults.perfect_salvage.with_base_chance(0.0),
            ..defaults
        }
    }
}

impl Default for CraftingConfig {
    fn default() -> Self {
        Self {
            masterwork: BonusRule::masterwork(),
            perfect_salvage: BonusRule::perfect_salvage(),
            modifier_key: DEFAULT_MODIFIER_KEY.to_string(),
            job_key: DEFAULT_JOB_KEY.to_string(),
        }
    }
}
