//! Probabilistic Outcome Engine.
//!
//! Two bonus kinds share one mechanism: one independent Bernoulli trial per
//! unit processed, succeeding iff `roll < chance`.
//!
//! # Architecture
//!
//! ```text
//! chance (modifier or base) ──┐
//!                             ├─► roll_successes ─► bonus_count
//! RandomSource ───────────────┘          │
//!                                        ▼
//!                 masterwork_yield / salvage_outputs
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use anvil_domain::ItemId;

use crate::random::RandomSource;

// =============================================================================
// Bonus rules
// =============================================================================

/// Base Masterwork chance per combined unit.
pub const MASTERWORK_BASE_CHANCE: f64 = 0.10;

/// Base Perfect-Salvage chance per decomposed unit.
pub const PERFECT_SALVAGE_BASE_CHANCE: f64 = 0.10;

/// Kind of bonus a trial can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BonusKind {
    /// Combine bonus: a successful unit yields `multiplier` units
    Masterwork,
    /// Decompose bonus: a successful unit yields `ceil(per_unit × multiplier)`
    PerfectSalvage,
}

impl BonusKind {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            BonusKind::Masterwork => "masterwork",
            BonusKind::PerfectSalvage => "perfect_salvage",
        }
    }
}

impl std::fmt::Display for BonusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Chance and multiplier for one bonus kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonusRule {
    /// Bonus kind
    pub kind: BonusKind,
    /// Chance used when no modifier overrides it
    pub base_chance: f64,
    /// Output multiplier on success
    pub multiplier: Decimal,
}

impl BonusRule {
    /// Masterwork: 10%, ×2
    pub fn masterwork() -> Self {
        Self {
            kind: BonusKind::Masterwork,
            base_chance: MASTERWORK_BASE_CHANCE,
            multiplier: dec!(2),
        }
    }

    /// Perfect-Salvage: 10%, ×1.5 rounded up
    pub fn perfect_salvage() -> Self {
        Self {
            kind: BonusKind::PerfectSalvage,
            base_chance: PERFECT_SALVAGE_BASE_CHANCE,
            multiplier: dec!(1.5),
        }
    }

    /// Override the base chance
    pub fn with_base_chance(mut self, base_chance: f64) -> Self {
        self.base_chance = base_chance;
        self
    }
}

// =============================================================================
// Trials
// =============================================================================

/// Run `trials` independent trials and count successes.
///
/// A trial succeeds iff the roll is strictly below `chance`, so a chance of
/// 0 never triggers and a chance of 1 always does.
pub fn roll_successes(trials: u64, chance: f64, rng: &dyn RandomSource) -> u64 {
    if chance <= 0.0 || chance.is_nan() {
        return 0;
    }

    let mut successes = 0u64;
    for _ in 0..trials {
        if rng.next_f64() < chance {
            successes += 1;
        }
    }

    debug!(trials, chance, successes, "Bonus trials rolled");
    successes
}

// =============================================================================
// Yields
// =============================================================================

/// Units produced by a combine after Masterwork.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterworkYield {
    /// Total units to add to the inventory
    pub produced: u64,
    /// Successful trials
    pub bonus_count: u64,
    /// `produced - crafted`
    pub bonus_quantity: u64,
}

/// Ceiling of `units × multiplier`, saturating at `u64::MAX`.
pub fn scaled_units(units: u64, multiplier: Decimal) -> u64 {
    Decimal::from(units)
        .checked_mul(multiplier)
        .map(|scaled| scaled.ceil())
        .and_then(|scaled| scaled.to_u64())
        .unwrap_or(u64::MAX)
}

/// Combine yield: each success yields `multiplier` units instead of 1.
pub fn masterwork_yield(crafted: u64, bonus_count: u64, multiplier: Decimal) -> MasterworkYield {
    let bonus_count = bonus_count.min(crafted);
    let regular = crafted - bonus_count;
    let boosted = scaled_units(1, multiplier).saturating_mul(bonus_count);
    let produced = regular.saturating_add(boosted);

    MasterworkYield {
        produced,
        bonus_count,
        bonus_quantity: produced.saturating_sub(crafted),
    }
}

/// Units of one decompose output after Perfect-Salvage.
///
/// `regular = per_unit × (processed - bonus)`,
/// `bonus = ceil(per_unit × multiplier) × bonus`.
pub fn salvage_units(per_unit: u64, processed: u64, bonus_count: u64, multiplier: Decimal) -> u64 {
    let bonus_count = bonus_count.min(processed);
    let regular = per_unit.saturating_mul(processed - bonus_count);
    let boosted = scaled_units(per_unit, multiplier).saturating_mul(bonus_count);
    regular.saturating_add(boosted)
}

/// Apply [`salvage_units`] to every output line, rounding per line.
pub fn salvage_outputs(
    outputs: &[(ItemId, u64)],
    processed: u64,
    bonus_count: u64,
    multiplier: Decimal,
) -> Vec<(ItemId, u64)> {
    outputs
        .iter()
        .map(|(item_id, per_unit)| {
            (*item_id, salvage_units(*per_unit, processed, bonus_count, multiplier))
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
