//! Quantity Planner.
//!
//! Computes how many units of a recipe the current inventory snapshot can
//! pay for:
//!
//! ```text
//! affordable = min(requested, min_k floor(stock_k / cost_k))
//! ```
//!
//! A short plan is a success; only a zero plan is an error.

use anvil_domain::{Inventory, ItemId};

use crate::error::{EngineError, EngineResult};

/// Maximum units affordable, capped by `requested`.
///
/// Zero-cost lines are skipped here and rejected by [`plan`].
pub fn affordable_quantity(inventory: &Inventory, requested: u64, costs: &[(ItemId, u64)]) -> u64 {
    costs
        .iter()
        .filter(|(_, per_unit)| *per_unit > 0)
        .map(|(item_id, per_unit)| inventory.total_quantity(*item_id) / per_unit)
        .fold(requested, u64::min)
}

/// Plan a transformation, failing when not even one unit is affordable.
///
/// # Errors
/// - `EngineError::NothingRequested` if `requested == 0`
/// - `EngineError::MalformedCosts` if `costs` is empty or a line costs zero,
///   since such a plan would produce without consuming
/// - `EngineError::Unaffordable` naming the first limiting cost line
pub fn plan(inventory: &Inventory, requested: u64, costs: &[(ItemId, u64)]) -> EngineResult<u64> {
    if requested == 0 {
        return Err(EngineError::NothingRequested);
    }
    if costs.is_empty() || costs.iter().any(|(_, per_unit)| *per_unit == 0) {
        return Err(EngineError::MalformedCosts);
    }

    let affordable = affordable_quantity(inventory, requested, costs);
    if affordable == 0 {
        let limiting_item = costs
            .iter()
            .find(|(item_id, per_unit)| inventory.total_quantity(*item_id) < *per_unit)
            .map_or(0, |(item_id, _)| *item_id);
        return Err(EngineError::Unaffordable { limiting_item });
    }

    Ok(affordable)
}

/// Units of one cost line needed for `units` crafts.
pub fn units_needed(per_unit: u64, units: u64) -> u64 {
    per_unit.saturating_mul(units)
}

// =============================================================================
// Tests
// =============================================================================
