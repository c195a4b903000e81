//! Results of committed transformations.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::value_objects::QualityLevel;

/// Result of a committed combine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombineOutcome {
    /// Name of the produced item, as requested by the caller
    pub item_name: String,
    /// Units consumed from the plan (crafts performed)
    pub quantity_crafted: u64,
    /// Units added to the inventory, bonus included
    pub quantity_produced: u64,
    /// True when at least one Masterwork trial succeeded
    pub bonus_triggered: bool,
    /// Number of successful Masterwork trials
    pub bonus_count: u64,
    /// Extra units produced by Masterwork (`produced - crafted`)
    pub bonus_quantity: u64,
    /// Quality assigned to the produced stack
    pub quality: QualityLevel,
}

/// Result of a committed decompose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecomposeOutcome {
    /// Name of the decomposed item, as requested by the caller
    pub item_name: String,
    /// Decompositions performed
    pub quantity_processed: u64,
    /// Source units removed from the inventory
    pub quantity_consumed: u64,
    /// True when at least one Perfect-Salvage trial succeeded
    pub bonus_triggered: bool,
    /// Number of successful Perfect-Salvage trials
    pub bonus_count: u64,
    /// Output internal name → units added
    pub outputs: BTreeMap<String, u64>,
    /// Perfect-Salvage multiplier in effect
    pub multiplier: Decimal,
    /// Quality assigned to every produced stack
    pub quality: QualityLevel,
}
