//! User inventory with slot invariants.
//!
//! # Invariants
//! - At most one slot per (item_id, quality_level)
//! - A slot is removed as soon as its quantity reaches zero
//! - Quantities are unsigned and never underflow

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entities::ItemId;
use crate::value_objects::{DomainError, QualityLevel};

/// One (item, quality) stack inside an inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub item_id: ItemId,
    pub quantity: u64,
    #[serde(default)]
    pub quality_level: QualityLevel,
}

impl Slot {
    /// Create a slot
    pub fn new(item_id: ItemId, quantity: u64, quality_level: QualityLevel) -> Self {
        Self { item_id, quantity, quality_level }
    }
}

/// Units removed from a single slot while consuming an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedLot {
    pub item_id: ItemId,
    pub quality_level: QualityLevel,
    pub quantity: u64,
}

/// A user's inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Slot>", into = "Vec<Slot>")]
pub struct Inventory {
    slots: Vec<Slot>,
}

impl Inventory {
    /// Create an empty inventory
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an inventory from raw slots, merging duplicates and
    /// dropping empty stacks.
    pub fn from_slots(slots: impl IntoIterator<Item = Slot>) -> Self {
        let mut inventory = Self::new();
        for slot in slots {
            inventory.add(slot.item_id, slot.quantity, slot.quality_level);
        }
        inventory
    }

    /// All slots, in insertion order
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// True when the inventory holds nothing
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Total units of an item across all quality tiers
    pub fn total_quantity(&self, item_id: ItemId) -> u64 {
        self.slots
            .iter()
            .filter(|s| s.item_id == item_id)
            .fold(0u64, |acc, s| acc.saturating_add(s.quantity))
    }

    /// Units held in the exact (item, quality) slot
    pub fn quantity_of(&self, item_id: ItemId, quality_level: QualityLevel) -> u64 {
        self.slots
            .iter()
            .find(|s| s.item_id == item_id && s.quality_level == quality_level)
            .map_or(0, |s| s.quantity)
    }

    /// Totals per item, ignoring quality
    pub fn totals(&self) -> BTreeMap<ItemId, u64> {
        let mut totals = BTreeMap::new();
        for slot in &self.slots {
            let entry = totals.entry(slot.item_id).or_insert(0u64);
            *entry = entry.saturating_add(slot.quantity);
        }
        totals
    }

    /// Add units to the slot matching both item and quality, or open a
    /// new slot. Adding zero units is a no-op.
    pub fn add(&mut self, item_id: ItemId, quantity: u64, quality_level: QualityLevel) {
        if quantity == 0 {
            return;
        }
        match self
            .slots
            .iter_mut()
            .find(|s| s.item_id == item_id && s.quality_level == quality_level)
        {
            Some(slot) => slot.quantity = slot.quantity.saturating_add(quantity),
            None => self.slots.push(Slot::new(item_id, quantity, quality_level)),
        }
    }

    /// Remove `needed` units of an item, lowest quality tier first, and
    /// report what was taken from each tier.
    ///
    /// # Errors
    /// Returns `DomainError::InsufficientQuantity` without touching the
    /// inventory when fewer than `needed` units are held.
    pub fn consume_tracked(
        &mut self,
        item_id: ItemId,
        needed: u64,
    ) -> Result<Vec<ConsumedLot>, DomainError> {
        let available = self.total_quantity(item_id);
        if available < needed {
            return Err(DomainError::InsufficientQuantity { item_id, needed, available });
        }

        let mut order: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.item_id == item_id)
            .map(|(i, _)| i)
            .collect();
        order.sort_by_key(|&i| self.slots[i].quality_level);

        let mut remaining = needed;
        let mut lots = Vec::new();
        for index in order {
            if remaining == 0 {
                break;
            }
            let slot = &mut self.slots[index];
            let taken = slot.quantity.min(remaining);
            slot.quantity -= taken;
            remaining -= taken;
            lots.push(ConsumedLot {
                item_id,
                quality_level: slot.quality_level,
                quantity: taken,
            });
        }

        self.slots.retain(|s| s.quantity > 0);
        Ok(lots)
    }
}

impl From<Vec<Slot>> for Inventory {
    fn from(slots: Vec<Slot>) -> Self {
        Self::from_slots(slots)
    }
}

impl From<Inventory> for Vec<Slot> {
    fn from(inventory: Inventory) -> Self {
        inventory.slots
    }
}

// =============================================================================
// Tests
// =============================================================================
