//! Forge fixture for seeding the in-memory store.

use std::collections::BTreeMap;
use std::sync::Arc;

use anvil_domain::{
    CombineRecipe, DecomposeRecipe, Inventory, Item, ItemId, Platform, QualityLevel, RecipeCost,
    RecipeOutput, Slot, User, UserIdentity,
};
use anvil_store::MemoryStore;

use crate::Result;

/// Item and recipe ids seeded by [`Forge::seed`].
pub mod catalog {
    use anvil_domain::{ItemId, RecipeId};

    pub const WOOD: ItemId = 1;
    pub const PLANK: ItemId = 2;
    pub const IRON_INGOT: ItemId = 3;
    pub const IRON_SWORD: ItemId = 4;
    pub const STEEL: ItemId = 5;
    /// Item with no recipes at all
    pub const GEM: ItemId = 6;

    /// 1 wood → plank, unlocked
    pub const SAW_PLANK: RecipeId = 101;
    /// 2 ingot + 1 plank → sword, level 5, unlocked
    pub const FORGE_SWORD: RecipeId = 102;
    /// 2 ingot → steel, never unlocked
    pub const SMELT_STEEL: RecipeId = 103;

    /// plank → 1 wood
    pub const SPLIT_PLANK: RecipeId = 201;
    /// sword → 2 ingot + 1 plank
    pub const BREAK_SWORD: RecipeId = 202;
    /// steel → 2 ingot, associated with the locked steel recipe
    pub const MELT_STEEL: RecipeId = 203;

    pub const SWORD_LEVEL: u32 = 5;
}

/// Seeded store plus the default user.
pub struct Forge {
    pub store: Arc<MemoryStore>,
    pub user: User,
    pub identity: UserIdentity,
}

impl Forge {
    /// Seed the catalog and a Twitch user `alice` (id `12345`).
    pub fn seed() -> Result<Self> {
        Self::seed_into(MemoryStore::new())
    }

    /// Seed the catalog into an existing store.
    pub fn seed_into(store: MemoryStore) -> Result<Self> {
        use catalog::*;

        let store = Arc::new(store);
        store.insert_item(Item::new(WOOD, "wood").with_public_name("Wood"));
        store.insert_item(Item::new(PLANK, "plank").with_public_name("Plank"));
        store.insert_item(Item::new(IRON_INGOT, "iron_ingot"));
        store.insert_item(
            Item::new(IRON_SWORD, "iron_sword")
                .with_public_name("Iron Sword")
                .with_description("A sturdy blade"),
        );
        store.insert_item(Item::new(STEEL, "steel"));
        store.insert_item(Item::new(GEM, "gem"));

        store.insert_combine_recipe(CombineRecipe::new(
            SAW_PLANK,
            PLANK,
            vec![RecipeCost { item_id: WOOD, quantity: 1 }],
            "saw_plank",
        )?);
        store.insert_combine_recipe(
            CombineRecipe::new(
                FORGE_SWORD,
                IRON_SWORD,
                vec![
                    RecipeCost { item_id: IRON_INGOT, quantity: 2 },
                    RecipeCost { item_id: PLANK, quantity: 1 },
                ],
                "forge_sword",
            )?
            .with_required_level(SWORD_LEVEL),
        );
        store.insert_combine_recipe(CombineRecipe::new(
            SMELT_STEEL,
            STEEL,
            vec![RecipeCost { item_id: IRON_INGOT, quantity: 2 }],
            "smelt_steel",
        )?);

        store.insert_decompose_recipe(DecomposeRecipe::new(
            SPLIT_PLANK,
            PLANK,
            1,
            vec![RecipeOutput { item_id: WOOD, quantity: 1 }],
            "split_plank",
        )?);
        store.insert_decompose_recipe(DecomposeRecipe::new(
            BREAK_SWORD,
            IRON_SWORD,
            1,
            vec![
                RecipeOutput { item_id: IRON_INGOT, quantity: 2 },
                RecipeOutput { item_id: PLANK, quantity: 1 },
            ],
            "break_sword",
        )?);
        store.insert_decompose_recipe(DecomposeRecipe::new(
            MELT_STEEL,
            STEEL,
            1,
            vec![RecipeOutput { item_id: IRON_INGOT, quantity: 2 }],
            "melt_steel",
        )?);
        store.associate(SPLIT_PLANK, SAW_PLANK);
        store.associate(BREAK_SWORD, FORGE_SWORD);
        store.associate(MELT_STEEL, SMELT_STEEL);

        let (user, identity) = add_user(&store, Platform::Twitch, "12345", "alice");
        store.unlock(user.id, SAW_PLANK);
        store.unlock(user.id, FORGE_SWORD);

        Ok(Self { store, user, identity })
    }

    /// Register another user with nothing unlocked.
    pub fn add_user(&self, platform: Platform, platform_id: &str, username: &str) -> (User, UserIdentity) {
        add_user(&self.store, platform, platform_id, username)
    }

    /// Replace the default user's inventory with common-quality stacks.
    pub fn stock(&self, items: &[(ItemId, u64)]) {
        self.stock_with_quality(
            &items.iter().map(|(id, qty)| (*id, *qty, QualityLevel::Common)).collect::<Vec<_>>(),
        );
    }

    /// Replace the default user's inventory with explicit quality stacks.
    pub fn stock_with_quality(&self, slots: &[(ItemId, u64, QualityLevel)]) {
        self.store.set_inventory(
            self.user.id,
            Inventory::from_slots(slots.iter().map(|(id, qty, q)| Slot::new(*id, *qty, *q))),
        );
    }

    /// Default user's committed inventory
    pub fn inventory(&self) -> Inventory {
        self.store.inventory(self.user.id)
    }

    /// Default user's committed per-item totals
    pub fn totals(&self) -> BTreeMap<ItemId, u64> {
        self.inventory().totals()
    }
}

fn add_user(
    store: &MemoryStore,
    platform: Platform,
    platform_id: &str,
    username: &str,
) -> (User, UserIdentity) {
    let user = User::new(platform, platform_id, username);
    store.insert_user(user.clone());
    let identity = UserIdentity::new(platform.as_str(), platform_id, username);
    (user, identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_store::CraftingRepository;

    #[tokio::test]
    async fn test_seed_wires_catalog() {
        let forge = Forge::seed().unwrap();
        let store = &forge.store;

        let sword = store.get_item_by_name("iron_sword").await.unwrap().unwrap();
        let recipe = store.get_recipe_by_target_item_id(sword.id).await.unwrap().unwrap();
        assert_eq!(recipe.required_level, Some(catalog::SWORD_LEVEL));
        assert_eq!(
            store.get_associated_combine_recipe_id(catalog::BREAK_SWORD).await.unwrap(),
            Some(catalog::FORGE_SWORD)
        );
        assert!(store.is_recipe_unlocked(forge.user.id, catalog::SAW_PLANK).await.unwrap());
        assert!(!store.is_recipe_unlocked(forge.user.id, catalog::SMELT_STEEL).await.unwrap());
    }

    #[test]
    fn test_stock_replaces_inventory() {
        let forge = Forge::seed().unwrap();
        forge.stock(&[(catalog::WOOD, 3)]);
        forge.stock(&[(catalog::PLANK, 1)]);
        assert_eq!(forge.totals(), BTreeMap::from([(catalog::PLANK, 1)]));
    }
}
